//! The Generator capability: a provider, a model and a time budget.

use std::sync::Arc;
use std::time::Duration;

use paperchat_core::{GenerationError, PromptMessage, Provider, ProviderRequest};
use tracing::debug;

pub struct Generator {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    timeout: Duration,
}

impl Generator {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.0,
            max_tokens: None,
            timeout: Duration::from_secs(60),
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Run one completion and return its text.
    ///
    /// Exceeding the time budget is `GenerationError::Timeout`.
    pub async fn generate(&self, messages: Vec<PromptMessage>) -> Result<String, GenerationError> {
        let request = ProviderRequest {
            model: self.model.clone(),
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            stop: vec![],
        };

        let response = tokio::time::timeout(self.timeout, self.provider.complete(request))
            .await
            .map_err(|_| GenerationError::Timeout {
                secs: self.timeout.as_secs(),
            })??;

        debug!(
            provider = self.provider.name(),
            model = %response.model,
            chars = response.content.len(),
            "Generation complete"
        );
        Ok(response.content)
    }
}
