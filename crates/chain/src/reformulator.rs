//! Query Reformulator.

use std::sync::Arc;

use paperchat_core::{GenerationError, Message};
use tracing::debug;

use crate::generator::Generator;
use crate::prompts;

/// Rewrites a follow-up question into one that stands on its own.
pub struct QueryReformulator {
    generator: Arc<Generator>,
}

impl QueryReformulator {
    pub fn new(generator: Arc<Generator>) -> Self {
        Self { generator }
    }

    /// With no history the raw query is returned as-is and the generator is
    /// not called. Otherwise the generated text is returned verbatim.
    pub async fn reformulate(
        &self,
        raw_query: &str,
        history: &[Message],
    ) -> Result<String, GenerationError> {
        if history.is_empty() {
            return Ok(raw_query.to_string());
        }

        let standalone = self
            .generator
            .generate(prompts::reformulation_messages(raw_query, history))
            .await?;
        debug!(history = history.len(), "Reformulated query");
        Ok(standalone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::SequentialMockProvider;
    use paperchat_core::ProviderError;

    #[tokio::test]
    async fn empty_history_short_circuits() {
        let provider = Arc::new(SequentialMockProvider::texts(&[]));
        let reformulator = QueryReformulator::new(Arc::new(Generator::new(provider.clone(), "m")));

        for q in ["What is it?", "", "  spaced  "] {
            assert_eq!(reformulator.reformulate(q, &[]).await.unwrap(), q);
        }
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn history_triggers_rewrite_returned_verbatim() {
        let provider = Arc::new(SequentialMockProvider::texts(&["  Who created Rust?\n"]));
        let reformulator = QueryReformulator::new(Arc::new(Generator::new(provider.clone(), "m")));

        let history = vec![Message::human("Tell me about Rust"), Message::assistant("It is a language")];
        let out = reformulator.reformulate("Who created it?", &history).await.unwrap();

        assert_eq!(out, "  Who created Rust?\n");
        assert_eq!(provider.call_count(), 1);
        let sent = &provider.requests()[0].messages;
        assert_eq!(sent.last().unwrap().content, "Who created it?");
    }

    #[tokio::test]
    async fn generator_failure_propagates() {
        let provider = Arc::new(SequentialMockProvider::new(vec![Err(ProviderError::Network(
            "connection reset".into(),
        ))]));
        let reformulator = QueryReformulator::new(Arc::new(Generator::new(provider, "m")));

        let err = reformulator
            .reformulate("and then?", &[Message::human("earlier")])
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Provider(ProviderError::Network(_))));
    }
}
