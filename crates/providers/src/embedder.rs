//! Provider-backed [`Embedder`].

use std::sync::Arc;

use async_trait::async_trait;
use paperchat_core::error::EmbeddingError;
use paperchat_core::provider::{EmbeddingRequest, Provider};
use paperchat_core::Embedder;
use tracing::debug;

/// Adapts a provider's embedding endpoint to the [`Embedder`] trait.
///
/// Inputs are sent in batches of `batch_size`; the combined output must have
/// one vector per input and a single dimension across all vectors.
pub struct ProviderEmbedder {
    provider: Arc<dyn Provider>,
    model: String,
    batch_size: usize,
}

impl ProviderEmbedder {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>, batch_size: usize) -> Self {
        Self {
            provider,
            model: model.into(),
            batch_size: batch_size.max(1),
        }
    }
}

#[async_trait]
impl Embedder for ProviderEmbedder {
    fn model(&self) -> &str {
        &self.model
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut vectors = Vec::with_capacity(texts.len());

        for batch in texts.chunks(self.batch_size) {
            let response = self
                .provider
                .embed(EmbeddingRequest {
                    model: self.model.clone(),
                    inputs: batch.to_vec(),
                })
                .await?;

            if response.embeddings.len() != batch.len() {
                return Err(EmbeddingError::CountMismatch {
                    expected: batch.len(),
                    actual: response.embeddings.len(),
                });
            }
            vectors.extend(response.embeddings);
        }

        if let Some(first) = vectors.first() {
            let expected = first.len();
            if let Some(bad) = vectors.iter().find(|v| v.len() != expected) {
                return Err(EmbeddingError::DimensionMismatch {
                    expected,
                    actual: bad.len(),
                });
            }
        }

        debug!(
            provider = %self.provider.name(),
            model = %self.model,
            count = vectors.len(),
            "Embedded documents"
        );

        Ok(vectors)
    }
}
