//! Embedder trait — maps text to fixed-length vectors.

use async_trait::async_trait;
use crate::error::EmbeddingError;

/// Text embedding capability.
///
/// Every vector returned by one embedder must have the same length; the
/// index manager fixes a collection's dimension from the first batch it sees.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Identifier of the underlying embedding model.
    fn model(&self) -> &str;

    /// Embed a batch of document texts, one vector per input in input order.
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Embed a single query string.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut vectors = self.embed_documents(&[text.to_string()]).await?;
        let actual = vectors.len();
        match vectors.pop() {
            Some(v) if actual == 1 => Ok(v),
            _ => Err(EmbeddingError::CountMismatch {
                expected: 1,
                actual,
            }),
        }
    }
}
