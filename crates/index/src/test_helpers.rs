//! Shared test helpers for index tests.

use std::time::Duration;

use async_trait::async_trait;
use paperchat_core::{Embedder, EmbeddingError};

/// Deterministic embedder: hashes lowercase word tokens into buckets.
///
/// Texts sharing words get positive cosine similarity; texts sharing none
/// score zero.
pub struct BagOfWordsEmbedder {
    dimension: usize,
}

impl BagOfWordsEmbedder {
    pub fn new() -> Self {
        Self::with_dimension(64)
    }

    pub fn with_dimension(dimension: usize) -> Self {
        Self { dimension }
    }

    pub fn vector(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0; self.dimension];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let mut hash: u64 = 0xcbf29ce484222325;
            for b in token.to_lowercase().bytes() {
                hash ^= b as u64;
                hash = hash.wrapping_mul(0x100000001b3);
            }
            v[(hash % self.dimension as u64) as usize] += 1.0;
        }
        v
    }
}

#[async_trait]
impl Embedder for BagOfWordsEmbedder {
    fn model(&self) -> &str {
        "bag-of-words"
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts.iter().map(|t| self.vector(t)).collect())
    }
}

/// Embedder that sleeps before answering.
pub struct SlowEmbedder(pub Duration);

#[async_trait]
impl Embedder for SlowEmbedder {
    fn model(&self) -> &str {
        "slow"
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        tokio::time::sleep(self.0).await;
        Ok(texts.iter().map(|_| vec![1.0]).collect())
    }
}
