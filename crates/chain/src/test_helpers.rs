//! Shared test helpers for chain tests.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use paperchat_core::{
    Embedder, EmbeddingError, HistoryBackend, Message, Provider, ProviderError, ProviderRequest,
    ProviderResponse, SessionSummary, StorageError, Usage,
};

/// A mock provider that returns a sequence of scripted results and records
/// every request it receives.
///
/// Panics if more calls are made than results provided.
pub struct SequentialMockProvider {
    responses: Mutex<Vec<Result<String, ProviderError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl SequentialMockProvider {
    pub fn new(responses: Vec<Result<String, ProviderError>>) -> Self {
        Self {
            responses: Mutex::new(responses),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn texts(texts: &[&str]) -> Self {
        Self::new(texts.iter().map(|t| Ok(t.to_string())).collect())
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for SequentialMockProvider {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let mut requests = self.requests.lock().unwrap();
        let responses = self.responses.lock().unwrap();
        let call = requests.len();
        if call >= responses.len() {
            panic!(
                "SequentialMockProvider: no more responses (call #{}, have {})",
                call,
                responses.len()
            );
        }
        requests.push(request.clone());

        responses[call].clone().map(|content| ProviderResponse {
            content,
            usage: Some(Usage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            }),
            model: request.model,
        })
    }
}

/// Provider that sleeps before answering.
pub struct SlowProvider(pub Duration);

#[async_trait]
impl Provider for SlowProvider {
    fn name(&self) -> &str {
        "slow"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        tokio::time::sleep(self.0).await;
        Ok(ProviderResponse {
            content: "late".into(),
            usage: None,
            model: request.model,
        })
    }
}

/// Deterministic embedder hashing word tokens into buckets. Records every
/// text it embeds.
pub struct RecordingEmbedder {
    dimension: usize,
    seen: Mutex<Vec<String>>,
}

impl RecordingEmbedder {
    pub fn new() -> Self {
        Self {
            dimension: 512,
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }

    fn vector(&self, text: &str) -> Vec<f32> {
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
impl Embedder for RecordingEmbedder {
    fn model(&self) -> &str {
        "recording"
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        self.seen.lock().unwrap().extend(texts.iter().cloned());
        Ok(texts.iter().map(|t| self.vector(t)).collect())
    }
}

/// History backend that reads fine but refuses every write.
pub struct ReadOnlyHistory;

#[async_trait]
impl HistoryBackend for ReadOnlyHistory {
    fn name(&self) -> &str {
        "read_only"
    }

    async fn append(&self, _: &str, _: &Message) -> Result<(), StorageError> {
        Err(StorageError::Database("database is read-only".into()))
    }

    async fn messages(&self, _: &str) -> Result<Vec<Message>, StorageError> {
        Ok(vec![])
    }

    async fn clear(&self, _: &str) -> Result<u64, StorageError> {
        Ok(0)
    }

    async fn sessions(&self, _: usize) -> Result<Vec<SessionSummary>, StorageError> {
        Ok(vec![])
    }
}
