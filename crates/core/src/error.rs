//! Error types for the PaperChat domain.
//!
//! Uses `thiserror` for ergonomic error definitions. The top-level [`Error`]
//! keeps one variant per failure category so that callers can tell
//! "no document ingested yet" apart from "backing store unreachable" and
//! "generation failed" without parsing messages.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The top-level error type for all PaperChat operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Caller errors ---
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("No index exists for collection '{collection}'. Please ingest a document first.")]
    IndexNotFound { collection: String },

    // --- Infrastructure errors ---
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Category of an [`Error`], stable across message wording changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    IndexNotFound,
    Storage,
    Generation,
    Embedding,
    Config,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::IndexNotFound => "index_not_found",
            ErrorKind::Storage => "storage",
            ErrorKind::Generation => "generation",
            ErrorKind::Embedding => "embedding",
            ErrorKind::Config => "config",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    /// Shorthand for [`Error::InvalidInput`].
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Error::InvalidInput(message.into())
    }

    /// Shorthand for [`Error::IndexNotFound`].
    pub fn index_not_found(collection: impl Into<String>) -> Self {
        Error::IndexNotFound {
            collection: collection.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidInput(_) => ErrorKind::InvalidInput,
            Error::IndexNotFound { .. } => ErrorKind::IndexNotFound,
            Error::Storage(_) => ErrorKind::Storage,
            Error::Generation(_) => ErrorKind::Generation,
            Error::Embedding(_) => ErrorKind::Embedding,
            Error::Config { .. } => ErrorKind::Config,
        }
    }

    /// Whether the failure was a step exceeding its time budget.
    pub fn is_timeout(&self) -> bool {
        match self {
            Error::Storage(StorageError::Timeout { .. }) => true,
            Error::Generation(GenerationError::Timeout { .. }) => true,
            Error::Generation(GenerationError::Provider(ProviderError::Timeout(_))) => true,
            Error::Embedding(EmbeddingError::Timeout { .. }) => true,
            Error::Embedding(EmbeddingError::Provider(ProviderError::Timeout(_))) => true,
            _ => false,
        }
    }
}

// --- Bounded context errors ---

/// Failure reported by an LLM provider over the wire.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

/// Index or history persistence failed.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("I/O failure at {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("Corrupt data at {path}: {reason}")]
    Corrupt { path: String, reason: String },

    #[error("Database error: {0}")]
    Database(String),

    #[error("{operation} timed out after {secs}s")]
    Timeout { operation: String, secs: u64 },
}

/// The Generator call failed or exceeded its time budget.
#[derive(Debug, Clone, Error)]
pub enum GenerationError {
    #[error("{0}")]
    Provider(#[from] ProviderError),

    #[error("Generation timed out after {secs}s")]
    Timeout { secs: u64 },
}

/// The Embedder call failed or returned unusable vectors.
#[derive(Debug, Clone, Error)]
pub enum EmbeddingError {
    #[error("{0}")]
    Provider(#[from] ProviderError),

    #[error("Embedding timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Embedder returned {actual} vectors for {expected} inputs")]
    CountMismatch { expected: usize, actual: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = Error::Generation(GenerationError::Provider(ProviderError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        }));
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
        assert_eq!(err.kind(), ErrorKind::Generation);
    }

    #[test]
    fn index_not_found_is_actionable() {
        let err = Error::index_not_found("docs");
        assert_eq!(err.kind(), ErrorKind::IndexNotFound);
        assert!(err.to_string().contains("'docs'"));
        assert!(err.to_string().contains("ingest a document first"));
    }

    #[test]
    fn kinds_stay_distinct() {
        let storage: Error = StorageError::Database("connection refused".into()).into();
        let embedding: Error = EmbeddingError::DimensionMismatch {
            expected: 3,
            actual: 4,
        }
        .into();
        assert_eq!(storage.kind(), ErrorKind::Storage);
        assert_eq!(embedding.kind(), ErrorKind::Embedding);
        assert_ne!(storage.kind(), embedding.kind());
    }

    #[test]
    fn timeouts_are_detected_per_step() {
        assert!(Error::from(GenerationError::Timeout { secs: 5 }).is_timeout());
        assert!(Error::from(EmbeddingError::Timeout { secs: 5 }).is_timeout());
        assert!(
            Error::from(StorageError::Timeout {
                operation: "index load".into(),
                secs: 5
            })
            .is_timeout()
        );
        assert!(!Error::invalid_input("empty").is_timeout());
    }

    #[test]
    fn kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::IndexNotFound).unwrap();
        assert_eq!(json, "\"index_not_found\"");
        assert_eq!(ErrorKind::InvalidInput.as_str(), "invalid_input");
    }
}
