//! # PaperChat Core
//!
//! Domain types, capability traits, and error definitions for the PaperChat
//! conversational retrieval service. This crate has **no framework
//! dependencies**: it defines the model that every other crate implements
//! against.
//!
//! ## Capabilities
//!
//! The orchestrator talks to the outside world through three narrow traits:
//! - [`Provider`] generates text (the Generator)
//! - [`Embedder`] maps text to fixed-length vectors
//! - [`HistoryBackend`] stores conversation messages durably
//!
//! Implementations live in their own crates so they can be swapped via
//! configuration and replaced with scripted stubs in tests.

pub mod document;
pub mod embedder;
pub mod error;
pub mod message;
pub mod provider;
pub mod session;

// Re-export key types at crate root for ergonomics
pub use document::{Chunk, ChunkMetadata, ScoredChunk};
pub use embedder::Embedder;
pub use error::{EmbeddingError, Error, ErrorKind, GenerationError, ProviderError, Result, StorageError};
pub use message::{Message, Role, SessionId};
pub use provider::{
    EmbeddingRequest, EmbeddingResponse, PromptMessage, PromptRole, Provider, ProviderRequest,
    ProviderResponse, Usage,
};
pub use session::{HistoryBackend, SessionStats, SessionSummary};
