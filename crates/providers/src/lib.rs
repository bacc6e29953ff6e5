//! LLM Provider implementations for PaperChat.
//!
//! All providers implement the `paperchat_core::Provider` trait.
//! The router selects the correct provider based on configuration, and
//! [`ProviderEmbedder`] turns a provider's embedding endpoint into an
//! `Embedder`.

pub mod embedder;
pub mod openai_compat;
pub mod router;

pub use embedder::ProviderEmbedder;
pub use openai_compat::OpenAiCompatProvider;
pub use router::{ProviderRouter, build_from_config};
