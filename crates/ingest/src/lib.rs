//! Document ingestion for PaperChat.
//!
//! Loader → splitter → [`IndexManager::merge`]. Unsupported file types and
//! invalid collection names are rejected before any bytes are parsed.

pub mod loader;
pub mod splitter;

pub use loader::{DocumentKind, Page};
pub use splitter::RecursiveCharacterSplitter;

use std::sync::Arc;

use paperchat_core::{Error, Result};
use paperchat_index::IndexManager;
use serde::Serialize;
use tracing::info;

/// What an ingestion added.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestReport {
    /// Chunks inserted by this upload
    pub chunks: usize,
    /// Resolved collection name
    pub collection: String,
    /// Chunks in the collection after the merge
    pub total_chunks: usize,
    /// Whether this upload created the collection
    pub created: bool,
}

pub struct Ingestor {
    index: Arc<IndexManager>,
    splitter: RecursiveCharacterSplitter,
}

impl Ingestor {
    pub fn new(index: Arc<IndexManager>, splitter: RecursiveCharacterSplitter) -> Self {
        Self { index, splitter }
    }

    pub fn index(&self) -> &Arc<IndexManager> {
        &self.index
    }

    /// Load, split and merge one document into a collection.
    pub async fn ingest(
        &self,
        filename: &str,
        bytes: Vec<u8>,
        collection: Option<&str>,
    ) -> Result<IngestReport> {
        let kind = DocumentKind::from_filename(filename)?;
        let collection = self.index.resolve(collection)?;
        if bytes.is_empty() {
            return Err(Error::invalid_input("uploaded file is empty"));
        }

        let source = source_name(filename);
        let pages = loader::load(kind, bytes).await?;
        let chunks = self.splitter.split_pages(&source, &pages);
        if chunks.is_empty() {
            return Err(Error::invalid_input("document produced no chunks"));
        }

        let outcome = self.index.merge(&collection, chunks).await?;
        info!(
            source = %source,
            collection = %outcome.collection,
            chunks = outcome.added,
            created = outcome.created,
            "Ingested document"
        );

        Ok(IngestReport {
            chunks: outcome.added,
            collection: outcome.collection.as_str().to_string(),
            total_chunks: outcome.index.len(),
            created: outcome.created,
        })
    }
}

/// Final path component of an uploaded filename.
fn source_name(filename: &str) -> String {
    filename
        .rsplit(['/', '\\'])
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or(filename)
        .to_string()
}
