//! Retrievable text chunks.

use serde::{Deserialize, Serialize};

/// Where a chunk came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Source document identifier (usually the uploaded filename)
    pub source: String,

    /// 1-based page number, when the source has pages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,

    /// Position of the chunk within its source document
    #[serde(default)]
    pub chunk_index: usize,
}

/// A unit of retrievable text, before embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub metadata: ChunkMetadata,
}

impl Chunk {
    pub fn new(text: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            metadata: ChunkMetadata {
                source: source.into(),
                page: None,
                chunk_index: 0,
            },
        }
    }

    pub fn with_page(mut self, page: u32) -> Self {
        self.metadata.page = Some(page);
        self
    }

    pub fn with_index(mut self, chunk_index: usize) -> Self {
        self.metadata.chunk_index = chunk_index;
        self
    }
}

/// A chunk returned by similarity search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    /// Stable id assigned by the collection at insert time
    pub id: u64,
    pub chunk: Chunk,
    /// Cosine similarity to the query, higher is closer
    pub score: f32,
}
