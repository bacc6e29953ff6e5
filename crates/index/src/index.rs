//! In-memory similarity index for one collection.

use paperchat_core::{Chunk, ChunkMetadata, EmbeddingError, ScoredChunk};
use serde::{Deserialize, Serialize};

use crate::vector;

/// A stored chunk with its embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedChunk {
    /// Assigned at insert time, never reused or renumbered
    pub id: u64,
    pub text: String,
    pub metadata: ChunkMetadata,
    pub embedding: Vec<f32>,
}

impl IndexedChunk {
    pub fn chunk(&self) -> Chunk {
        Chunk {
            text: self.text.clone(),
            metadata: self.metadata.clone(),
        }
    }
}

/// Append-only flat index. Brute-force cosine search over every entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorIndex {
    dimension: usize,
    next_id: u64,
    entries: Vec<IndexedChunk>,
}

impl VectorIndex {
    /// Build a fresh index. The dimension is taken from the first vector.
    pub fn build(chunks: Vec<Chunk>, vectors: Vec<Vec<f32>>) -> Result<Self, EmbeddingError> {
        let dimension = vectors.first().map(Vec::len).unwrap_or(0);
        if dimension == 0 {
            return Err(EmbeddingError::DimensionMismatch {
                expected: 1,
                actual: 0,
            });
        }

        let mut index = Self {
            dimension,
            next_id: 0,
            entries: Vec::with_capacity(chunks.len()),
        };
        index.append(chunks, vectors)?;
        Ok(index)
    }

    /// Append embedded chunks, returning how many were added.
    ///
    /// Either every chunk is added or none is.
    pub fn append(
        &mut self,
        chunks: Vec<Chunk>,
        vectors: Vec<Vec<f32>>,
    ) -> Result<usize, EmbeddingError> {
        if chunks.len() != vectors.len() {
            return Err(EmbeddingError::CountMismatch {
                expected: chunks.len(),
                actual: vectors.len(),
            });
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != self.dimension) {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimension,
                actual: bad.len(),
            });
        }

        let added = chunks.len();
        for (chunk, embedding) in chunks.into_iter().zip(vectors) {
            self.entries.push(IndexedChunk {
                id: self.next_id,
                text: chunk.text,
                metadata: chunk.metadata,
                embedding,
            });
            self.next_id += 1;
        }
        Ok(added)
    }

    /// At most `k` chunks by descending similarity to `query`.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>, EmbeddingError> {
        if query.len() != self.dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        let ranked = vector::top_k(
            self.entries.iter().map(|e| (e.id, e.embedding.as_slice())),
            query,
            k,
        );

        Ok(ranked
            .into_iter()
            .filter_map(|(id, score)| {
                self.get(id).map(|e| ScoredChunk {
                    id,
                    chunk: e.chunk(),
                    score,
                })
            })
            .collect())
    }

    /// Look up an entry by id. Entries are stored in ascending id order.
    pub fn get(&self, id: u64) -> Option<&IndexedChunk> {
        self.entries
            .binary_search_by_key(&id, |e| e.id)
            .ok()
            .map(|pos| &self.entries[pos])
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[IndexedChunk] {
        &self.entries
    }

    /// Structural checks applied after decoding persisted state.
    pub(crate) fn check_consistency(&self) -> Result<(), String> {
        if self.dimension == 0 {
            return Err("dimension is zero".into());
        }
        let mut previous: Option<u64> = None;
        for entry in &self.entries {
            if entry.embedding.len() != self.dimension {
                return Err(format!(
                    "entry {} has dimension {}, expected {}",
                    entry.id,
                    entry.embedding.len(),
                    self.dimension
                ));
            }
            if previous.is_some_and(|p| entry.id <= p) {
                return Err(format!("entry ids out of order at {}", entry.id));
            }
            if entry.id >= self.next_id {
                return Err(format!("entry id {} not below next_id {}", entry.id, self.next_id));
            }
            previous = Some(entry.id);
        }
        Ok(())
    }
}
