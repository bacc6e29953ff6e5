//! Retriever: embed the standalone query, search the collection.

use std::sync::Arc;

use paperchat_core::{Error, Result, ScoredChunk};
use paperchat_index::{CollectionName, IndexManager};
use tracing::debug;

pub struct Retriever {
    index: Arc<IndexManager>,
}

impl Retriever {
    pub fn new(index: Arc<IndexManager>) -> Self {
        Self { index }
    }

    /// Top `k` chunks for `query`, most similar first.
    ///
    /// A collection that was never created is `IndexNotFound`, checked
    /// before the query is embedded. An empty result is not an error.
    pub async fn retrieve(
        &self,
        collection: &CollectionName,
        query: &str,
        k: usize,
    ) -> Result<Vec<ScoredChunk>> {
        if !self.index.load(collection).await?.is_present() {
            return Err(Error::index_not_found(collection.as_str()));
        }

        let vector = self.index.embed_query(query).await?;
        let hits = self.index.search(collection, &vector, k).await?;
        debug!(collection = %collection, k, hits = hits.len(), "Retrieved chunks");
        Ok(hits)
    }
}
