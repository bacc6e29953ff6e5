//! Vector Index Manager: one persisted index per collection.
//!
//! Writers (`create`, `merge`, `delete`) on the same collection are
//! serialized by a per-collection async mutex; different collections never
//! contend. Readers never take that mutex: they see whichever complete file
//! is on disk, validated against a cached copy by modification stamp.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use paperchat_core::{Chunk, Embedder, EmbeddingError, Error, Result, ScoredChunk};
use serde::Serialize;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::{debug, info, warn};

use crate::collection::CollectionName;
use crate::index::VectorIndex;
use crate::store::{self, FileStamp};

/// Result of [`IndexManager::load`].
#[derive(Debug, Clone)]
pub enum IndexLoad {
    Present(Arc<VectorIndex>),
    /// No index has been created for the collection yet.
    Absent,
}

impl IndexLoad {
    pub fn is_present(&self) -> bool {
        matches!(self, IndexLoad::Present(_))
    }

    pub fn into_option(self) -> Option<Arc<VectorIndex>> {
        match self {
            IndexLoad::Present(index) => Some(index),
            IndexLoad::Absent => None,
        }
    }
}

/// Result of [`IndexManager::merge`].
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub collection: CollectionName,
    pub index: Arc<VectorIndex>,
    /// Chunks inserted by this merge
    pub added: usize,
    /// Whether the merge created the collection
    pub created: bool,
}

/// Summary row for [`IndexManager::list`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionInfo {
    pub name: String,
    pub chunks: usize,
    pub dimension: usize,
}

struct CachedIndex {
    index: Arc<VectorIndex>,
    stamp: FileStamp,
}

pub struct IndexManager {
    root: PathBuf,
    default_collection: String,
    embedder: Arc<dyn Embedder>,
    embedding_timeout: Duration,
    storage_timeout: Duration,
    write_locks: Mutex<HashMap<CollectionName, Arc<Mutex<()>>>>,
    cache: RwLock<HashMap<CollectionName, CachedIndex>>,
}

impl IndexManager {
    pub fn new(root: impl Into<PathBuf>, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            root: root.into(),
            default_collection: "default".into(),
            embedder,
            embedding_timeout: Duration::from_secs(30),
            storage_timeout: Duration::from_secs(10),
            write_locks: Mutex::new(HashMap::new()),
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_default_collection(mut self, name: impl Into<String>) -> Self {
        self.default_collection = name.into();
        self
    }

    pub fn with_timeouts(mut self, embedding: Duration, storage: Duration) -> Self {
        self.embedding_timeout = embedding;
        self.storage_timeout = storage;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    /// Resolve an optional caller-supplied name to a collection.
    pub fn resolve(&self, name: Option<&str>) -> Result<CollectionName> {
        CollectionName::resolve(name, &self.default_collection)
    }

    /// Read the persisted index for a collection, or `Absent` if none exists.
    pub async fn load(&self, collection: &CollectionName) -> Result<IndexLoad> {
        Ok(match self.fetch(collection).await? {
            Some(index) => IndexLoad::Present(index),
            None => IndexLoad::Absent,
        })
    }

    /// Build a fresh index from `chunks` and persist it, replacing any
    /// existing index for the collection.
    pub async fn create(
        &self,
        collection: &CollectionName,
        chunks: Vec<Chunk>,
    ) -> Result<Arc<VectorIndex>> {
        if chunks.is_empty() {
            return Err(Error::invalid_input("cannot create an index from zero chunks"));
        }

        let vectors = self.embed_chunks(&chunks).await?;
        let index = Arc::new(VectorIndex::build(chunks, vectors)?);

        let guard = self.lock_collection(collection).await;

        if store::stat(&self.index_path(collection), self.storage_timeout)
            .await?
            .is_some()
        {
            warn!(collection = %collection, "Replacing existing index");
        }
        self.persist(collection, index.clone(), guard).await?;

        info!(collection = %collection, chunks = index.len(), dimension = index.dimension(), "Created index");
        Ok(index)
    }

    /// Append `chunks` to the collection, creating it if absent.
    ///
    /// Existing entries keep their ids and vectors. New chunks are embedded
    /// before the collection's write lock is taken.
    pub async fn merge(
        &self,
        collection: &CollectionName,
        chunks: Vec<Chunk>,
    ) -> Result<MergeOutcome> {
        if chunks.is_empty() {
            return Err(Error::invalid_input("no chunks to merge"));
        }

        let vectors = self.embed_chunks(&chunks).await?;
        let added = chunks.len();

        let guard = self.lock_collection(collection).await;

        let (index, created) = match self.fetch(collection).await? {
            Some(existing) => {
                let mut next = (*existing).clone();
                next.append(chunks, vectors)?;
                (Arc::new(next), false)
            }
            None => (Arc::new(VectorIndex::build(chunks, vectors)?), true),
        };
        self.persist(collection, index.clone(), guard).await?;

        info!(
            collection = %collection,
            added,
            total = index.len(),
            created,
            "Merged chunks into index"
        );
        Ok(MergeOutcome {
            collection: collection.clone(),
            index,
            added,
            created,
        })
    }

    /// At most `k` chunks ordered by descending similarity.
    pub async fn search(
        &self,
        collection: &CollectionName,
        query: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredChunk>> {
        let index = self
            .fetch(collection)
            .await?
            .ok_or_else(|| Error::index_not_found(collection.as_str()))?;
        let hits = index.search(query, k)?;
        debug!(collection = %collection, k, hits = hits.len(), "Searched index");
        Ok(hits)
    }

    /// Embed a query with the configured embedding time budget.
    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        match tokio::time::timeout(self.embedding_timeout, self.embedder.embed_query(text)).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(EmbeddingError::Timeout {
                secs: self.embedding_timeout.as_secs(),
            }
            .into()),
        }
    }

    /// Delete a collection's storage. Returns whether it existed.
    pub async fn delete(&self, collection: &CollectionName) -> Result<bool> {
        let guard = self.lock_collection(collection).await;

        let (existed, _guard) =
            store::remove_dir(collection.dir(&self.root), self.storage_timeout, guard).await?;
        self.cache.write().await.remove(collection);
        if existed {
            info!(collection = %collection, "Deleted collection");
        }
        Ok(existed)
    }

    /// Every collection with a readable index, sorted by name.
    pub async fn list(&self) -> Result<Vec<CollectionInfo>> {
        let io = |e: std::io::Error| -> Error {
            paperchat_core::StorageError::Io {
                path: self.root.display().to_string(),
                reason: e.to_string(),
            }
            .into()
        };
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(io(e)),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(io)? {
            let name = entry.file_name().to_string_lossy().into_owned();
            match CollectionName::parse(&name) {
                Ok(collection) => names.push(collection),
                _ => debug!(entry = %name, "Skipping non-collection entry"),
            }
        }
        names.sort();

        let mut infos = Vec::with_capacity(names.len());
        for collection in names {
            match self.fetch(&collection).await {
                Ok(Some(index)) => infos.push(CollectionInfo {
                    name: collection.to_string(),
                    chunks: index.len(),
                    dimension: index.dimension(),
                }),
                Ok(None) => {}
                Err(e) => warn!(collection = %collection, error = %e, "Skipping unreadable collection"),
            }
        }
        Ok(infos)
    }

    fn index_path(&self, collection: &CollectionName) -> PathBuf {
        collection.index_path(&self.root)
    }

    async fn lock_collection(&self, collection: &CollectionName) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.write_locks.lock().await;
            locks
                .entry(collection.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    async fn embed_chunks(&self, chunks: &[Chunk]) -> Result<Vec<Vec<f32>>> {
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors =
            match tokio::time::timeout(self.embedding_timeout, self.embedder.embed_documents(&texts))
                .await
            {
                Ok(result) => result?,
                Err(_) => {
                    return Err(EmbeddingError::Timeout {
                        secs: self.embedding_timeout.as_secs(),
                    }
                    .into());
                }
            };

        if vectors.len() != texts.len() {
            return Err(EmbeddingError::CountMismatch {
                expected: texts.len(),
                actual: vectors.len(),
            }
            .into());
        }
        Ok(vectors)
    }

    /// Current on-disk state, served from cache when the file is unchanged.
    async fn fetch(&self, collection: &CollectionName) -> Result<Option<Arc<VectorIndex>>> {
        let path = self.index_path(collection);

        let Some(stamp) = store::stat(&path, self.storage_timeout).await? else {
            if self.cache.write().await.remove(collection).is_some() {
                debug!(collection = %collection, "Index file gone, evicted cache entry");
            }
            return Ok(None);
        };

        if let Some(cached) = self.cache.read().await.get(collection) {
            if cached.stamp == stamp {
                return Ok(Some(cached.index.clone()));
            }
        }

        match store::read(path, self.storage_timeout).await? {
            Some((index, stamp)) => {
                let index = Arc::new(index);
                self.cache.write().await.insert(
                    collection.clone(),
                    CachedIndex {
                        index: index.clone(),
                        stamp,
                    },
                );
                Ok(Some(index))
            }
            None => {
                self.cache.write().await.remove(collection);
                Ok(None)
            }
        }
    }

    /// Write the index and publish it to the cache before the lock is released.
    async fn persist(
        &self,
        collection: &CollectionName,
        index: Arc<VectorIndex>,
        guard: OwnedMutexGuard<()>,
    ) -> Result<()> {
        let (stamp, _guard) =
            store::write(self.index_path(collection), index.clone(), self.storage_timeout, guard)
                .await?;
        self.cache
            .write()
            .await
            .insert(collection.clone(), CachedIndex { index, stamp });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{BagOfWordsEmbedder, SlowEmbedder};
    use paperchat_core::{ErrorKind, StorageError};

    fn chunks(texts: &[&str]) -> Vec<Chunk> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| Chunk::new(*t, "doc.txt").with_index(i))
            .collect()
    }

    fn manager(root: &Path) -> IndexManager {
        IndexManager::new(root, Arc::new(BagOfWordsEmbedder::new()))
    }

    fn name(s: &str) -> CollectionName {
        CollectionName::parse(s).unwrap()
    }

    #[tokio::test]
    async fn load_absent_collection() {
        let dir = tempfile::tempdir().unwrap();
        let m = manager(dir.path());
        assert!(!m.load(&name("docs")).await.unwrap().is_present());
    }

    #[tokio::test]
    async fn create_rejects_empty_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let err = manager(dir.path()).create(&name("docs"), vec![]).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn create_then_load_round_trips_search_results() {
        let dir = tempfile::tempdir().unwrap();
        let docs = name("docs");
        let texts = ["rust ownership rules", "python garbage collector", "rust borrow checker"];

        let created = manager(dir.path()).create(&docs, chunks(&texts)).await.unwrap();
        let query = BagOfWordsEmbedder::new().vector("rust borrow");
        let before = created.search(&query, 3).unwrap();

        // A fresh manager has an empty cache, so this reads from disk.
        let fresh = manager(dir.path());
        let loaded = fresh.load(&docs).await.unwrap().into_option().unwrap();
        assert_eq!(*loaded, *created);
        assert_eq!(fresh.search(&docs, &query, 3).await.unwrap(), before);
    }

    #[tokio::test]
    async fn merge_is_append_only() {
        let dir = tempfile::tempdir().unwrap();
        let m = manager(dir.path());
        let docs = name("docs");

        let a = ["alpha one", "alpha two"];
        let b = ["beta one", "beta two", "beta three"];
        let first = m.merge(&docs, chunks(&a)).await.unwrap();
        assert!(first.created);
        let original = first.index.entries().to_vec();

        let second = m.merge(&docs, chunks(&b)).await.unwrap();
        assert!(!second.created);
        assert_eq!(second.added, 3);
        assert_eq!(&second.index.entries()[..2], &original[..]);

        let query = BagOfWordsEmbedder::new().vector("one");
        let hits = m.search(&docs, &query, a.len() + b.len()).await.unwrap();
        let mut texts: Vec<String> = hits.iter().map(|h| h.chunk.text.clone()).collect();
        texts.sort();
        let mut expected: Vec<String> = a.iter().chain(b.iter()).map(|s| s.to_string()).collect();
        expected.sort();
        assert_eq!(texts, expected);

        let mut ids: Vec<u64> = hits.iter().map(|h| h.id).collect();
        ids.sort();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn collections_are_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let m = manager(dir.path());
        m.merge(&name("left"), chunks(&["shared words here"])).await.unwrap();
        m.merge(&name("right"), chunks(&["shared words there"])).await.unwrap();

        let query = BagOfWordsEmbedder::new().vector("shared words");
        let left = m.search(&name("left"), &query, 10).await.unwrap();
        let right = m.search(&name("right"), &query, 10).await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].chunk.text, "shared words here");
        assert_eq!(right.len(), 1);
        assert_eq!(right[0].chunk.text, "shared words there");
    }

    #[tokio::test]
    async fn search_unknown_collection_is_index_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let m = manager(dir.path());
        let err = m.search(&name("ghost"), &[1.0], 4).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IndexNotFound);
    }

    #[tokio::test]
    async fn concurrent_merges_lose_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let m = Arc::new(manager(dir.path()));
        let docs = name("docs");

        let mut handles = Vec::new();
        for i in 0..8 {
            let m = m.clone();
            let docs = docs.clone();
            handles.push(tokio::spawn(async move {
                let text = format!("chunk number {i}");
                m.merge(&docs, vec![Chunk::new(text, "doc.txt")]).await.unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        let fresh = manager(dir.path());
        let index = fresh.load(&docs).await.unwrap().into_option().unwrap();
        assert_eq!(index.len(), 8);
        assert_eq!(index.next_id(), 8);
    }

    #[tokio::test]
    async fn corrupt_file_is_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let m = manager(dir.path());
        let docs = name("docs");
        std::fs::create_dir_all(docs.dir(dir.path())).unwrap();
        std::fs::write(docs.index_path(dir.path()), b"not an index").unwrap();

        let err = m.load(&docs).await.unwrap_err();
        assert!(matches!(err, Error::Storage(StorageError::Corrupt { .. })));
        // Merge must not overwrite the corrupt state silently.
        assert!(m.merge(&docs, chunks(&["x"])).await.is_err());
    }

    #[tokio::test]
    async fn dimension_mismatch_persists_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let docs = name("docs");
        manager(dir.path()).merge(&docs, chunks(&["a b"])).await.unwrap();

        let other = IndexManager::new(dir.path(), Arc::new(BagOfWordsEmbedder::with_dimension(8)));
        let err = other.merge(&docs, chunks(&["c d"])).await.unwrap_err();
        assert!(matches!(err, Error::Embedding(EmbeddingError::DimensionMismatch { .. })));

        let index = manager(dir.path()).load(&docs).await.unwrap().into_option().unwrap();
        assert_eq!(index.len(), 1);
    }

    #[tokio::test]
    async fn external_delete_evicts_cache() {
        let dir = tempfile::tempdir().unwrap();
        let m = manager(dir.path());
        let docs = name("docs");
        m.merge(&docs, chunks(&["hello world"])).await.unwrap();
        std::fs::remove_dir_all(docs.dir(dir.path())).unwrap();

        let query = BagOfWordsEmbedder::new().vector("hello");
        let err = m.search(&docs, &query, 1).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IndexNotFound);
    }

    #[tokio::test]
    async fn delete_and_list() {
        let dir = tempfile::tempdir().unwrap();
        let m = manager(dir.path());
        m.merge(&name("beta"), chunks(&["b"])).await.unwrap();
        m.merge(&name("alpha"), chunks(&["a", "aa"])).await.unwrap();
        std::fs::create_dir_all(dir.path().join("not a collection")).unwrap();

        let listed = m.list().await.unwrap();
        let names: Vec<&str> = listed.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "beta"]);
        assert_eq!(listed[0].chunks, 2);

        assert!(m.delete(&name("alpha")).await.unwrap());
        assert!(!m.delete(&name("alpha")).await.unwrap());
        assert!(!m.load(&name("alpha")).await.unwrap().is_present());
        assert_eq!(m.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn list_on_missing_root_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let m = manager(&dir.path().join("never-created"));
        assert!(m.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_on_unreadable_root_is_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("plain-file");
        std::fs::write(&root, b"not a directory").unwrap();

        let err = manager(&root).list().await.unwrap_err();
        assert!(matches!(err, Error::Storage(StorageError::Io { .. })));
    }

    #[tokio::test]
    async fn mixed_case_names_are_separate_collections() {
        let dir = tempfile::tempdir().unwrap();
        let m = manager(dir.path());
        let query = BagOfWordsEmbedder::new().vector("notes");

        m.merge(&name("Docs"), chunks(&["upper notes"])).await.unwrap();
        let err = m.search(&name("docs"), &query, 4).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IndexNotFound);

        m.merge(&name("docs"), chunks(&["lower notes"])).await.unwrap();
        let upper = m.search(&name("Docs"), &query, 4).await.unwrap();
        let lower = m.search(&name("docs"), &query, 4).await.unwrap();
        assert_eq!(upper.len(), 1);
        assert_eq!(upper[0].chunk.text, "upper notes");
        assert_eq!(lower.len(), 1);
        assert_eq!(lower[0].chunk.text, "lower notes");

        let listed = m.list().await.unwrap();
        let names: Vec<&str> = listed.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Docs", "docs"]);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_embedder_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let m = IndexManager::new(dir.path(), Arc::new(SlowEmbedder(Duration::from_secs(60))))
            .with_timeouts(Duration::from_secs(1), Duration::from_secs(10));
        let err = m.merge(&name("docs"), chunks(&["x"])).await.unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(err.kind(), ErrorKind::Embedding);
    }

    #[test]
    fn resolve_uses_configured_default() {
        let m = IndexManager::new("/tmp/x", Arc::new(BagOfWordsEmbedder::new()))
            .with_default_collection("papers");
        assert_eq!(m.resolve(None).unwrap().as_str(), "papers");
        assert_eq!(m.resolve(Some("docs")).unwrap().as_str(), "docs");
        assert!(m.resolve(Some("../etc")).is_err());
    }
}
