//! Vector Index Manager for PaperChat.
//!
//! Owns one similarity index per named collection: creation, loading,
//! append-only merging, search and atomic persistence under a root
//! directory.
//!
//! ```text
//! <root>/
//!   default/index.json
//!   docs/index.json
//! ```

pub mod collection;
pub mod index;
pub mod manager;
pub mod store;
pub mod vector;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use collection::CollectionName;
pub use index::{IndexedChunk, VectorIndex};
pub use manager::{CollectionInfo, IndexLoad, IndexManager, MergeOutcome};
