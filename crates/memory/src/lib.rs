//! Conversation memory for PaperChat.
//!
//! [`ConversationMemory`] orders writes per session on top of a pluggable
//! [`HistoryBackend`](paperchat_core::HistoryBackend). Backends are picked
//! from the history URL by [`connect`].

pub mod in_memory;
pub mod registry;
pub mod store;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use in_memory::InMemoryHistory;
pub use registry::{SessionHandle, SessionRegistry, SessionWriteGuard};
pub use store::ConversationMemory;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteHistory;

#[cfg(feature = "postgres")]
pub use postgres::PostgresHistory;

use paperchat_core::{HistoryBackend, StorageError};
use std::sync::Arc;

/// Open the history backend named by `url`.
///
/// * `memory` keeps everything in process memory
/// * `sqlite://path` or `sqlite::memory:` uses SQLite
/// * `postgres://...` / `postgresql://...` uses PostgreSQL (feature `postgres`)
pub async fn connect(url: &str) -> Result<Arc<dyn HistoryBackend>, StorageError> {
    let url = url.trim();
    if url.eq_ignore_ascii_case("memory") {
        return Ok(Arc::new(InMemoryHistory::new()));
    }

    if url.starts_with("postgres://") || url.starts_with("postgresql://") {
        #[cfg(feature = "postgres")]
        {
            return Ok(Arc::new(PostgresHistory::connect(url).await?));
        }
        #[cfg(not(feature = "postgres"))]
        {
            return Err(StorageError::Database(
                "PostgreSQL history requires the `postgres` feature".into(),
            ));
        }
    }

    #[cfg(feature = "sqlite")]
    {
        Ok(Arc::new(SqliteHistory::new(url).await?))
    }
    #[cfg(not(feature = "sqlite"))]
    {
        Err(StorageError::Database(format!(
            "No history backend available for '{url}'"
        )))
    }
}
