//! SQLite chat history backend.
//!
//! One row per message in a single `messages` table. `seq` is the
//! insertion-assigned ordering key and `stored_at` is stamped by SQLite at
//! insert time, so session listings never depend on client clocks.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use paperchat_core::error::StorageError;
use paperchat_core::message::{Message, Role};
use paperchat_core::session::{HistoryBackend, SessionSummary, preview};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info};

/// A SQLite-backed [`HistoryBackend`].
pub struct SqliteHistory {
    pool: SqlitePool,
}

impl SqliteHistory {
    /// Open (or create) a SQLite database.
    ///
    /// Accepts `sqlite://path/to/file.sqlite`, a bare path, or
    /// `sqlite::memory:` for an ephemeral database (useful for tests).
    pub async fn new(url: &str) -> Result<Self, StorageError> {
        let in_memory = url.contains(":memory:");
        let url = if url.starts_with("sqlite:") {
            url.to_string()
        } else {
            format!("sqlite://{url}")
        };

        if !in_memory {
            if let Some(parent) = url
                .strip_prefix("sqlite://")
                .map(std::path::Path::new)
                .and_then(|p| p.parent())
                .filter(|p| !p.as_os_str().is_empty())
            {
                std::fs::create_dir_all(parent).map_err(|e| StorageError::Io {
                    path: parent.display().to_string(),
                    reason: e.to_string(),
                })?;
            }
        }

        let options = SqliteConnectOptions::from_str(&url)
            .map_err(|e| StorageError::Database(format!("Invalid SQLite url: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        // Every connection to `:memory:` is a separate database, so pin one.
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(4)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Database(format!("Failed to open SQLite: {e}")))?;

        let backend = Self { pool };
        backend.run_migrations().await?;
        info!("SQLite history backend initialized at {url}");
        Ok(backend)
    }

    /// Create from an existing pool (useful for testing).
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StorageError> {
        let backend = Self { pool };
        backend.run_migrations().await?;
        Ok(backend)
    }

    async fn run_migrations(&self) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                seq          INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id   TEXT NOT NULL,
                role         TEXT NOT NULL,
                content      TEXT NOT NULL,
                created_at   TEXT NOT NULL,
                stored_at    TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Database(format!("messages table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_messages_session_seq ON messages(session_id, seq)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Database(format!("session index: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    fn row_to_message(row: &sqlx::sqlite::SqliteRow) -> Result<Message, StorageError> {
        let role: String = row
            .try_get("role")
            .map_err(|e| StorageError::Database(format!("role column: {e}")))?;
        let content: String = row
            .try_get("content")
            .map_err(|e| StorageError::Database(format!("content column: {e}")))?;
        let created_at: String = row
            .try_get("created_at")
            .map_err(|e| StorageError::Database(format!("created_at column: {e}")))?;

        Ok(Message {
            role: Role::from_str(&role).map_err(StorageError::Database)?,
            content,
            timestamp: parse_timestamp(&created_at)?,
        })
    }
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::Database(format!("bad timestamp '{s}': {e}")))
}

#[async_trait]
impl HistoryBackend for SqliteHistory {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn append(&self, session_id: &str, message: &Message) -> Result<(), StorageError> {
        sqlx::query("INSERT INTO messages (session_id, role, content, created_at) VALUES (?, ?, ?, ?)")
            .bind(session_id)
            .bind(message.role.as_str())
            .bind(&message.content)
            .bind(message.timestamp.to_rfc3339())
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Database(format!("Insert failed: {e}")))?;
        Ok(())
    }

    async fn messages(&self, session_id: &str) -> Result<Vec<Message>, StorageError> {
        let rows = sqlx::query(
            "SELECT role, content, created_at FROM messages WHERE session_id = ? ORDER BY seq ASC",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Database(format!("History query failed: {e}")))?;

        rows.iter().map(Self::row_to_message).collect()
    }

    async fn clear(&self, session_id: &str) -> Result<u64, StorageError> {
        let result = sqlx::query("DELETE FROM messages WHERE session_id = ?")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Database(format!("Delete failed: {e}")))?;
        Ok(result.rows_affected())
    }

    async fn sessions(&self, preview_chars: usize) -> Result<Vec<SessionSummary>, StorageError> {
        let rows = sqlx::query(
            r#"
            SELECT s.session_id, s.message_count,
                   f.stored_at AS first_stored, l.stored_at AS last_stored,
                   l.content AS last_content
            FROM (
                SELECT session_id, COUNT(*) AS message_count,
                       MIN(seq) AS min_seq, MAX(seq) AS max_seq
                FROM messages GROUP BY session_id
            ) s
            JOIN messages f ON f.seq = s.min_seq
            JOIN messages l ON l.seq = s.max_seq
            ORDER BY l.stored_at DESC, s.max_seq DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Database(format!("Session listing failed: {e}")))?;

        rows.iter()
            .map(|row| {
                let get = |col: &str| -> Result<String, StorageError> {
                    row.try_get(col)
                        .map_err(|e| StorageError::Database(format!("{col} column: {e}")))
                };
                let message_count: i64 = row
                    .try_get("message_count")
                    .map_err(|e| StorageError::Database(format!("message_count column: {e}")))?;
                Ok(SessionSummary {
                    session_id: get("session_id")?,
                    created_at: parse_timestamp(&get("first_stored")?)?,
                    updated_at: parse_timestamp(&get("last_stored")?)?,
                    preview: preview(&get("last_content")?, preview_chars),
                    message_count: message_count as u64,
                })
            })
            .collect()
    }
}
