//! In-memory backend — useful for testing and ephemeral deployments.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use paperchat_core::error::StorageError;
use paperchat_core::message::Message;
use paperchat_core::session::{HistoryBackend, SessionSummary, preview};
use std::collections::HashMap;
use tokio::sync::RwLock;

struct StoredMessage {
    seq: u64,
    session_id: String,
    message: Message,
    stored_at: DateTime<Utc>,
}

#[derive(Default)]
struct Rows {
    next_seq: u64,
    rows: Vec<StoredMessage>,
}

/// A [`HistoryBackend`] that keeps every message in process memory.
#[derive(Default)]
pub struct InMemoryHistory {
    inner: RwLock<Rows>,
}

impl InMemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryBackend for InMemoryHistory {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn append(&self, session_id: &str, message: &Message) -> Result<(), StorageError> {
        let mut inner = self.inner.write().await;
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.rows.push(StoredMessage {
            seq,
            session_id: session_id.to_string(),
            message: message.clone(),
            stored_at: Utc::now(),
        });
        Ok(())
    }

    async fn messages(&self, session_id: &str) -> Result<Vec<Message>, StorageError> {
        let inner = self.inner.read().await;
        Ok(inner
            .rows
            .iter()
            .filter(|r| r.session_id == session_id)
            .map(|r| r.message.clone())
            .collect())
    }

    async fn clear(&self, session_id: &str) -> Result<u64, StorageError> {
        let mut inner = self.inner.write().await;
        let before = inner.rows.len();
        inner.rows.retain(|r| r.session_id != session_id);
        Ok((before - inner.rows.len()) as u64)
    }

    async fn sessions(&self, preview_chars: usize) -> Result<Vec<SessionSummary>, StorageError> {
        let inner = self.inner.read().await;

        // Rows are in seq order, so the first row seen is the oldest.
        let mut by_session: HashMap<&str, (&StoredMessage, &StoredMessage, u64)> = HashMap::new();
        for row in &inner.rows {
            by_session
                .entry(row.session_id.as_str())
                .and_modify(|(_, last, count)| {
                    *last = row;
                    *count += 1;
                })
                .or_insert((row, row, 1));
        }

        let mut ranked: Vec<(u64, SessionSummary)> = by_session
            .into_iter()
            .map(|(id, (first, last, count))| {
                (
                    last.seq,
                    SessionSummary {
                        session_id: id.to_string(),
                        created_at: first.stored_at,
                        updated_at: last.stored_at,
                        preview: preview(&last.message.content, preview_chars),
                        message_count: count,
                    },
                )
            })
            .collect();

        ranked.sort_by(|a, b| {
            b.1.updated_at
                .cmp(&a.1.updated_at)
                .then(b.0.cmp(&a.0))
        });
        Ok(ranked.into_iter().map(|(_, s)| s).collect())
    }
}
