//! Durable per-session message storage.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::message::Message;

/// One row of the session listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    /// Storage time of the first message
    pub created_at: DateTime<Utc>,
    /// Storage time of the most recent message
    pub updated_at: DateTime<Utc>,
    /// Most recent message content, truncated
    pub preview: String,
    pub message_count: u64,
}

/// Message counts for a single session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    pub message_count: u64,
    pub human_messages: u64,
    pub assistant_messages: u64,
    pub first_message: Option<String>,
    pub last_message: Option<String>,
}

/// Storage backend for conversation history.
///
/// Implementations store one record per message and return messages in
/// insertion order. They do no locking of their own beyond what the store
/// needs for integrity; per-session ordering is enforced by the caller.
#[async_trait]
pub trait HistoryBackend: Send + Sync {
    /// Backend name for logs ("sqlite", "postgres", "in_memory").
    fn name(&self) -> &str;

    /// Append one message to a session.
    async fn append(&self, session_id: &str, message: &Message) -> Result<(), StorageError>;

    /// All messages of a session in insertion order. Empty for unknown ids.
    async fn messages(&self, session_id: &str) -> Result<Vec<Message>, StorageError>;

    /// Delete every message of a session, returning how many were removed.
    async fn clear(&self, session_id: &str) -> Result<u64, StorageError>;

    /// Summaries of every stored session, most recently active first.
    async fn sessions(&self, preview_chars: usize) -> Result<Vec<SessionSummary>, StorageError>;

    /// Message statistics for one session.
    async fn stats(&self, session_id: &str) -> Result<SessionStats, StorageError> {
        let messages = self.messages(session_id).await?;
        Ok(SessionStats::from_messages(&messages))
    }
}

impl SessionStats {
    pub fn from_messages(messages: &[Message]) -> Self {
        use crate::message::Role;
        let human_messages = messages.iter().filter(|m| m.role == Role::Human).count() as u64;
        Self {
            message_count: messages.len() as u64,
            human_messages,
            assistant_messages: messages.len() as u64 - human_messages,
            first_message: messages.first().map(|m| m.content.clone()),
            last_message: messages.last().map(|m| m.content.clone()),
        }
    }
}

/// Truncate `content` to `max_chars` characters, appending `...` only if
/// something was cut.
pub fn preview(content: &str, max_chars: usize) -> String {
    match content.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}...", &content[..byte_idx]),
        None => content.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_truncates_on_char_boundary() {
        assert_eq!(preview("short", 50), "short");
        assert_eq!(preview("abcdef", 3), "abc...");
        assert_eq!(preview("héllo wörld", 5), "héllo...");
        assert_eq!(preview("exact", 5), "exact");
    }

    #[test]
    fn stats_count_roles() {
        let msgs = vec![
            Message::human("q1"),
            Message::assistant("a1"),
            Message::human("q2"),
        ];
        let stats = SessionStats::from_messages(&msgs);
        assert_eq!(stats.message_count, 3);
        assert_eq!(stats.human_messages, 2);
        assert_eq!(stats.assistant_messages, 1);
        assert_eq!(stats.first_message.as_deref(), Some("q1"));
        assert_eq!(stats.last_message.as_deref(), Some("q2"));
    }

    #[test]
    fn stats_of_empty_session() {
        let stats = SessionStats::from_messages(&[]);
        assert_eq!(stats, SessionStats::default());
    }
}
