//! Conversation Memory Store.
//!
//! Wraps a [`HistoryBackend`] with a [`SessionRegistry`] so that writes to
//! one session are totally ordered while different sessions proceed in
//! parallel. Every backend call runs under the storage time budget.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use paperchat_core::{
    Error, HistoryBackend, Message, Result, SessionId, SessionStats, SessionSummary, StorageError,
};
use tracing::{debug, info};

use crate::registry::{SessionHandle, SessionRegistry};

pub struct ConversationMemory {
    backend: Arc<dyn HistoryBackend>,
    registry: Arc<SessionRegistry>,
    preview_chars: usize,
    timeout: Duration,
}

impl ConversationMemory {
    pub fn new(backend: Arc<dyn HistoryBackend>) -> Self {
        Self {
            backend,
            registry: Arc::new(SessionRegistry::new()),
            preview_chars: 50,
            timeout: Duration::from_secs(10),
        }
    }

    /// Share an existing registry instead of creating a private one.
    pub fn with_registry(mut self, registry: Arc<SessionRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_preview_chars(mut self, preview_chars: usize) -> Self {
        self.preview_chars = preview_chars;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Handle for a session, registering it on first use.
    pub async fn get_or_create(&self, id: &SessionId) -> Result<Arc<SessionHandle>> {
        validate(id)?;
        Ok(self.registry.get_or_create(id).await)
    }

    /// Durably append one message.
    pub async fn append(&self, id: &SessionId, message: Message) -> Result<()> {
        self.append_locked(id, &[&message]).await
    }

    /// Append a human message and the assistant reply as one ordered pair.
    ///
    /// Both are written under a single acquisition of the session lock, so
    /// pairs from concurrent turns on the same session never interleave.
    pub async fn append_turn(&self, id: &SessionId, human: Message, assistant: Message) -> Result<()> {
        self.append_locked(id, &[&human, &assistant]).await?;
        debug!(session_id = %id, "Appended turn");
        Ok(())
    }

    /// Full ordered history. Empty for a session with no messages.
    pub async fn history(&self, id: &SessionId) -> Result<Vec<Message>> {
        validate(id)?;
        Ok(self
            .bounded("history read", self.backend.messages(id.as_str()))
            .await?)
    }

    /// Delete every message of a session and retire its handle.
    ///
    /// Returns whether there was anything to clear.
    pub async fn clear(&self, id: &SessionId) -> Result<bool> {
        validate(id)?;
        let known = self.registry.get(id).await.is_some();
        loop {
            let handle = self.registry.get_or_create(id).await;
            // Retired by a concurrent clear; look again.
            let Some(guard) = handle.lock().await else {
                continue;
            };

            let removed = self
                .bounded("history clear", self.backend.clear(id.as_str()))
                .await?;
            self.registry.retire(&handle, guard).await;

            if removed > 0 {
                info!(session_id = %id, removed, "Cleared session");
            }
            return Ok(removed > 0 || known);
        }
    }

    /// Every stored session, most recently active first.
    pub async fn list_all(&self) -> Result<Vec<SessionSummary>> {
        Ok(self
            .bounded("session listing", self.backend.sessions(self.preview_chars))
            .await?)
    }

    pub async fn stats(&self, id: &SessionId) -> Result<SessionStats> {
        validate(id)?;
        Ok(self
            .bounded("session stats", self.backend.stats(id.as_str()))
            .await?)
    }

    /// Write `messages` in order while holding the session's live lock.
    async fn append_locked(&self, id: &SessionId, messages: &[&Message]) -> Result<()> {
        validate(id)?;
        loop {
            let handle = self.registry.get_or_create(id).await;
            // A clear retired this handle while we queued; take the new one.
            let Some(_guard) = handle.lock().await else {
                continue;
            };
            for message in messages {
                self.bounded("history append", self.backend.append(id.as_str(), message))
                    .await?;
            }
            return Ok(());
        }
    }

    async fn bounded<T, F>(&self, operation: &str, fut: F) -> std::result::Result<T, StorageError>
    where
        F: Future<Output = std::result::Result<T, StorageError>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(StorageError::Timeout {
                operation: operation.into(),
                secs: self.timeout.as_secs(),
            }),
        }
    }
}

fn validate(id: &SessionId) -> Result<()> {
    if id.is_valid() {
        Ok(())
    } else {
        Err(Error::invalid_input(
            "session id must be 1-256 characters without control characters",
        ))
    }
}
