//! Process-scoped registry of session handles.
//!
//! Each handle carries the mutex that serializes writes to its session.
//! The registry is an explicit value owned by whoever builds the memory
//! store; there is no global state.

use std::collections::HashMap;
use std::sync::Arc;

use paperchat_core::SessionId;
use tokio::sync::{Mutex, MutexGuard};

/// A live session: its id plus the lock ordering its appends.
///
/// A handle is retired when its session is cleared. Retirement happens
/// while the write lock is held and in the same step that removes the
/// handle from the registry, so at most one usable lock exists per id.
#[derive(Debug)]
pub struct SessionHandle {
    id: SessionId,
    /// `true` once retired
    write_lock: Mutex<bool>,
}

/// Exclusive write access to a live session.
pub struct SessionWriteGuard<'a>(MutexGuard<'a, bool>);

impl SessionHandle {
    fn new(id: SessionId) -> Self {
        Self {
            id,
            write_lock: Mutex::new(false),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Exclusive write access to this session, or `None` if the handle was
    /// retired while waiting. Callers then fetch a fresh handle.
    pub async fn lock(&self) -> Option<SessionWriteGuard<'_>> {
        let guard = self.write_lock.lock().await;
        if *guard { None } else { Some(SessionWriteGuard(guard)) }
    }
}

/// Maps session ids to their handles.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    handles: Mutex<HashMap<SessionId, Arc<SessionHandle>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The handle for `id`, registering it on first use.
    pub async fn get_or_create(&self, id: &SessionId) -> Arc<SessionHandle> {
        let mut handles = self.handles.lock().await;
        handles
            .entry(id.clone())
            .or_insert_with(|| Arc::new(SessionHandle::new(id.clone())))
            .clone()
    }

    /// The handle for `id` if one is registered.
    pub async fn get(&self, id: &SessionId) -> Option<Arc<SessionHandle>> {
        self.handles.lock().await.get(id).cloned()
    }

    /// Retire `handle` and drop it from the registry.
    ///
    /// Takes the handle's write guard so nobody can be writing through it.
    /// Writers queued on the old lock observe the retirement and move to
    /// the next registered handle. Returns whether the handle was registered.
    pub async fn retire(&self, handle: &Arc<SessionHandle>, mut guard: SessionWriteGuard<'_>) -> bool {
        let mut handles = self.handles.lock().await;
        let registered = handles
            .get(handle.id())
            .is_some_and(|current| Arc::ptr_eq(current, handle));
        if registered {
            handles.remove(handle.id());
        }
        *guard.0 = true;
        registered
    }

    pub async fn len(&self) -> usize {
        self.handles.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.handles.lock().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_id_yields_same_handle() {
        let registry = SessionRegistry::new();
        let id = SessionId::from("s1");
        let a = registry.get_or_create(&id).await;
        let b = registry.get_or_create(&id).await;
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn retire_forgets_handle() {
        let registry = SessionRegistry::new();
        let id = SessionId::from("s1");
        let first = registry.get_or_create(&id).await;
        let guard = first.lock().await.unwrap();
        assert!(registry.retire(&first, guard).await);
        assert!(registry.get(&id).await.is_none());
        assert!(first.lock().await.is_none());

        let second = registry.get_or_create(&id).await;
        assert!(!Arc::ptr_eq(&first, &second));
        assert!(second.lock().await.is_some());
    }

    #[tokio::test]
    async fn retiring_a_stale_handle_keeps_the_current_one() {
        let registry = SessionRegistry::new();
        let id = SessionId::from("s1");
        let old = registry.get_or_create(&id).await;
        let guard = old.lock().await.unwrap();
        registry.retire(&old, guard).await;
        let current = registry.get_or_create(&id).await;

        let stale = Arc::new(SessionHandle::new(id.clone()));
        let guard = stale.lock().await.unwrap();
        assert!(!registry.retire(&stale, guard).await);
        assert!(Arc::ptr_eq(&registry.get(&id).await.unwrap(), &current));
    }

    #[tokio::test]
    async fn waiter_on_retired_handle_is_turned_away() {
        let registry = Arc::new(SessionRegistry::new());
        let id = SessionId::from("s1");
        let handle = registry.get_or_create(&id).await;
        let guard = handle.lock().await.unwrap();

        let waiter = {
            let handle = handle.clone();
            tokio::spawn(async move { handle.lock().await.is_some() })
        };
        tokio::task::yield_now().await;
        registry.retire(&handle, guard).await;
        assert!(!waiter.await.unwrap());
    }

    #[tokio::test]
    async fn handles_lock_independently() {
        let registry = SessionRegistry::new();
        let a = registry.get_or_create(&SessionId::from("a")).await;
        let b = registry.get_or_create(&SessionId::from("b")).await;
        let _held = a.lock().await.unwrap();
        // A held lock on one session never blocks another.
        let guard = tokio::time::timeout(std::time::Duration::from_millis(100), b.lock()).await;
        assert!(guard.is_ok_and(|g| g.is_some()));
    }
}
