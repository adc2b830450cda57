//! Session manager keeping the single active bridge session

use super::connection::SessionHandle;
use docbridge_shared::Task;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

/// Tracks the active bridge session
pub struct SessionManager {
    active: RwLock<Option<SessionHandle>>,
    next_id: AtomicU64,
}

impl SessionManager {
    /// Create a new session manager
    pub fn new() -> Self {
        Self {
            active: RwLock::new(None),
            next_id: AtomicU64::new(0),
        }
    }

    /// Allocate an id for a newly accepted session
    pub fn next_session_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Make `handle` the active session, returning the one it replaced
    pub async fn register(&self, handle: SessionHandle) -> Option<SessionHandle> {
        self.active.write().await.replace(handle)
    }

    /// Clear the active session if it is still `id`
    pub async fn unregister(&self, id: u64) -> bool {
        let mut active = self.active.write().await;
        if active.as_ref().is_some_and(|handle| handle.id == id) {
            *active = None;
            return true;
        }
        false
    }

    /// Get the active session handle
    pub async fn active(&self) -> Option<SessionHandle> {
        self.active.read().await.clone()
    }

    pub async fn is_connected(&self) -> bool {
        self.active.read().await.is_some()
    }

    /// Send a command to the active session
    pub async fn send(&self, task: &Task) -> anyhow::Result<()> {
        let handle = self
            .active()
            .await
            .ok_or_else(|| anyhow::anyhow!("Bridge not connected"))?;
        handle.send(task).await
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::testing::loopback;

    #[tokio::test]
    async fn test_newest_session_wins() {
        let manager = SessionManager::new();
        assert!(!manager.is_connected().await);
        assert!(manager.send(&Task::save("1")).await.is_err());

        let (first, _bridge1) = loopback(manager.next_session_id()).await;
        let (second, _bridge2) = loopback(manager.next_session_id()).await;

        assert!(manager.register(first.get_handle()).await.is_none());
        let replaced = manager.register(second.get_handle()).await.unwrap();
        assert_eq!(replaced.id, 1);

        // The replaced session closing must not clear the new one
        assert!(!manager.unregister(1).await);
        assert_eq!(manager.active().await.unwrap().id, 2);

        assert!(manager.unregister(2).await);
        assert!(!manager.is_connected().await);
    }
}
