//! Shared identity → connection registry.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use log::debug;
use tokio::sync::{mpsc, RwLock};

use crate::protocol::SignalMessage;

/// Capacity of each connection's outbound queue.
pub const OUTBOUND_QUEUE_SIZE: usize = 32;

static NEXT_CONN_ID: AtomicU64 = AtomicU64::new(1);

/// Allocate a process-unique connection id.
pub fn next_conn_id() -> u64 {
    NEXT_CONN_ID.fetch_add(1, Ordering::Relaxed)
}

/// Handle to a live connection: its id plus the sending side of its
/// outbound queue.
#[derive(Debug, Clone)]
pub struct ClientHandle {
    pub conn_id: u64,
    pub tx: mpsc::Sender<SignalMessage>,
}

/// Identity → connection map shared by every connection task.
///
/// At most one live entry per identity: a second registration silently
/// replaces the first. Removal is conditional on the connection id so a
/// stale close can never evict a newer registration of the same identity.
#[derive(Clone, Default)]
pub struct Registry {
    inner: Arc<RwLock<HashMap<String, ClientHandle>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind an identity to a connection, replacing any existing entry.
    /// The replaced connection, if any, is neither closed nor notified.
    pub async fn insert(&self, user_id: &str, handle: ClientHandle) {
        let mut map = self.inner.write().await;
        if map.insert(user_id.to_string(), handle).is_some() {
            debug!("Identity '{}' re-registered, previous entry replaced", user_id);
        }
    }

    /// Current handle for an identity, if registered.
    pub async fn lookup(&self, user_id: &str) -> Option<ClientHandle> {
        self.inner.read().await.get(user_id).cloned()
    }

    /// Remove the entry for `user_id` only if it still belongs to
    /// `conn_id`. Returns whether an entry was removed.
    pub async fn compare_and_remove(&self, user_id: &str, conn_id: u64) -> bool {
        let mut map = self.inner.write().await;
        match map.get(user_id) {
            Some(handle) if handle.conn_id == conn_id => {
                map.remove(user_id);
                true
            }
            _ => false,
        }
    }

    /// Number of registered identities.
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle() -> ClientHandle {
        let (tx, _rx) = mpsc::channel(1);
        ClientHandle {
            conn_id: next_conn_id(),
            tx,
        }
    }

    #[tokio::test]
    async fn insert_then_lookup() {
        let registry = Registry::new();
        let h = handle();

        registry.insert("alice", h.clone()).await;
        assert_eq!(registry.lookup("alice").await.unwrap().conn_id, h.conn_id);
        assert!(registry.lookup("bob").await.is_none());
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn reinsert_replaces_entry() {
        let registry = Registry::new();
        let first = handle();
        let second = handle();

        registry.insert("alice", first).await;
        registry.insert("alice", second.clone()).await;

        assert_eq!(
            registry.lookup("alice").await.unwrap().conn_id,
            second.conn_id
        );
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn stale_remove_cannot_evict_newer_registration() {
        let registry = Registry::new();
        let old = handle();
        let new = handle();

        registry.insert("alice", old.clone()).await;
        registry.insert("alice", new.clone()).await;

        // The old connection's cleanup runs after the identity was taken
        // over; it must leave the new binding untouched.
        assert!(!registry.compare_and_remove("alice", old.conn_id).await);
        assert_eq!(registry.lookup("alice").await.unwrap().conn_id, new.conn_id);

        assert!(registry.compare_and_remove("alice", new.conn_id).await);
        assert!(registry.is_empty().await);
    }
}
