//! Reachability registry: which principals currently hold a live delivery
//! channel. The dispatcher consults it after persisting a notification; a
//! missing or stale entry just means the push is skipped and the durable row
//! stands on its own.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::RwLock;

struct Channel {
    conn_id: u64,
    tx: UnboundedSender<Value>,
}

/// Process-wide map from user id to their single live channel. A later
/// connect for the same user overwrites the entry; the newest connection is
/// authoritative and the superseded one is not notified.
#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    inner: Arc<RwLock<HashMap<i64, Channel>>>,
    next_conn_id: Arc<AtomicU64>,
}

impl ConnectionRegistry {
    /// Register a channel for `user_id`, replacing any existing one.
    /// Returns the connection id (needed for a matching `disconnect`) and the
    /// receiving half the transport should drain.
    pub async fn connect(&self, user_id: i64) -> (u64, UnboundedReceiver<Value>) {
        let conn_id = self.next_conn_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner
            .write()
            .await
            .insert(user_id, Channel { conn_id, tx });
        (conn_id, rx)
    }

    /// Remove the channel for `user_id`, but only if it is still the one
    /// identified by `conn_id`. A disconnect racing a newer connect must not
    /// evict the newer channel.
    pub async fn disconnect(&self, user_id: i64, conn_id: u64) {
        let mut map = self.inner.write().await;
        if map.get(&user_id).is_some_and(|c| c.conn_id == conn_id) {
            map.remove(&user_id);
        }
    }

    /// Best-effort delivery to a single user's private channel. Returns true
    /// if the payload was handed to a live channel.
    pub async fn push(&self, user_id: i64, payload: Value) -> bool {
        match self.inner.read().await.get(&user_id) {
            Some(channel) => channel.tx.send(payload).is_ok(),
            None => false,
        }
    }

    pub async fn is_connected(&self, user_id: i64) -> bool {
        self.inner.read().await.contains_key(&user_id)
    }

    pub async fn connected_count(&self) -> usize {
        self.inner.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn push_reaches_connected_user() {
        let registry = ConnectionRegistry::default();
        let (_, mut rx) = registry.connect(1).await;

        assert!(registry.push(1, json!({"event": "hello"})).await);
        let payload = rx.recv().await.expect("payload delivered");
        assert_eq!(payload["event"], "hello");
    }

    #[tokio::test]
    async fn push_to_absent_user_is_dropped() {
        let registry = ConnectionRegistry::default();
        assert!(!registry.push(42, json!({})).await);
    }

    #[tokio::test]
    async fn newer_connection_overwrites_older() {
        let registry = ConnectionRegistry::default();
        let (_, mut first_rx) = registry.connect(7).await;
        let (_, mut second_rx) = registry.connect(7).await;

        assert!(registry.push(7, json!({"n": 1})).await);
        assert!(second_rx.recv().await.is_some());
        // The first channel's sender was dropped along with its entry.
        assert!(first_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn stale_disconnect_does_not_evict_newer_channel() {
        let registry = ConnectionRegistry::default();
        let (old_conn, _old_rx) = registry.connect(3).await;
        let (_new_conn, mut new_rx) = registry.connect(3).await;

        registry.disconnect(3, old_conn).await;
        assert!(registry.is_connected(3).await);
        assert!(registry.push(3, json!({"still": "here"})).await);
        assert!(new_rx.recv().await.is_some());
    }

    #[tokio::test]
    async fn matching_disconnect_removes_entry() {
        let registry = ConnectionRegistry::default();
        let (conn_id, _rx) = registry.connect(9).await;
        registry.disconnect(9, conn_id).await;
        assert!(!registry.is_connected(9).await);
        assert_eq!(registry.connected_count().await, 0);
    }
}
