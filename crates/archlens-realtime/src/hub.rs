//! Connection hub: the registry of live connections per user.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use archlens_core::result::AppResult;
use archlens_core::types::UserId;

use crate::connection::Connection;

/// Registry of live connections keyed by user.
///
/// A user key is present only while it has at least one connection. Sends
/// take a snapshot under the read lock and write outside it, so a slow
/// socket never blocks registration or other users' deliveries.
#[derive(Debug, Default)]
pub struct ConnectionHub {
    connections: RwLock<HashMap<UserId, Vec<Arc<Connection>>>>,
}

impl ConnectionHub {
    /// Creates an empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a connection to its user's set.
    pub async fn register(&self, conn: Arc<Connection>) {
        let user_id = conn.user_id;
        let conn_id = conn.id;
        let mut connections = self.connections.write().await;
        let set = connections.entry(user_id).or_default();
        if !set.iter().any(|c| c.id == conn_id) {
            set.push(conn);
        }
        let count = set.len();
        drop(connections);

        info!(conn_id = %conn_id, user_id = %user_id, user_connections = count, "WebSocket connection registered");
    }

    /// Removes a connection. Unknown connections are ignored.
    pub async fn unregister(&self, conn: &Connection) {
        let mut connections = self.connections.write().await;
        let Some(set) = connections.get_mut(&conn.user_id) else {
            return;
        };
        let before = set.len();
        set.retain(|c| c.id != conn.id);
        let removed = set.len() < before;
        if set.is_empty() {
            connections.remove(&conn.user_id);
        }
        drop(connections);

        if removed {
            info!(conn_id = %conn.id, user_id = %conn.user_id, "WebSocket connection unregistered");
        }
    }

    /// Sends `msg` to every connection of `user_id`.
    ///
    /// Serializes once. A failed write is logged and skipped; the connection
    /// stays registered until its own read loop ends. Returns the number of
    /// connections written successfully.
    pub async fn send_to_user<T: Serialize>(&self, user_id: UserId, msg: &T) -> AppResult<usize> {
        let payload = serde_json::to_string(msg)?;

        let targets = {
            let connections = self.connections.read().await;
            match connections.get(&user_id) {
                Some(set) => set.clone(),
                None => return Ok(0),
            }
        };

        let mut delivered = 0;
        for conn in &targets {
            match conn.send_text(&payload).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!(conn_id = %conn.id, user_id = %user_id, error = %e, "Failed to write to connection");
                }
            }
        }

        debug!(user_id = %user_id, delivered, targets = targets.len(), "Message fanned out");
        Ok(delivered)
    }

    /// Whether the user has at least one live connection.
    pub async fn is_online(&self, user_id: UserId) -> bool {
        self.connections.read().await.contains_key(&user_id)
    }

    /// Total number of live connections across all users.
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.values().map(Vec::len).sum()
    }

    /// Number of users with at least one live connection.
    pub async fn online_users(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Removes and closes every connection.
    pub async fn close_all(&self) {
        let drained: Vec<Arc<Connection>> = {
            let mut connections = self.connections.write().await;
            connections.drain().flat_map(|(_, set)| set).collect()
        };
        let count = drained.len();
        for conn in drained {
            conn.close().await;
        }
        info!(count, "All WebSocket connections closed");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use crate::testing::RecordingSink;
    use super::*;

    const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

    fn connection(user: i64, sink: RecordingSink) -> Arc<Connection> {
        Arc::new(Connection::new(UserId(user), sink, WRITE_TIMEOUT))
    }

    #[tokio::test]
    async fn test_fan_out_to_every_connection_of_user() {
        let hub = ConnectionHub::new();
        let (a, b, other) = (
            RecordingSink::default(),
            RecordingSink::default(),
            RecordingSink::default(),
        );
        hub.register(connection(1, a.clone())).await;
        hub.register(connection(1, b.clone())).await;
        hub.register(connection(2, other.clone())).await;

        let delivered = hub.send_to_user(UserId(1), &json!({"n": 1})).await.unwrap();

        assert_eq!(delivered, 2);
        assert_eq!(a.frames(), vec![r#"{"n":1}"#]);
        assert_eq!(a.frames(), b.frames());
        assert!(other.frames().is_empty());
    }

    #[tokio::test]
    async fn test_send_to_offline_user_is_noop() {
        let hub = ConnectionHub::new();
        let delivered = hub.send_to_user(UserId(99), &json!({})).await.unwrap();
        assert_eq!(delivered, 0);
        assert_eq!(hub.connection_count().await, 0);
        assert!(!hub.is_online(UserId(99)).await);
    }

    #[tokio::test]
    async fn test_failed_write_does_not_abort_others_or_unregister() {
        let hub = ConnectionHub::new();
        let good = RecordingSink::default();
        hub.register(connection(1, RecordingSink::failing())).await;
        hub.register(connection(1, good.clone())).await;

        let delivered = hub.send_to_user(UserId(1), &json!("hi")).await.unwrap();

        assert_eq!(delivered, 1);
        assert_eq!(good.frames().len(), 1);
        assert_eq!(hub.connection_count().await, 2);
    }

    #[tokio::test]
    async fn test_unregister_is_idempotent_and_drops_empty_user() {
        let hub = ConnectionHub::new();
        let first = connection(7, RecordingSink::default());
        let second = connection(7, RecordingSink::default());
        hub.register(first.clone()).await;
        hub.register(second.clone()).await;
        assert_eq!(hub.online_users().await, 1);

        hub.unregister(&first).await;
        hub.unregister(&first).await;
        assert!(hub.is_online(UserId(7)).await);
        assert_eq!(hub.connection_count().await, 1);

        hub.unregister(&second).await;
        assert!(!hub.is_online(UserId(7)).await);
        assert_eq!(hub.online_users().await, 0);
    }

    #[tokio::test]
    async fn test_register_twice_keeps_one_entry() {
        let hub = ConnectionHub::new();
        let conn = connection(3, RecordingSink::default());
        hub.register(conn.clone()).await;
        hub.register(conn).await;
        assert_eq!(hub.connection_count().await, 1);
    }

    #[tokio::test]
    async fn test_close_all_closes_and_empties() {
        let hub = ConnectionHub::new();
        let sink = RecordingSink::default();
        let conn = connection(1, sink.clone());
        hub.register(conn.clone()).await;

        hub.close_all().await;

        assert_eq!(hub.connection_count().await, 0);
        assert!(*sink.closed.lock().unwrap());
        assert!(!conn.is_alive());
    }
}
