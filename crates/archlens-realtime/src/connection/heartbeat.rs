//! Connection lifecycle: ping emitter and read-idle supervision.
//!
//! Each connection runs two tasks bound to its cancellation token: this
//! read loop and a ping emitter. Whichever ends first cancels the other,
//! then the connection is unregistered and closed.

use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use futures::{Stream, StreamExt};
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use archlens_core::config::RealtimeConfig;

use super::handle::Connection;
use crate::hub::ConnectionHub;

/// Heartbeat configuration
#[derive(Debug, Clone, Copy)]
pub struct HeartbeatConfig {
    /// Interval between pings
    pub ping_interval: Duration,
    /// Maximum silence from the client before it is considered gone
    pub read_timeout: Duration,
}

impl From<&RealtimeConfig> for HeartbeatConfig {
    fn from(config: &RealtimeConfig) -> Self {
        Self {
            ping_interval: Duration::from_secs(config.ping_interval_seconds),
            read_timeout: Duration::from_secs(config.read_timeout_seconds),
        }
    }
}

/// What an inbound frame means for liveness.
///
/// Client payloads carry no commands; any frame proves the peer is alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundFrame {
    /// Data, ping or pong frame.
    Activity,
    /// The client closed the socket.
    Close,
}

/// Why a connection ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Client sent a close frame or the stream ended.
    ClientClosed,
    /// Nothing was read within the read timeout.
    ReadTimeout,
    /// Reading from the socket failed.
    ReadError(String),
    /// A ping could not be written, or the server shut the connection.
    Cancelled,
}

/// Serve a registered connection until it disconnects.
///
/// Registers `conn` with the hub, supervises it, and always unregisters and
/// closes it before returning.
pub async fn run_connection<S, E>(
    hub: Arc<ConnectionHub>,
    conn: Arc<Connection>,
    inbound: S,
    config: HeartbeatConfig,
) -> DisconnectReason
where
    S: Stream<Item = Result<InboundFrame, E>> + Send + Unpin,
    E: Display + Send,
{
    hub.register(Arc::clone(&conn)).await;

    let pinger = tokio::spawn(run_pings(Arc::clone(&conn), config.ping_interval));
    let reason = read_loop(&conn, inbound, config.read_timeout).await;

    conn.cancellation().cancel();
    let _ = pinger.await;

    hub.unregister(&conn).await;
    conn.close().await;

    info!(
        conn_id = %conn.id,
        user_id = %conn.user_id,
        reason = ?reason,
        "WebSocket connection closed"
    );
    reason
}

async fn read_loop<S, E>(conn: &Connection, mut inbound: S, read_timeout: Duration) -> DisconnectReason
where
    S: Stream<Item = Result<InboundFrame, E>> + Unpin,
    E: Display + Send,
{
    let cancel = conn.cancellation();
    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => return DisconnectReason::Cancelled,
            next = time::timeout(read_timeout, inbound.next()) => next,
        };

        match next {
            Err(_) => {
                warn!(conn_id = %conn.id, user_id = %conn.user_id, "Read deadline exceeded");
                return DisconnectReason::ReadTimeout;
            }
            Ok(None) | Ok(Some(Ok(InboundFrame::Close))) => return DisconnectReason::ClientClosed,
            Ok(Some(Err(e))) => {
                debug!(conn_id = %conn.id, error = %e, "WebSocket read error");
                return DisconnectReason::ReadError(e.to_string());
            }
            Ok(Some(Ok(InboundFrame::Activity))) => {}
        }
    }
}

/// Send a ping every `interval` until the connection is cancelled or a
/// ping cannot be written.
async fn run_pings(conn: Arc<Connection>, interval: Duration) {
    let cancel = conn.cancellation().clone();
    let mut ticker = time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                if let Err(e) = conn.send_ping().await {
                    debug!(conn_id = %conn.id, error = %e, "Ping failed, closing connection");
                    cancel.cancel();
                    break;
                }
            }
        }
    }

    debug!(conn_id = %conn.id, "Heartbeat loop ended");
}

#[cfg(test)]
mod tests {
    use futures::channel::mpsc;

    use archlens_core::types::UserId;

    use super::*;
    use crate::testing::RecordingSink;

    const CONFIG: HeartbeatConfig = HeartbeatConfig {
        ping_interval: Duration::from_secs(30),
        read_timeout: Duration::from_secs(60),
    };

    fn spawn_connection(
        hub: &Arc<ConnectionHub>,
        sink: RecordingSink,
    ) -> (
        Arc<Connection>,
        mpsc::UnboundedSender<Result<InboundFrame, String>>,
        tokio::task::JoinHandle<DisconnectReason>,
    ) {
        let conn = Arc::new(Connection::new(UserId(1), sink, Duration::from_secs(10)));
        let (tx, rx) = mpsc::unbounded();
        let task = tokio::spawn(run_connection(Arc::clone(hub), Arc::clone(&conn), rx, CONFIG));
        (conn, tx, task)
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_client_times_out_and_is_unregistered() {
        let hub = Arc::new(ConnectionHub::new());
        let sink = RecordingSink::default();
        let (conn, _tx, task) = spawn_connection(&hub, sink.clone());

        let reason = task.await.unwrap();

        assert_eq!(reason, DisconnectReason::ReadTimeout);
        assert!(!hub.is_online(UserId(1)).await);
        assert!(!conn.is_alive());
        assert!(*sink.closed.lock().unwrap());
        assert!(*sink.pings.lock().unwrap() >= 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_activity_resets_read_deadline() {
        let hub = Arc::new(ConnectionHub::new());
        let (_conn, tx, task) = spawn_connection(&hub, RecordingSink::default());

        for _ in 0..3 {
            time::sleep(Duration::from_secs(45)).await;
            tx.unbounded_send(Ok(InboundFrame::Activity)).unwrap();
        }
        assert!(hub.is_online(UserId(1)).await);

        tx.unbounded_send(Ok(InboundFrame::Close)).unwrap();
        assert_eq!(task.await.unwrap(), DisconnectReason::ClientClosed);
        assert!(!hub.is_online(UserId(1)).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_error_disconnects() {
        let hub = Arc::new(ConnectionHub::new());
        let (_conn, tx, task) = spawn_connection(&hub, RecordingSink::default());

        tx.unbounded_send(Err("connection reset".to_string())).unwrap();

        assert_eq!(
            task.await.unwrap(),
            DisconnectReason::ReadError("connection reset".to_string())
        );
        assert_eq!(hub.connection_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_ping_tears_down_read_loop() {
        let hub = Arc::new(ConnectionHub::new());
        let (_conn, _tx, task) = spawn_connection(&hub, RecordingSink::failing());

        assert_eq!(task.await.unwrap(), DisconnectReason::Cancelled);
        assert_eq!(hub.connection_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_close_ends_connection() {
        let hub = Arc::new(ConnectionHub::new());
        let (conn, _tx, task) = spawn_connection(&hub, RecordingSink::default());
        tokio::task::yield_now().await;

        conn.close().await;

        assert_eq!(task.await.unwrap(), DisconnectReason::Cancelled);
    }
}
