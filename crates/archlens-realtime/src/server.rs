//! Top-level real-time engine that ties the progress channel to the hub.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::WebSocket;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

use archlens_core::config::RealtimeConfig;
use archlens_core::types::UserId;

use crate::connection::heartbeat::{self, HeartbeatConfig};
use crate::connection::{Connection, socket};
use crate::hub::ConnectionHub;
use crate::message::Envelope;
use crate::progress::ProgressSubscriber;

/// Coordinates WebSocket connections and progress fan-out for one process.
#[derive(Clone)]
pub struct RealtimeEngine {
    /// Connection hub.
    hub: Arc<ConnectionHub>,
    /// Progress channel subscriber.
    subscriber: ProgressSubscriber,
    /// Heartbeat settings applied to every connection.
    heartbeat: HeartbeatConfig,
    /// Write timeout applied to every connection.
    write_timeout: Duration,
    /// Cancelled on shutdown.
    shutdown: CancellationToken,
    /// Subscriber and connection tasks.
    tasks: TaskTracker,
}

impl std::fmt::Debug for RealtimeEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeEngine")
            .field("heartbeat", &self.heartbeat)
            .finish_non_exhaustive()
    }
}

impl RealtimeEngine {
    /// Creates a new real-time engine.
    pub fn new(config: &RealtimeConfig, subscriber: ProgressSubscriber) -> Self {
        info!("Real-time engine initialized");
        Self {
            hub: Arc::new(ConnectionHub::new()),
            subscriber,
            heartbeat: HeartbeatConfig::from(config),
            write_timeout: Duration::from_secs(config.write_timeout_seconds),
            shutdown: CancellationToken::new(),
            tasks: TaskTracker::new(),
        }
    }

    /// The connection hub.
    pub fn hub(&self) -> &Arc<ConnectionHub> {
        &self.hub
    }

    /// Spawn the progress subscriber, forwarding each event to the
    /// connections of its user.
    pub fn start(&self) {
        let hub = Arc::clone(&self.hub);
        let subscriber = self.subscriber.clone();
        let cancel = self.shutdown.child_token();

        self.tasks.spawn(async move {
            subscriber
                .subscribe(cancel, move |msg| {
                    let hub = Arc::clone(&hub);
                    async move {
                        if let Err(e) = hub.send_to_user(msg.user_id, &Envelope::progress(&msg)).await {
                            warn!(user_id = %msg.user_id, error = %e, "Failed to forward progress");
                        }
                    }
                })
                .await;
        });
    }

    /// Serve an upgraded socket for `user_id` until it disconnects.
    pub async fn serve_socket(&self, socket: WebSocket, user_id: UserId) {
        let (sink, inbound) = socket::split(socket);
        let conn = Arc::new(Connection::new(user_id, sink, self.write_timeout));
        self.serve_connection(conn, inbound).await;
    }

    /// Serve an already constructed connection.
    ///
    /// Engine shutdown cancels the connection even when it registers after
    /// [`shutdown`](Self::shutdown) already closed the hub.
    pub async fn serve_connection<S, E>(&self, conn: Arc<Connection>, inbound: S)
    where
        S: futures::Stream<Item = Result<heartbeat::InboundFrame, E>> + Send + Unpin,
        E: std::fmt::Display + Send,
    {
        let shutdown = self.shutdown.clone();
        let conn_cancel = conn.cancellation().clone();
        self.tasks.spawn(async move {
            tokio::select! {
                _ = shutdown.cancelled() => conn_cancel.cancel(),
                _ = conn_cancel.cancelled() => {}
            }
        });

        self.tasks
            .track_future(heartbeat::run_connection(
                Arc::clone(&self.hub),
                conn,
                inbound,
                self.heartbeat,
            ))
            .await;
    }

    /// Stop the subscriber, close every connection, and wait up to `grace`
    /// for their tasks to finish.
    pub async fn shutdown(&self, grace: Duration) {
        info!("Shutting down real-time engine");

        self.shutdown.cancel();
        self.hub.close_all().await;

        self.tasks.close();
        if tokio::time::timeout(grace, self.tasks.wait()).await.is_err() {
            warn!("Real-time tasks still running after grace period");
        }

        info!("Real-time engine shut down");
    }
}

#[cfg(test)]
mod tests {
    use futures::channel::mpsc;

    use archlens_broker::memory::MemoryPubSubBackend;

    use super::*;
    use crate::connection::InboundFrame;
    use crate::testing::RecordingSink;

    fn engine() -> RealtimeEngine {
        let subscriber = ProgressSubscriber::new(
            Arc::new(MemoryPubSubBackend::new(4)),
            "analysis:progress",
            Duration::from_millis(10),
        );
        RealtimeEngine::new(&RealtimeConfig::default(), subscriber)
    }

    fn connection(sink: RecordingSink) -> Arc<Connection> {
        Arc::new(Connection::new(UserId(3), sink, Duration::from_secs(10)))
    }

    #[tokio::test(start_paused = true)]
    async fn test_connection_after_shutdown_is_closed_at_once() {
        let engine = engine();
        engine.shutdown(Duration::from_secs(1)).await;

        let sink = RecordingSink::default();
        let conn = connection(sink.clone());
        let (_tx, rx) = mpsc::unbounded::<Result<InboundFrame, String>>();

        let serving = engine.serve_connection(Arc::clone(&conn), rx);
        tokio::time::timeout(Duration::from_secs(1), serving)
            .await
            .expect("connection should end without waiting for a read timeout");

        assert!(!conn.is_alive());
        assert!(*sink.closed.lock().unwrap());
        assert_eq!(engine.hub().connection_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_token_ends_connection_missed_by_close_all() {
        let engine = engine();
        let conn = connection(RecordingSink::default());
        let (_tx, rx) = mpsc::unbounded::<Result<InboundFrame, String>>();
        let serving = tokio::spawn({
            let engine = engine.clone();
            let conn = Arc::clone(&conn);
            async move { engine.serve_connection(conn, rx).await }
        });

        while engine.hub().connection_count().await == 0 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        // Only the token: the hub sweep already ran before this registration.
        engine.shutdown.cancel();

        tokio::time::timeout(Duration::from_secs(1), serving)
            .await
            .expect("connection should end on engine shutdown")
            .unwrap();
        assert!(!conn.is_alive());
        assert_eq!(engine.hub().connection_count().await, 0);
    }
}
