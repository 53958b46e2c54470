//! Individual WebSocket connection handle.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use archlens_core::error::{AppError, ErrorKind};
use archlens_core::result::AppResult;
use archlens_core::types::UserId;

/// Unique connection identifier
pub type ConnectionId = Uuid;

/// Write half of a client socket.
#[async_trait]
pub trait FrameSink: Send + 'static {
    /// Send a text frame.
    async fn send_text(&mut self, text: &str) -> AppResult<()>;

    /// Send a ping control frame.
    async fn send_ping(&mut self) -> AppResult<()>;

    /// Send a close frame and flush.
    async fn close(&mut self) -> AppResult<()>;
}

/// A handle to a single WebSocket connection.
///
/// Writes are serialized by a per-connection lock and bounded by the write
/// timeout. The cancellation token ends the connection's read loop and
/// heartbeat together.
pub struct Connection {
    /// Unique connection ID
    pub id: ConnectionId,
    /// User who owns this connection
    pub user_id: UserId,
    /// When the connection was established
    pub connected_at: DateTime<Utc>,
    sink: Mutex<Box<dyn FrameSink>>,
    write_timeout: Duration,
    cancel: CancellationToken,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("connected_at", &self.connected_at)
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// Create a new connection handle
    pub fn new(user_id: UserId, sink: impl FrameSink, write_timeout: Duration) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            connected_at: Utc::now(),
            sink: Mutex::new(Box::new(sink)),
            write_timeout,
            cancel: CancellationToken::new(),
        }
    }

    /// Write a text frame.
    pub async fn send_text(&self, text: &str) -> AppResult<()> {
        let mut sink = self.sink.lock().await;
        tokio::time::timeout(self.write_timeout, sink.send_text(text))
            .await
            .map_err(|_| self.write_timed_out())?
    }

    /// Write a ping frame.
    pub async fn send_ping(&self) -> AppResult<()> {
        let mut sink = self.sink.lock().await;
        tokio::time::timeout(self.write_timeout, sink.send_ping())
            .await
            .map_err(|_| self.write_timed_out())?
    }

    /// Signal the connection's tasks to stop and send a close frame.
    pub async fn close(&self) {
        self.cancel.cancel();
        let mut sink = self.sink.lock().await;
        if let Ok(Err(e)) = tokio::time::timeout(self.write_timeout, sink.close()).await {
            tracing::debug!(conn_id = %self.id, error = %e, "Close frame not delivered");
        }
    }

    /// Token cancelled when the connection is torn down.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Check if connection is alive
    pub fn is_alive(&self) -> bool {
        !self.cancel.is_cancelled()
    }

    fn write_timed_out(&self) -> AppError {
        AppError::new(
            ErrorKind::ServiceUnavailable,
            format!("Write to connection {} timed out", self.id),
        )
    }
}
