//! Adapters between axum WebSockets and the connection lifecycle.

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, Stream, StreamExt};

use archlens_core::error::{AppError, ErrorKind};
use archlens_core::result::AppResult;

use super::handle::FrameSink;
use super::heartbeat::InboundFrame;

/// Write half of an axum WebSocket.
pub struct WsFrameSink(SplitSink<WebSocket, Message>);

impl WsFrameSink {
    /// Wrap the write half of a split socket.
    pub fn new(sink: SplitSink<WebSocket, Message>) -> Self {
        Self(sink)
    }
}

fn write_error(e: axum::Error) -> AppError {
    AppError::with_source(ErrorKind::ServiceUnavailable, format!("WebSocket write failed: {e}"), e)
}

#[async_trait]
impl FrameSink for WsFrameSink {
    async fn send_text(&mut self, text: &str) -> AppResult<()> {
        self.0
            .send(Message::Text(text.to_owned().into()))
            .await
            .map_err(write_error)
    }

    async fn send_ping(&mut self) -> AppResult<()> {
        self.0
            .send(Message::Ping(Default::default()))
            .await
            .map_err(write_error)
    }

    async fn close(&mut self) -> AppResult<()> {
        let _ = self.0.send(Message::Close(None)).await;
        self.0.close().await.map_err(write_error)
    }
}

/// Map the read half of a socket to liveness frames.
pub fn inbound_frames(
    stream: SplitStream<WebSocket>,
) -> impl Stream<Item = Result<InboundFrame, axum::Error>> + Send + Unpin {
    stream.map(|frame| {
        frame.map(|msg| match msg {
            Message::Close(_) => InboundFrame::Close,
            _ => InboundFrame::Activity,
        })
    })
}

/// Split a socket into its sink adapter and liveness stream.
pub fn split(
    socket: WebSocket,
) -> (
    WsFrameSink,
    impl Stream<Item = Result<InboundFrame, axum::Error>> + Send + Unpin,
) {
    let (sink, stream) = socket.split();
    (WsFrameSink::new(sink), inbound_frames(stream))
}
