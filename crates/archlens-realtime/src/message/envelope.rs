//! Message envelope for framing WebSocket messages.

use serde::Serialize;

use archlens_core::messages::{PROGRESS_MESSAGE_TYPE, ProgressMessage};

/// Envelope wrapping every server-to-client frame as `{"type", "data"}`.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope<'a, T> {
    /// Discriminator the client dispatches on.
    #[serde(rename = "type")]
    pub kind: &'a str,
    /// The message payload.
    pub data: T,
}

impl<'a, T: Serialize> Envelope<'a, T> {
    /// Create a new envelope.
    pub fn new(kind: &'a str, data: T) -> Self {
        Self { kind, data }
    }
}

impl<'a> Envelope<'a, &'a ProgressMessage> {
    /// Envelope for a job progress event.
    pub fn progress(msg: &'a ProgressMessage) -> Self {
        Self::new(PROGRESS_MESSAGE_TYPE, msg)
    }
}
