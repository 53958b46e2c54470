//! Outbound WebSocket message framing.

pub mod envelope;

pub use envelope::Envelope;
