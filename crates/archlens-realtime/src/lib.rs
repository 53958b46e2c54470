//! # archlens-realtime
//!
//! Real-time delivery of analysis progress to browsers. Provides:
//!
//! - The connection hub: a registry of live WebSocket connections per user
//!   with serialized writes and fan-out
//! - Per-connection heartbeat and read-idle supervision
//! - The progress channel publisher and subscriber over the broker
//! - The engine tying the subscriber to the hub

pub mod connection;
pub mod hub;
pub mod message;
pub mod progress;
pub mod server;

#[cfg(test)]
pub(crate) mod testing;

pub use connection::Connection;
pub use hub::ConnectionHub;
pub use progress::{ProgressPublisher, ProgressSubscriber};
pub use server::RealtimeEngine;
