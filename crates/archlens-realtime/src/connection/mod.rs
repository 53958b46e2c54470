//! WebSocket connection management: handles, heartbeat, socket adapters, auth.

pub mod authenticator;
pub mod handle;
pub mod heartbeat;
pub mod socket;

pub use handle::{Connection, ConnectionId, FrameSink};
pub use heartbeat::{HeartbeatConfig, InboundFrame};
