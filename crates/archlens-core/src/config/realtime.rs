//! Real-time WebSocket configuration.

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Real-time (WebSocket) delivery configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// WebSocket ping interval in seconds.
    #[serde(default = "default_ping_interval")]
    pub ping_interval_seconds: u64,
    /// Read-idle timeout in seconds; must exceed the ping interval.
    #[serde(default = "default_read_timeout")]
    pub read_timeout_seconds: u64,
    /// Per-frame write timeout in seconds.
    #[serde(default = "default_write_timeout")]
    pub write_timeout_seconds: u64,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            ping_interval_seconds: default_ping_interval(),
            read_timeout_seconds: default_read_timeout(),
            write_timeout_seconds: default_write_timeout(),
        }
    }
}

impl RealtimeConfig {
    /// A pong can only keep a connection alive if pings go out more often
    /// than the read deadline.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.ping_interval_seconds == 0 {
            return Err(AppError::configuration(
                "realtime.ping_interval_seconds must be positive",
            ));
        }
        if self.ping_interval_seconds >= self.read_timeout_seconds {
            return Err(AppError::configuration(format!(
                "realtime.ping_interval_seconds ({}) must be shorter than read_timeout_seconds ({})",
                self.ping_interval_seconds, self.read_timeout_seconds
            )));
        }
        Ok(())
    }
}

fn default_ping_interval() -> u64 {
    30
}

fn default_read_timeout() -> u64 {
    60
}

fn default_write_timeout() -> u64 {
    10
}
