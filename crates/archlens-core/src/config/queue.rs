//! Work queue configuration.

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Analysis job queue configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Logical queue name; the broker key is `<key_prefix>queue:<name>`.
    #[serde(default = "default_name")]
    pub name: String,
    /// How long a consumer blocks on an empty queue before re-checking for
    /// shutdown, in seconds.
    #[serde(default = "default_pop_timeout")]
    pub pop_timeout_seconds: u64,
    /// Lease granted to a popped job; unacknowledged jobs are requeued after
    /// it expires.
    #[serde(default = "default_lease")]
    pub lease_seconds: u64,
    /// Interval between expired-lease sweeps, in seconds.
    #[serde(default = "default_reap_interval")]
    pub reap_interval_seconds: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            pop_timeout_seconds: default_pop_timeout(),
            lease_seconds: default_lease(),
            reap_interval_seconds: default_reap_interval(),
        }
    }
}

impl QueueConfig {
    /// Reject settings that would make every job look abandoned.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.name.trim().is_empty() {
            return Err(AppError::configuration("queue.name must not be empty"));
        }
        if self.lease_seconds == 0 {
            return Err(AppError::configuration("queue.lease_seconds must be positive"));
        }
        Ok(())
    }
}

fn default_name() -> String {
    "analysis".to_string()
}

fn default_pop_timeout() -> u64 {
    5
}

fn default_lease() -> u64 {
    1800
}

fn default_reap_interval() -> u64 {
    60
}
