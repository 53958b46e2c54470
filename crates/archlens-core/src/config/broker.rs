//! Message broker configuration.

use serde::{Deserialize, Serialize};

/// Top-level broker configuration shared by the queue and the progress
/// channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Broker provider type: `"redis"` or `"memory"`.
    ///
    /// `"memory"` only works when the API and the worker share a process.
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Pub/sub channel carrying progress events.
    #[serde(default = "default_progress_channel")]
    pub progress_channel: String,
    /// Redis-specific settings.
    #[serde(default)]
    pub redis: RedisBrokerConfig,
    /// Buffer size of in-memory pub/sub channels.
    #[serde(default = "default_memory_buffer")]
    pub memory_channel_buffer: usize,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            progress_channel: default_progress_channel(),
            redis: RedisBrokerConfig::default(),
            memory_channel_buffer: default_memory_buffer(),
        }
    }
}

/// Redis broker backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisBrokerConfig {
    /// Redis connection URL.
    #[serde(default = "default_redis_url")]
    pub url: String,
    /// Key prefix for queue lists and lease sets. Pub/sub channel names are
    /// not prefixed so external workers can use them verbatim.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
    /// Delay in seconds before re-subscribing after a lost subscription.
    #[serde(default = "default_resubscribe_delay")]
    pub resubscribe_delay_seconds: u64,
}

impl Default for RedisBrokerConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            key_prefix: default_key_prefix(),
            resubscribe_delay_seconds: default_resubscribe_delay(),
        }
    }
}

fn default_provider() -> String {
    "redis".to_string()
}

fn default_progress_channel() -> String {
    "analysis:progress".to_string()
}

fn default_memory_buffer() -> usize {
    256
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_key_prefix() -> String {
    "archlens:".to_string()
}

fn default_resubscribe_delay() -> u64 {
    2
}
