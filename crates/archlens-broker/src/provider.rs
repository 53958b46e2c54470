//! Broker manager that dispatches to the configured backend.

use std::sync::Arc;

use tracing::info;

use archlens_core::config::BrokerConfig;
use archlens_core::error::AppError;
use archlens_core::result::AppResult;
use archlens_core::traits::{PubSubBackend, QueueBackend};

/// Holds the queue and pub/sub backends selected by configuration.
///
/// Both halves share one connection pool when the provider is Redis.
#[derive(Debug, Clone)]
pub struct BrokerManager {
    queue: Arc<dyn QueueBackend>,
    pubsub: Arc<dyn PubSubBackend>,
}

impl BrokerManager {
    /// Create a new broker manager from configuration.
    pub async fn new(config: &BrokerConfig) -> AppResult<Self> {
        match config.provider.as_str() {
            #[cfg(feature = "redis-backend")]
            "redis" => {
                info!("Initializing Redis broker");
                let client = crate::redis::RedisClient::connect(&config.redis).await?;
                Ok(Self {
                    queue: Arc::new(crate::redis::RedisQueueBackend::new(client.clone())),
                    pubsub: Arc::new(crate::redis::RedisPubSubBackend::new(client)),
                })
            }
            #[cfg(feature = "memory")]
            "memory" => {
                info!("Initializing in-memory broker");
                Ok(Self::memory(config.memory_channel_buffer))
            }
            other => Err(AppError::configuration(format!(
                "Unknown broker provider: '{other}'. Supported: memory, redis"
            ))),
        }
    }

    /// Create an in-process broker.
    #[cfg(feature = "memory")]
    pub fn memory(channel_buffer: usize) -> Self {
        Self {
            queue: Arc::new(crate::memory::MemoryQueueBackend::new()),
            pubsub: Arc::new(crate::memory::MemoryPubSubBackend::new(channel_buffer)),
        }
    }

    /// Create a broker manager from existing backends (for testing).
    pub fn from_backends(queue: Arc<dyn QueueBackend>, pubsub: Arc<dyn PubSubBackend>) -> Self {
        Self { queue, pubsub }
    }

    /// The work queue backend.
    pub fn queue(&self) -> Arc<dyn QueueBackend> {
        Arc::clone(&self.queue)
    }

    /// The pub/sub backend.
    pub fn pubsub(&self) -> Arc<dyn PubSubBackend> {
        Arc::clone(&self.pubsub)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unknown_provider_is_rejected() {
        let config = BrokerConfig {
            provider: "kafka".to_string(),
            ..BrokerConfig::default()
        };
        let err = BrokerManager::new(&config).await.unwrap_err();
        assert!(err.to_string().contains("kafka"));
    }

    #[cfg(feature = "memory")]
    #[tokio::test]
    async fn test_memory_provider_from_config() {
        let config = BrokerConfig {
            provider: "memory".to_string(),
            ..BrokerConfig::default()
        };
        let broker = BrokerManager::new(&config).await.unwrap();
        assert!(broker.queue().health_check().await.unwrap());
    }
}
