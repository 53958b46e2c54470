//! Redis-backed publish/subscribe.

use async_trait::async_trait;
use futures::StreamExt;
use redis::AsyncCommands;
use tracing::debug;

use archlens_core::error::{AppError, ErrorKind};
use archlens_core::result::AppResult;
use archlens_core::traits::{PubSubBackend, PubSubStream};

use super::client::RedisClient;
use super::map_err;

/// Redis implementation of [`PubSubBackend`].
///
/// Publishing reuses the shared command connection. Each subscription owns
/// a dedicated connection; its stream ends when that connection drops.
#[derive(Debug, Clone)]
pub struct RedisPubSubBackend {
    client: RedisClient,
}

impl RedisPubSubBackend {
    /// Create a pub/sub backend over an existing client.
    pub fn new(client: RedisClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PubSubBackend for RedisPubSubBackend {
    async fn publish(&self, channel: &str, payload: &str) -> AppResult<u64> {
        let mut conn = self.client.conn_mut();
        let receivers: i64 = conn.publish(channel, payload).await.map_err(map_err)?;
        Ok(receivers.max(0) as u64)
    }

    async fn subscribe(&self, channel: &str) -> AppResult<PubSubStream> {
        let mut pubsub = self.client.pubsub().await?;
        pubsub.subscribe(channel).await.map_err(map_err)?;
        debug!(channel = %channel, "Subscribed to Redis channel");

        let stream = pubsub.into_on_message().map(|msg| {
            msg.get_payload::<String>().map_err(|e| {
                AppError::with_source(
                    ErrorKind::Serialization,
                    format!("Invalid pub/sub payload: {e}"),
                    e,
                )
            })
        });
        Ok(stream.boxed())
    }
}
