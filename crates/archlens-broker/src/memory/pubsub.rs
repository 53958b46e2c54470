//! In-memory pub/sub for single-node deployments.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::RwLock;
use tokio::sync::broadcast;
use tracing::warn;

use archlens_core::result::AppResult;
use archlens_core::traits::{PubSubBackend, PubSubStream};

/// In-memory implementation of [`PubSubBackend`].
#[derive(Debug, Clone)]
pub struct MemoryPubSubBackend {
    /// Channel name → broadcast sender
    channels: Arc<RwLock<HashMap<String, broadcast::Sender<String>>>>,
    /// Buffer size for channels
    buffer_size: usize,
}

impl MemoryPubSubBackend {
    /// Create a new in-memory pub/sub
    pub fn new(buffer_size: usize) -> Self {
        Self {
            channels: Arc::new(RwLock::new(HashMap::new())),
            buffer_size: buffer_size.max(1),
        }
    }
}

#[async_trait]
impl PubSubBackend for MemoryPubSubBackend {
    async fn publish(&self, channel: &str, payload: &str) -> AppResult<u64> {
        let channels = self.channels.read().await;
        let receivers = channels
            .get(channel)
            .and_then(|tx| tx.send(payload.to_string()).ok())
            .unwrap_or(0);
        Ok(receivers as u64)
    }

    async fn subscribe(&self, channel: &str) -> AppResult<PubSubStream> {
        let rx = {
            let mut channels = self.channels.write().await;
            channels
                .entry(channel.to_string())
                .or_insert_with(|| broadcast::channel(self.buffer_size).0)
                .subscribe()
        };
        let channel = channel.to_string();

        let stream = futures::stream::unfold(rx, move |mut rx| {
            let channel = channel.clone();
            async move {
                loop {
                    match rx.recv().await {
                        Ok(payload) => return Some((Ok(payload), rx)),
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(channel = %channel, skipped, "Pub/sub subscriber lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => return None,
                    }
                }
            }
        });
        Ok(stream.boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_without_subscribers_is_dropped() {
        let pubsub = MemoryPubSubBackend::new(8);
        assert_eq!(pubsub.publish("progress", "lost").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_every_subscriber_receives_in_order() {
        let pubsub = MemoryPubSubBackend::new(8);
        let mut first = pubsub.subscribe("progress").await.unwrap();
        let mut second = pubsub.subscribe("progress").await.unwrap();

        assert_eq!(pubsub.publish("progress", "a").await.unwrap(), 2);
        pubsub.publish("progress", "b").await.unwrap();

        for stream in [&mut first, &mut second] {
            assert_eq!(stream.next().await.unwrap().unwrap(), "a");
            assert_eq!(stream.next().await.unwrap().unwrap(), "b");
        }
    }

    #[tokio::test]
    async fn test_channels_are_isolated() {
        let pubsub = MemoryPubSubBackend::new(8);
        let mut progress = pubsub.subscribe("progress").await.unwrap();
        pubsub.publish("other", "x").await.unwrap();
        pubsub.publish("progress", "y").await.unwrap();
        assert_eq!(progress.next().await.unwrap().unwrap(), "y");
    }
}
