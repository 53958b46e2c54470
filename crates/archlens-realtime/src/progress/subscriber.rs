//! API-side progress subscriber.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use archlens_core::messages::ProgressMessage;
use archlens_core::traits::PubSubBackend;

/// Consumes the progress channel and hands each event to a callback.
#[derive(Debug, Clone)]
pub struct ProgressSubscriber {
    pubsub: Arc<dyn PubSubBackend>,
    channel: String,
    resubscribe_delay: Duration,
}

impl ProgressSubscriber {
    /// Create a subscriber for `channel`.
    ///
    /// `resubscribe_delay` is the pause before subscribing again after the
    /// subscription fails or is lost.
    pub fn new(
        pubsub: Arc<dyn PubSubBackend>,
        channel: impl Into<String>,
        resubscribe_delay: Duration,
    ) -> Self {
        Self {
            pubsub,
            channel: channel.into(),
            resubscribe_delay,
        }
    }

    /// Run until `cancel` fires.
    ///
    /// Each event is parsed, completed from the step table, and passed to
    /// `callback`, which is awaited before the next event is read. Malformed
    /// payloads are logged and dropped.
    pub async fn subscribe<F, Fut>(&self, cancel: CancellationToken, mut callback: F)
    where
        F: FnMut(ProgressMessage) -> Fut + Send,
        Fut: Future<Output = ()> + Send,
    {
        loop {
            let subscribed = tokio::select! {
                _ = cancel.cancelled() => break,
                subscribed = self.pubsub.subscribe(&self.channel) => subscribed,
            };

            match subscribed {
                Ok(mut stream) => {
                    info!(channel = %self.channel, "Subscribed to progress channel");
                    loop {
                        let item = tokio::select! {
                            biased;
                            _ = cancel.cancelled() => break,
                            item = stream.next() => item,
                        };
                        match item {
                            Some(Ok(payload)) => match parse(&payload) {
                                Some(msg) => callback(msg).await,
                                None => continue,
                            },
                            Some(Err(e)) => {
                                warn!(channel = %self.channel, error = %e, "Progress receive error");
                            }
                            None => {
                                warn!(channel = %self.channel, "Progress subscription lost");
                                break;
                            }
                        }
                    }
                }
                Err(e) => {
                    warn!(channel = %self.channel, error = %e, "Failed to subscribe to progress channel");
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.resubscribe_delay) => {}
            }
        }

        info!(channel = %self.channel, "Progress subscriber stopped");
    }
}

fn parse(payload: &str) -> Option<ProgressMessage> {
    match serde_json::from_str::<ProgressMessage>(payload) {
        Ok(mut msg) => {
            msg.fill_defaults();
            Some(msg)
        }
        Err(e) => {
            warn!(error = %e, payload_len = payload.len(), "Dropping malformed progress message");
            None
        }
    }
}
