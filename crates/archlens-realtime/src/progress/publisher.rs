//! Worker-side progress publisher.

use std::sync::Arc;

use tracing::debug;

use archlens_core::messages::{ProgressMessage, Step};
use archlens_core::result::AppResult;
use archlens_core::traits::PubSubBackend;

/// Publishes progress events on the progress channel.
#[derive(Debug, Clone)]
pub struct ProgressPublisher {
    pubsub: Arc<dyn PubSubBackend>,
    channel: String,
}

impl ProgressPublisher {
    /// Create a publisher for `channel`.
    pub fn new(pubsub: Arc<dyn PubSubBackend>, channel: impl Into<String>) -> Self {
        Self {
            pubsub,
            channel: channel.into(),
        }
    }

    /// Publish one event, filling `progress` and `message` from the step
    /// table when unset.
    ///
    /// Delivery is fire-and-forget; returns how many subscribers received
    /// it. Publish failures propagate without retry.
    pub async fn publish_progress(&self, mut msg: ProgressMessage) -> AppResult<u64> {
        msg.fill_defaults();
        let payload = serde_json::to_string(&msg)?;
        let receivers = self.pubsub.publish(&self.channel, &payload).await?;

        debug!(
            user_id = %msg.user_id,
            job_id = %msg.job_id,
            step = msg.step.as_ref().map(Step::as_str).unwrap_or("-"),
            progress = msg.progress,
            receivers,
            "Progress published"
        );
        Ok(receivers)
    }
}
