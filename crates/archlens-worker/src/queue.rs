//! Named FIFO queue of analysis jobs over the broker.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use archlens_core::config::QueueConfig;
use archlens_core::error::{AppError, ErrorKind};
use archlens_core::messages::JobMessage;
use archlens_core::result::AppResult;
use archlens_core::traits::QueueBackend;

/// A job popped from the queue, held under lease until acknowledged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// The decoded job.
    pub job: JobMessage,
    /// Broker receipt of this one delivery.
    receipt: String,
}

/// Queue depth snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    /// Queue name.
    pub queue: String,
    /// Jobs waiting to be popped.
    pub pending: u64,
    /// Jobs popped and not yet acknowledged.
    pub in_flight: u64,
}

/// Job queue for enqueuing and dequeuing analysis work.
#[derive(Debug, Clone)]
pub struct JobQueue {
    /// Broker backend
    backend: Arc<dyn QueueBackend>,
    /// Queue name
    name: String,
    /// Lease granted to each popped job
    lease: Duration,
}

impl JobQueue {
    /// Create a queue handle from configuration.
    pub fn new(backend: Arc<dyn QueueBackend>, config: &QueueConfig) -> Self {
        Self::named(
            backend,
            config.name.clone(),
            Duration::from_secs(config.lease_seconds),
        )
    }

    /// Create a handle for an arbitrary queue name.
    pub fn named(backend: Arc<dyn QueueBackend>, name: impl Into<String>, lease: Duration) -> Self {
        Self {
            backend,
            name: name.into(),
            lease,
        }
    }

    /// Queue name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append a job to the tail of the queue.
    pub async fn push(&self, job: &JobMessage) -> AppResult<()> {
        let payload = serde_json::to_string(job)?;
        self.backend.push(&self.name, &payload).await?;
        tracing::debug!(queue = %self.name, job_id = %job.job_id, "Enqueued job");
        Ok(())
    }

    /// Pop the oldest job, waiting up to `timeout`.
    ///
    /// Returns `Ok(None)` on timeout. A payload that does not decode is
    /// removed from the queue and reported as an error.
    pub async fn pop(&self, timeout: Duration) -> AppResult<Option<Delivery>> {
        let Some(leased) = self.backend.pop(&self.name, timeout, self.lease).await? else {
            return Ok(None);
        };

        match serde_json::from_str::<JobMessage>(&leased.payload) {
            Ok(job) => {
                tracing::debug!(queue = %self.name, job_id = %job.job_id, "Dequeued job");
                Ok(Some(Delivery {
                    job,
                    receipt: leased.receipt,
                }))
            }
            Err(e) => {
                self.backend.ack(&self.name, &leased.receipt).await?;
                Err(AppError::with_source(
                    ErrorKind::Serialization,
                    format!("Malformed job payload on queue '{}': {e}", self.name),
                    e,
                ))
            }
        }
    }

    /// Acknowledge a finished job so it is never redelivered.
    pub async fn ack(&self, delivery: &Delivery) -> AppResult<bool> {
        self.backend.ack(&self.name, &delivery.receipt).await
    }

    /// Return jobs whose lease expired to the head of the queue.
    pub async fn requeue_expired(&self) -> AppResult<u64> {
        self.backend.requeue_expired(&self.name).await
    }

    /// Current queue depth.
    pub async fn length(&self) -> AppResult<u64> {
        self.backend.len(&self.name).await
    }

    /// Depth and in-flight counts.
    pub async fn stats(&self) -> AppResult<QueueStats> {
        Ok(QueueStats {
            queue: self.name.clone(),
            pending: self.backend.len(&self.name).await?,
            in_flight: self.backend.in_flight(&self.name).await?,
        })
    }

    /// Check broker connectivity.
    pub async fn health_check(&self) -> AppResult<bool> {
        self.backend.health_check().await
    }
}
