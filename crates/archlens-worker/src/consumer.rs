//! Worker-side consumer loop: pops jobs, hands them to a handler, acks.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::time::{self, Instant, MissedTickBehavior};

use archlens_core::config::QueueConfig;
use archlens_core::messages::JobMessage;
use archlens_core::result::AppResult;

use crate::queue::JobQueue;

/// Pause after a broker error before polling again.
const ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Executes one analysis job.
///
/// An `Err` means the job failed; the handler is expected to have reported
/// the failure (progress event, record status) itself. Either way the job is
/// acknowledged and not redelivered.
#[async_trait]
pub trait JobHandler: Send + Sync + std::fmt::Debug + 'static {
    /// Run the job to completion.
    async fn handle(&self, job: &JobMessage) -> AppResult<()>;
}

/// Single-slot consumer of the analysis queue.
#[derive(Debug)]
pub struct QueueConsumer {
    /// Queue to consume
    queue: Arc<JobQueue>,
    /// Job handler
    handler: Arc<dyn JobHandler>,
    /// Bound on each blocking pop
    pop_timeout: Duration,
    /// Interval between expired-lease sweeps
    reap_interval: Duration,
}

impl QueueConsumer {
    /// Create a consumer from queue configuration.
    pub fn new(queue: Arc<JobQueue>, handler: Arc<dyn JobHandler>, config: &QueueConfig) -> Self {
        Self {
            queue,
            handler,
            pop_timeout: Duration::from_secs(config.pop_timeout_seconds),
            reap_interval: Duration::from_secs(config.reap_interval_seconds),
        }
    }

    /// Run until the cancel signal is received.
    ///
    /// A job already being handled runs to completion before the loop exits.
    pub async fn run(&self, mut cancel: watch::Receiver<bool>) {
        tracing::info!(
            queue = %self.queue.name(),
            pop_timeout_secs = self.pop_timeout.as_secs(),
            reap_interval_secs = self.reap_interval.as_secs(),
            "Queue consumer started"
        );

        let mut reaper = time::interval_at(Instant::now(), self.reap_interval);
        reaper.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if *cancel.borrow() {
                break;
            }

            tokio::select! {
                changed = cancel.changed() => {
                    if changed.is_err() || *cancel.borrow() {
                        break;
                    }
                }
                _ = reaper.tick() => self.reap().await,
                popped = self.queue.pop(self.pop_timeout) => match popped {
                    Ok(Some(delivery)) => {
                        self.process(&delivery.job).await;
                        if let Err(e) = self.queue.ack(&delivery).await {
                            tracing::error!(job_id = %delivery.job.job_id, error = %e, "Failed to acknowledge job");
                        }
                    }
                    Ok(None) => {}
                    Err(e) => {
                        tracing::error!(queue = %self.queue.name(), error = %e, "Failed to pop job");
                        time::sleep(ERROR_BACKOFF).await;
                    }
                },
            }
        }

        tracing::info!(queue = %self.queue.name(), "Queue consumer stopped");
    }

    async fn process(&self, job: &JobMessage) {
        tracing::info!(
            job_id = %job.job_id,
            analysis_id = %job.analysis_id,
            user_id = %job.user_id,
            source = job.source_type.as_str(),
            "Processing analysis job"
        );
        let started = Instant::now();
        match self.handler.handle(job).await {
            Ok(()) => tracing::info!(
                job_id = %job.job_id,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Analysis job finished"
            ),
            Err(e) => tracing::warn!(job_id = %job.job_id, error = %e, "Analysis job failed"),
        }
    }

    async fn reap(&self) {
        match self.queue.requeue_expired().await {
            Ok(0) => {}
            Ok(n) => tracing::warn!(queue = %self.queue.name(), requeued = n, "Requeued jobs with expired leases"),
            Err(e) => tracing::error!(queue = %self.queue.name(), error = %e, "Lease sweep failed"),
        }
    }
}
