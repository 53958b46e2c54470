//! Enqueue side of the job queue with failure compensation.

use std::sync::Arc;

use tracing::{error, info, warn};

use archlens_core::error::AppError;
use archlens_core::messages::JobMessage;
use archlens_core::result::AppResult;
use archlens_core::traits::JobLedger;

use crate::queue::JobQueue;

/// Hands committed jobs to the queue.
///
/// If a job cannot be enqueued, its records are compensated exactly once so
/// the user is not left with a pending job that never runs.
#[derive(Debug, Clone)]
pub struct JobDispatcher {
    queue: Arc<JobQueue>,
    ledger: Arc<dyn JobLedger>,
}

impl JobDispatcher {
    /// Create a dispatcher.
    pub fn new(queue: Arc<JobQueue>, ledger: Arc<dyn JobLedger>) -> Self {
        Self { queue, ledger }
    }

    /// Validate and enqueue `job`.
    ///
    /// On failure the original error is returned after compensation runs.
    pub async fn dispatch(&self, job: &JobMessage) -> AppResult<()> {
        let result = match job.validate() {
            Ok(()) => self.queue.push(job).await,
            Err(e) => Err(e),
        };

        let Err(err) = result else {
            info!(
                job_id = %job.job_id,
                analysis_id = %job.analysis_id,
                user_id = %job.user_id,
                queue = %self.queue.name(),
                "Analysis job dispatched"
            );
            return Ok(());
        };

        warn!(job_id = %job.job_id, error = %err, "Failed to enqueue job, compensating");
        let reason = format!("任务入队失败: {}", err.message);
        match self.ledger.compensate_enqueue_failure(job, &reason).await {
            Ok(()) => Err(err),
            Err(comp) => {
                error!(job_id = %job.job_id, error = %comp, "Enqueue compensation failed");
                Err(AppError {
                    message: format!("{}; compensation failed: {}", err.message, comp.message),
                    ..err
                })
            }
        }
    }
}
