//! Cron scheduler for the daily quota reset and the cleanup sweeps.

use chrono::Utc;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job as CronJob, JobScheduler, JobSchedulerError};

use archlens_core::config::SchedulerConfig;
use archlens_core::error::AppError;
use archlens_core::result::AppResult;

use crate::jobs::cleanup::{CleanupJob, CleanupReport};
use crate::jobs::quota::QuotaResetJob;

/// Runs the quota reset and the cleanup sweeps as UTC cron jobs.
pub struct Scheduler {
    quota: QuotaResetJob,
    cleanup: CleanupJob,
    quota_schedule: String,
    cleanup_schedule: String,
    enabled: bool,
    /// The live cron scheduler, present between `start` and `stop`.
    running: Mutex<Option<JobScheduler>>,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("quota_schedule", &self.quota_schedule)
            .field("cleanup_schedule", &self.cleanup_schedule)
            .field("enabled", &self.enabled)
            .finish()
    }
}

impl Scheduler {
    /// Create a new scheduler
    pub fn new(config: &SchedulerConfig, quota: QuotaResetJob, cleanup: CleanupJob) -> Self {
        Self {
            quota,
            cleanup,
            quota_schedule: config.quota_reset_schedule.clone(),
            cleanup_schedule: config.cleanup_schedule.clone(),
            enabled: config.enabled,
            running: Mutex::new(None),
        }
    }

    /// Register both jobs and start ticking. Calling it while already
    /// running does nothing.
    pub async fn start(&self) -> AppResult<()> {
        if !self.enabled {
            tracing::info!("Scheduler disabled by configuration");
            return Ok(());
        }

        let mut running = self.running.lock().await;
        if running.is_some() {
            tracing::warn!("Scheduler already running");
            return Ok(());
        }

        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| scheduler_error("create scheduler", e))?;

        scheduler
            .add(self.quota_reset_job()?)
            .await
            .map_err(|e| scheduler_error("register quota reset", e))?;
        tracing::info!(schedule = %self.quota_schedule, "Registered: quota_reset");

        scheduler
            .add(self.cleanup_job()?)
            .await
            .map_err(|e| scheduler_error("register cleanup", e))?;
        tracing::info!(schedule = %self.cleanup_schedule, "Registered: cleanup");

        scheduler
            .start()
            .await
            .map_err(|e| scheduler_error("start scheduler", e))?;

        *running = Some(scheduler);
        tracing::info!("Scheduler started");
        Ok(())
    }

    /// Shut the cron scheduler down. Does nothing when not running.
    pub async fn stop(&self) -> AppResult<()> {
        let Some(mut scheduler) = self.running.lock().await.take() else {
            return Ok(());
        };
        scheduler
            .shutdown()
            .await
            .map_err(|e| scheduler_error("shut down scheduler", e))?;
        tracing::info!("Scheduler stopped");
        Ok(())
    }

    /// Whether the cron scheduler is running.
    pub async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }

    /// Reset every user's daily quota now.
    pub async fn reset_quotas_now(&self) -> AppResult<u64> {
        self.quota.run(Utc::now()).await
    }

    /// Run the cleanup sweeps now.
    pub async fn run_cleanup_now(&self) -> CleanupReport {
        self.cleanup.run(Utc::now()).await
    }

    fn quota_reset_job(&self) -> AppResult<CronJob> {
        let quota = self.quota.clone();
        CronJob::new_async(self.quota_schedule.as_str(), move |_uuid, _lock| {
            let quota = quota.clone();
            Box::pin(async move {
                if let Err(e) = quota.run(Utc::now()).await {
                    tracing::error!(error = %e, "Daily quota reset failed");
                }
            })
        })
        .map_err(|e| scheduler_error("parse quota reset schedule", e))
    }

    fn cleanup_job(&self) -> AppResult<CronJob> {
        let cleanup = self.cleanup.clone();
        CronJob::new_async(self.cleanup_schedule.as_str(), move |_uuid, _lock| {
            let cleanup = cleanup.clone();
            Box::pin(async move {
                cleanup.run(Utc::now()).await;
            })
        })
        .map_err(|e| scheduler_error("parse cleanup schedule", e))
    }
}

fn scheduler_error(action: &str, e: JobSchedulerError) -> AppError {
    AppError::internal(format!("Failed to {action}: {e}"))
}
