//! Analysis job repository: compensation for failed enqueues.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{info, warn};

use archlens_core::error::{AppError, ErrorKind};
use archlens_core::messages::JobMessage;
use archlens_core::result::AppResult;
use archlens_core::traits::JobLedger;

/// Repository over `analysis_jobs`, `analyses`, and `user_quotas`.
#[derive(Debug, Clone)]
pub struct JobRepository {
    pool: PgPool,
}

impl JobRepository {
    /// Create a new job repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn map_err(context: &'static str) -> impl FnOnce(sqlx::Error) -> AppError {
        move |e| AppError::with_source(ErrorKind::Database, context, e)
    }
}

#[async_trait]
impl JobLedger for JobRepository {
    async fn compensate_enqueue_failure(&self, job: &JobMessage, reason: &str) -> AppResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(Self::map_err("Failed to begin compensation transaction"))?;

        // Only a job that never left the pending state is compensated, so a
        // repeated call cannot refund the quota twice.
        let failed = sqlx::query(
            "UPDATE analysis_jobs SET status = 'failed', error_message = $2, \
             finished_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND status = 'pending'",
        )
        .bind(job.job_id)
        .bind(reason)
        .execute(&mut *tx)
        .await
        .map_err(Self::map_err("Failed to mark job failed"))?;

        if failed.rows_affected() == 0 {
            warn!(job_id = %job.job_id, "Job not pending, compensation skipped");
            tx.rollback()
                .await
                .map_err(Self::map_err("Failed to roll back compensation"))?;
            return Ok(());
        }

        sqlx::query(
            "UPDATE analyses SET status = 'failed', error_message = $2, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(job.analysis_id)
        .bind(reason)
        .execute(&mut *tx)
        .await
        .map_err(Self::map_err("Failed to mark analysis failed"))?;

        sqlx::query(
            "UPDATE user_quotas SET used_today = GREATEST(used_today - 1, 0), updated_at = NOW() \
             WHERE user_id = $1",
        )
        .bind(job.user_id)
        .execute(&mut *tx)
        .await
        .map_err(Self::map_err("Failed to refund quota"))?;

        tx.commit()
            .await
            .map_err(Self::map_err("Failed to commit compensation"))?;

        info!(
            job_id = %job.job_id,
            analysis_id = %job.analysis_id,
            user_id = %job.user_id,
            "Enqueue failure compensated"
        );
        Ok(())
    }
}
