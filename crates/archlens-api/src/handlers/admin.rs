//! Admin operations on the pipeline.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::Serialize;

use archlens_core::messages::JobMessage;
use archlens_core::types::JobId;
use archlens_worker::QueueStats;

use crate::error::ApiError;
use crate::extractors::AdminUser;
use crate::state::AppState;

/// Result of a manual quota reset.
#[derive(Debug, Clone, Serialize)]
pub struct QuotaResetResponse {
    /// Users whose counter was reset.
    pub users_reset: u64,
}

/// POST /api/admin/quota/reset
pub async fn reset_quotas(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
) -> Result<Json<QuotaResetResponse>, ApiError> {
    let users_reset = state.scheduler.reset_quotas_now().await?;
    tracing::info!(admin_id = %admin.user_id(), users_reset, "Manual quota reset");
    Ok(Json(QuotaResetResponse { users_reset }))
}

/// GET /api/admin/queue
pub async fn queue_stats(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<QueueStats>, ApiError> {
    Ok(Json(state.job_queue.stats().await?))
}

/// Acknowledgement of a dispatched job.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchResponse {
    pub job_id: JobId,
    pub queue: String,
}

/// POST /api/admin/jobs
///
/// Enqueues a job whose records are already committed. A job that cannot be
/// enqueued is compensated before the error is returned.
pub async fn dispatch_job(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(job): Json<JobMessage>,
) -> Result<(StatusCode, Json<DispatchResponse>), ApiError> {
    state.dispatcher.dispatch(&job).await?;
    tracing::info!(admin_id = %admin.user_id(), job_id = %job.job_id, "Job dispatched by admin");
    Ok((
        StatusCode::ACCEPTED,
        Json(DispatchResponse {
            job_id: job.job_id,
            queue: state.job_queue.name().to_string(),
        }),
    ))
}
