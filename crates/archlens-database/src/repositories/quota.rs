//! Daily quota repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::info;

use archlens_core::error::{AppError, ErrorKind};
use archlens_core::result::AppResult;
use archlens_core::traits::QuotaStore;

/// Repository over the `user_quotas` table.
#[derive(Debug, Clone)]
pub struct QuotaRepository {
    pool: PgPool,
}

impl QuotaRepository {
    /// Create a new quota repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl QuotaStore for QuotaRepository {
    async fn reset_daily_usage(&self, next_reset: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query(
            "UPDATE user_quotas SET used_today = 0, next_reset_at = $1, updated_at = NOW()",
        )
        .bind(next_reset)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to reset daily quotas", e))?;

        info!(users = result.rows_affected(), next_reset = %next_reset, "Daily quotas reset");
        Ok(result.rows_affected())
    }
}
