//! Persistence collaborators consumed by the pipeline core.
//!
//! The relational schema belongs to the CRUD layer; these traits name only
//! the operations the scheduler and the job dispatcher need from it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::messages::JobMessage;
use crate::result::AppResult;
use crate::types::id::AnalysisId;

/// Daily analysis quota bookkeeping.
#[async_trait]
pub trait QuotaStore: Send + Sync + std::fmt::Debug + 'static {
    /// Set every user's used-today counter to zero and move their next reset
    /// to `next_reset`. Returns the number of users touched.
    async fn reset_daily_usage(&self, next_reset: DateTime<Utc>) -> AppResult<u64>;
}

/// Index of diagrams already copied to durable object storage.
#[async_trait]
pub trait DiagramIndex: Send + Sync + std::fmt::Debug + 'static {
    /// Analyses whose locally cached diagram has been migrated and can be
    /// deleted from disk.
    async fn migrated_analysis_ids(&self) -> AppResult<Vec<AnalysisId>>;
}

/// Compensation hook for jobs whose queue push failed.
#[async_trait]
pub trait JobLedger: Send + Sync + std::fmt::Debug + 'static {
    /// Undo the effects of creating `job` after its push to the queue
    /// failed: mark the job and its analysis failed with `reason` and refund
    /// the consumed quota, atomically.
    async fn compensate_enqueue_failure(&self, job: &JobMessage, reason: &str) -> AppResult<()>;
}

/// Liveness of the relational store, reported by the health endpoint.
#[async_trait]
pub trait DatabaseHealth: Send + Sync + std::fmt::Debug + 'static {
    /// Run a trivial round trip. `Ok(false)` and errors both mean unhealthy.
    async fn health_check(&self) -> AppResult<bool>;
}
