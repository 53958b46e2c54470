//! Diagram migration lookups.

use async_trait::async_trait;
use sqlx::PgPool;

use archlens_core::error::{AppError, ErrorKind};
use archlens_core::result::AppResult;
use archlens_core::traits::DiagramIndex;
use archlens_core::types::AnalysisId;

/// Repository answering which cached diagrams live in object storage.
#[derive(Debug, Clone)]
pub struct DiagramRepository {
    pool: PgPool,
}

impl DiagramRepository {
    /// Create a new diagram repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DiagramIndex for DiagramRepository {
    async fn migrated_analysis_ids(&self) -> AppResult<Vec<AnalysisId>> {
        sqlx::query_scalar::<_, AnalysisId>(
            "SELECT id FROM analyses \
             WHERE diagram_object_key IS NOT NULL AND diagram_object_key <> '' \
             ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to list migrated diagrams", e)
        })
    }
}
