//! Health check handler.

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use archlens_core::result::AppResult;

use crate::state::AppState;

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// `ok` when the broker and the database both answer, `degraded`
    /// otherwise.
    pub status: &'static str,
    /// Crate version.
    pub version: &'static str,
    /// Whether the broker answered a ping.
    pub broker: bool,
    /// Whether the database answered a query.
    pub database: bool,
    /// Live WebSocket connections on this node.
    pub ws_connections: usize,
    /// Users with at least one live connection on this node.
    pub online_users: usize,
}

/// GET /api/health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let broker = healthy("broker", state.job_queue.health_check().await);
    let database = healthy("database", state.database.health_check().await);
    let hub = state.realtime.hub();

    Json(HealthResponse {
        status: if broker && database { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        broker,
        database,
        ws_connections: hub.connection_count().await,
        online_users: hub.online_users().await,
    })
}

/// Collapse a health check outcome, logging failures.
fn healthy(component: &str, outcome: AppResult<bool>) -> bool {
    match outcome {
        Ok(ok) => ok,
        Err(e) => {
            tracing::warn!(component, error = %e, "Health check failed");
            false
        }
    }
}
