//! Route definitions for the Archlens pipeline HTTP surface.
//!
//! JSON routes are mounted under `/api`; the WebSocket endpoint lives at
//! `/ws`.

use axum::{
    Router,
    middleware as axum_middleware,
    routing::{get, post},
};

use crate::handlers;
use crate::middleware;
use crate::state::AppState;

/// Build the router with all routes and request logging.
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .merge(health_routes())
        .merge(admin_routes());

    Router::new()
        .nest("/api", api_routes)
        .route("/ws", get(handlers::ws::ws_upgrade))
        .layer(axum_middleware::from_fn(middleware::logging::request_logging))
        .with_state(state)
}

/// Health check endpoints (no auth required)
fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health::health))
}

/// Admin endpoints (admin role required)
fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/quota/reset", post(handlers::admin::reset_quotas))
        .route("/admin/queue", get(handlers::admin::queue_stats))
        .route("/admin/jobs", post(handlers::admin::dispatch_job))
}
