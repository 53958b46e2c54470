//! Application state shared across all handlers and middleware.

use std::sync::Arc;

use archlens_auth::jwt::JwtDecoder;
use archlens_core::config::AppConfig;
use archlens_core::traits::DatabaseHealth;
use archlens_realtime::RealtimeEngine;
use archlens_worker::{JobDispatcher, JobQueue, Scheduler};

/// Application state containing all shared dependencies.
///
/// Passed to every Axum handler via `State<AppState>`.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<AppConfig>,
    /// JWT validator for WebSocket and admin requests
    pub jwt_decoder: Arc<JwtDecoder>,
    /// Real-time engine (connection hub + progress subscriber)
    pub realtime: RealtimeEngine,
    /// Analysis job queue
    pub job_queue: Arc<JobQueue>,
    /// Enqueue path with failure compensation
    pub dispatcher: Arc<JobDispatcher>,
    /// Quota reset and cleanup scheduler
    pub scheduler: Arc<Scheduler>,
    /// Database liveness for the health endpoint
    pub database: Arc<dyn DatabaseHealth>,
}
