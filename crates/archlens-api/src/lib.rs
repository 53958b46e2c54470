//! # archlens-api
//!
//! HTTP layer for the Archlens pipeline core built on Axum.
//!
//! Provides the authenticated WebSocket upgrade, the health endpoint, the
//! admin endpoints, middleware (CORS, request logging), and error mapping.

pub mod app;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;

pub use app::build_app;
pub use state::AppState;
