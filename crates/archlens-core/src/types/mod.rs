//! Shared domain types.

pub mod id;

pub use id::{AnalysisId, JobId, UserId};
