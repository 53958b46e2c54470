//! Scheduled maintenance jobs.

pub mod cleanup;
pub mod quota;

pub use cleanup::{CleanupJob, CleanupReport, SweepReport};
pub use quota::QuotaResetJob;
