//! Core traits defined in `archlens-core` and implemented by other crates.

pub mod broker;
pub mod persistence;

pub use broker::{Leased, PubSubBackend, PubSubStream, QueueBackend};
pub use persistence::{DatabaseHealth, DiagramIndex, JobLedger, QuotaStore};
