//! Analysis job pipeline and scheduled maintenance for Archlens.
//!
//! This crate provides:
//! - The named FIFO job queue shared by the API tier and the worker
//! - The dispatcher that enqueues jobs and compensates failed pushes
//! - A consumer loop that pops, handles and acknowledges jobs
//! - The scheduler running the daily quota reset and the hourly cleanup

pub mod consumer;
pub mod dispatcher;
pub mod jobs;
pub mod queue;
pub mod scheduler;

pub use consumer::{JobHandler, QueueConsumer};
pub use dispatcher::JobDispatcher;
pub use queue::{Delivery, JobQueue, QueueStats};
pub use scheduler::Scheduler;
