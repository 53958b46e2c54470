//! Message contracts shared by the API tier and the analysis worker.
//!
//! Both messages travel as JSON through the broker: [`JobMessage`] on the
//! work queue, [`ProgressMessage`] on the progress channel.

pub mod job;
pub mod progress;

pub use job::{JobMessage, SourceType};
pub use progress::{PROGRESS_MESSAGE_TYPE, ProgressMessage, ProgressStatus, Step};
