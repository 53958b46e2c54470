//! In-process broker backends.

pub mod pubsub;
pub mod queue;

pub use pubsub::MemoryPubSubBackend;
pub use queue::MemoryQueueBackend;
