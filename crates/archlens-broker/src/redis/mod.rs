//! Redis broker backends.

pub mod client;
pub mod pubsub;
pub mod queue;

pub use client::RedisClient;
pub use pubsub::RedisPubSubBackend;
pub use queue::RedisQueueBackend;

use archlens_core::error::{AppError, ErrorKind};

/// Map a Redis error to an AppError.
pub(crate) fn map_err(e: ::redis::RedisError) -> AppError {
    AppError::with_source(ErrorKind::Broker, format!("Redis error: {e}"), e)
}
