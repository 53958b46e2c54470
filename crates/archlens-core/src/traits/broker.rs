//! Message broker traits for the work queue and the progress channel.
//!
//! The API tier and the worker tier never share memory; they coordinate only
//! through a backend implementing these traits (Redis in production, an
//! in-process implementation for single-node runs and tests).

use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::result::AppResult;

/// Stream of raw payloads received on a pub/sub channel.
///
/// The stream ends when the underlying subscription is lost.
pub type PubSubStream = BoxStream<'static, AppResult<String>>;

/// A payload popped under lease.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leased {
    /// Token naming this one delivery. Two pops of identical payloads get
    /// different receipts.
    pub receipt: String,
    /// Payload exactly as pushed.
    pub payload: String,
}

/// Durable FIFO list operations with leased (at-least-once) delivery.
///
/// A popped payload moves to the queue's in-flight set under a fresh
/// receipt with a lease deadline. It leaves the in-flight set when acknowledged, or returns to
/// the head of the queue once its lease expires and
/// [`requeue_expired`](QueueBackend::requeue_expired) runs.
#[async_trait]
pub trait QueueBackend: Send + Sync + std::fmt::Debug + 'static {
    /// Append a payload to the tail of `queue`.
    async fn push(&self, queue: &str, payload: &str) -> AppResult<()>;

    /// Pop the payload at the head of `queue`, waiting up to `timeout`.
    ///
    /// Returns `Ok(None)` when nothing arrived before the timeout.
    async fn pop(&self, queue: &str, timeout: Duration, lease: Duration)
    -> AppResult<Option<Leased>>;

    /// Acknowledge the delivery named by `receipt`. Returns `false` if it
    /// was not in flight.
    async fn ack(&self, queue: &str, receipt: &str) -> AppResult<bool>;

    /// Move every in-flight payload whose lease expired back to the head of
    /// `queue`. Returns the number of payloads requeued.
    async fn requeue_expired(&self, queue: &str) -> AppResult<u64>;

    /// Number of payloads waiting in `queue`.
    async fn len(&self, queue: &str) -> AppResult<u64>;

    /// Number of payloads popped from `queue` but not yet acknowledged.
    async fn in_flight(&self, queue: &str) -> AppResult<u64>;

    /// Check broker connectivity.
    async fn health_check(&self) -> AppResult<bool>;
}

/// Fire-and-forget publish/subscribe.
#[async_trait]
pub trait PubSubBackend: Send + Sync + std::fmt::Debug + 'static {
    /// Publish a payload on `channel`. Returns the number of receivers that
    /// got it, when the backend reports one.
    async fn publish(&self, channel: &str, payload: &str) -> AppResult<u64>;

    /// Subscribe to `channel`.
    async fn subscribe(&self, channel: &str) -> AppResult<PubSubStream>;
}
