//! In-process leased work queue.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;

use archlens_core::result::AppResult;
use archlens_core::traits::{Leased, QueueBackend};

/// A popped payload awaiting acknowledgement.
#[derive(Debug)]
struct InFlight {
    receipt: String,
    payload: String,
    deadline: Instant,
}

/// Ready and in-flight payloads of one named queue.
#[derive(Debug, Default)]
struct QueueState {
    ready: VecDeque<String>,
    /// In pop order.
    in_flight: Vec<InFlight>,
    /// Last receipt handed out.
    seq: u64,
}

#[derive(Debug, Default)]
struct NamedQueue {
    state: Mutex<QueueState>,
    /// Wakes poppers waiting on an empty queue.
    notify: Notify,
}

/// In-memory implementation of [`QueueBackend`].
///
/// Shares the lease semantics of the Redis backend so the worker behaves
/// the same in single-node runs and tests.
#[derive(Debug, Default, Clone)]
pub struct MemoryQueueBackend {
    queues: Arc<DashMap<String, Arc<NamedQueue>>>,
}

impl MemoryQueueBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// The named queue, created on first use. Only writers and waiters call
    /// this.
    fn queue(&self, name: &str) -> Arc<NamedQueue> {
        self.queues
            .entry(name.to_string())
            .or_default()
            .value()
            .clone()
    }

    /// The named queue if anything was ever pushed to or awaited on it.
    fn existing(&self, name: &str) -> Option<Arc<NamedQueue>> {
        self.queues.get(name).map(|q| q.value().clone())
    }

    /// Number of named queues held.
    pub fn queue_count(&self) -> usize {
        self.queues.len()
    }
}

#[async_trait]
impl QueueBackend for MemoryQueueBackend {
    async fn push(&self, queue: &str, payload: &str) -> AppResult<()> {
        let q = self.queue(queue);
        q.state.lock().await.ready.push_back(payload.to_string());
        q.notify.notify_one();
        Ok(())
    }

    async fn pop(
        &self,
        queue: &str,
        timeout: Duration,
        lease: Duration,
    ) -> AppResult<Option<Leased>> {
        let q = self.queue(queue);
        let deadline = Instant::now() + timeout;

        loop {
            let notified = q.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = q.state.lock().await;
                if let Some(payload) = state.ready.pop_front() {
                    state.seq += 1;
                    let receipt = state.seq.to_string();
                    state.in_flight.push(InFlight {
                        receipt: receipt.clone(),
                        payload: payload.clone(),
                        deadline: Instant::now() + lease,
                    });
                    if !state.ready.is_empty() {
                        q.notify.notify_one();
                    }
                    return Ok(Some(Leased { receipt, payload }));
                }
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(None);
            }
        }
    }

    async fn ack(&self, queue: &str, receipt: &str) -> AppResult<bool> {
        let Some(q) = self.existing(queue) else {
            return Ok(false);
        };
        let mut state = q.state.lock().await;
        match state.in_flight.iter().position(|f| f.receipt == receipt) {
            Some(idx) => {
                state.in_flight.remove(idx);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn requeue_expired(&self, queue: &str) -> AppResult<u64> {
        let Some(q) = self.existing(queue) else {
            return Ok(0);
        };
        let mut state = q.state.lock().await;
        let now = Instant::now();

        let (mut expired, live): (Vec<_>, Vec<_>) = state
            .in_flight
            .drain(..)
            .partition(|f| f.deadline <= now);
        state.in_flight = live;

        // Earliest deadline ends up at the head.
        expired.sort_by_key(|f| f.deadline);
        let moved = expired.len() as u64;
        for f in expired.into_iter().rev() {
            state.ready.push_front(f.payload);
        }
        drop(state);

        if moved > 0 {
            q.notify.notify_one();
        }
        Ok(moved)
    }

    async fn len(&self, queue: &str) -> AppResult<u64> {
        Ok(match self.existing(queue) {
            Some(q) => q.state.lock().await.ready.len() as u64,
            None => 0,
        })
    }

    async fn in_flight(&self, queue: &str) -> AppResult<u64> {
        Ok(match self.existing(queue) {
            Some(q) => q.state.lock().await.in_flight.len() as u64,
            None => 0,
        })
    }

    async fn health_check(&self) -> AppResult<bool> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEASE: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn test_pop_is_fifo() {
        let backend = MemoryQueueBackend::new();
        for p in ["1", "2", "3"] {
            backend.push("q", p).await.unwrap();
        }
        for expected in ["1", "2", "3"] {
            let got = backend.pop("q", Duration::ZERO, LEASE).await.unwrap().unwrap();
            assert_eq!(got.payload, expected);
        }
        assert_eq!(backend.len("q").await.unwrap(), 0);
        assert_eq!(backend.in_flight("q").await.unwrap(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pop_times_out_on_empty_queue() {
        let backend = MemoryQueueBackend::new();
        let started = Instant::now();
        let got = backend
            .pop("q", Duration::from_secs(5), LEASE)
            .await
            .unwrap();
        assert!(got.is_none());
        assert!(started.elapsed() >= Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_waiting_pop_wakes_on_push() {
        let backend = MemoryQueueBackend::new();
        let waiter = {
            let backend = backend.clone();
            tokio::spawn(async move { backend.pop("q", Duration::from_secs(30), LEASE).await })
        };
        tokio::time::sleep(Duration::from_secs(1)).await;
        backend.push("q", "late").await.unwrap();

        let got = waiter.await.unwrap().unwrap().unwrap();
        assert_eq!(got.payload, "late");
    }

    #[tokio::test]
    async fn test_ack_removes_from_in_flight() {
        let backend = MemoryQueueBackend::new();
        backend.push("q", "a").await.unwrap();
        let leased = backend.pop("q", Duration::ZERO, LEASE).await.unwrap().unwrap();

        assert!(!backend.ack("q", &leased.payload).await.unwrap());
        assert!(backend.ack("q", &leased.receipt).await.unwrap());
        assert!(!backend.ack("q", &leased.receipt).await.unwrap());
        assert_eq!(backend.in_flight("q").await.unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_lease_returns_to_head() {
        let backend = MemoryQueueBackend::new();
        for p in ["a", "b", "c"] {
            backend.push("q", p).await.unwrap();
        }
        backend.pop("q", Duration::ZERO, Duration::from_secs(10)).await.unwrap();
        backend.pop("q", Duration::ZERO, Duration::from_secs(20)).await.unwrap();

        assert_eq!(backend.requeue_expired("q").await.unwrap(), 0);

        tokio::time::advance(Duration::from_secs(21)).await;
        assert_eq!(backend.requeue_expired("q").await.unwrap(), 2);
        assert_eq!(backend.in_flight("q").await.unwrap(), 0);

        let order: Vec<String> = [
            backend.pop("q", Duration::ZERO, LEASE).await.unwrap(),
            backend.pop("q", Duration::ZERO, LEASE).await.unwrap(),
            backend.pop("q", Duration::ZERO, LEASE).await.unwrap(),
        ]
        .into_iter()
        .flatten()
        .map(|l| l.payload)
        .collect();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_named_queues_are_independent() {
        let backend = MemoryQueueBackend::new();
        backend.push("analysis", "x").await.unwrap();
        assert_eq!(backend.len("other").await.unwrap(), 0);
        assert!(
            backend
                .pop("other", Duration::ZERO, LEASE)
                .await
                .unwrap()
                .is_none()
        );
        assert_eq!(backend.len("analysis").await.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_payloads_keep_separate_leases() {
        let backend = MemoryQueueBackend::new();
        backend.push("q", "same").await.unwrap();
        backend.push("q", "same").await.unwrap();

        let lease = Duration::from_secs(10);
        let first = backend.pop("q", Duration::ZERO, lease).await.unwrap().unwrap();
        let second = backend.pop("q", Duration::ZERO, lease).await.unwrap().unwrap();
        assert_ne!(first.receipt, second.receipt);

        assert!(backend.ack("q", &first.receipt).await.unwrap());
        assert_eq!(backend.in_flight("q").await.unwrap(), 1);

        tokio::time::advance(Duration::from_secs(11)).await;
        assert_eq!(backend.requeue_expired("q").await.unwrap(), 1);
        assert_eq!(backend.len("q").await.unwrap(), 1);
        assert!(!backend.ack("q", &second.receipt).await.unwrap());
    }

    #[tokio::test]
    async fn test_read_paths_do_not_create_queues() {
        let backend = MemoryQueueBackend::new();
        assert_eq!(backend.len("ghost").await.unwrap(), 0);
        assert_eq!(backend.in_flight("ghost").await.unwrap(), 0);
        assert!(!backend.ack("ghost", "1").await.unwrap());
        assert_eq!(backend.requeue_expired("ghost").await.unwrap(), 0);
        assert_eq!(backend.queue_count(), 0);

        backend.push("real", "x").await.unwrap();
        assert_eq!(backend.queue_count(), 1);
    }
}
