//! Leased work queue on Redis lists.
//!
//! Each step that touches more than one key runs as a Lua script so that a
//! payload is never visible in two places at once. In-flight entries and
//! leases are keyed by a per-pop receipt, so duplicate payloads keep
//! separate leases. Lease deadlines come from
//! the Redis server clock (`TIME`), so workers with skewed clocks agree on
//! expiry.

use std::time::Duration;

use async_trait::async_trait;
use redis::{AsyncCommands, Script};
use tokio::time::Instant;
use tracing::debug;

use archlens_core::result::AppResult;
use archlens_core::traits::{Leased, QueueBackend};

use super::client::RedisClient;
use super::map_err;
use crate::keys;

/// Interval between non-blocking pop attempts while waiting for work.
///
/// Blocking list commands would stall every other command multiplexed on
/// the shared connection.
const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Moves the head payload in flight under a fresh receipt.
///
/// KEYS: queue, in-flight hash, leases, receipt counter. ARGV: lease ms.
/// Returns `{receipt, payload}` or nil.
const POP_SCRIPT: &str = r"
local payload = redis.call('LPOP', KEYS[1])
if not payload then
  return false
end
local receipt = tostring(redis.call('INCR', KEYS[4]))
local t = redis.call('TIME')
local now = tonumber(t[1]) * 1000 + math.floor(tonumber(t[2]) / 1000)
redis.call('HSET', KEYS[2], receipt, payload)
redis.call('ZADD', KEYS[3], now + tonumber(ARGV[1]), receipt)
return {receipt, payload}
";

/// KEYS: in-flight hash, leases. ARGV: receipt.
const ACK_SCRIPT: &str = r"
local removed = redis.call('HDEL', KEYS[1], ARGV[1])
redis.call('ZREM', KEYS[2], ARGV[1])
return removed
";

/// KEYS: queue, in-flight hash, leases.
const REQUEUE_SCRIPT: &str = r"
local t = redis.call('TIME')
local now = tonumber(t[1]) * 1000 + math.floor(tonumber(t[2]) / 1000)
local expired = redis.call('ZRANGEBYSCORE', KEYS[3], '-inf', now)
local moved = 0
for i = #expired, 1, -1 do
  local receipt = expired[i]
  local payload = redis.call('HGET', KEYS[2], receipt)
  redis.call('ZREM', KEYS[3], receipt)
  if payload then
    redis.call('HDEL', KEYS[2], receipt)
    redis.call('LPUSH', KEYS[1], payload)
    moved = moved + 1
  end
end
return moved
";

/// Redis implementation of [`QueueBackend`].
#[derive(Debug, Clone)]
pub struct RedisQueueBackend {
    client: RedisClient,
}

impl RedisQueueBackend {
    /// Create a queue backend over an existing client.
    pub fn new(client: RedisClient) -> Self {
        Self { client }
    }

    async fn try_pop(&self, queue: &str, lease: Duration) -> AppResult<Option<Leased>> {
        let prefix = self.client.prefix();
        let mut conn = self.client.conn_mut();
        let popped: Option<(String, String)> = Script::new(POP_SCRIPT)
            .key(keys::queue(prefix, queue))
            .key(keys::in_flight(prefix, queue))
            .key(keys::leases(prefix, queue))
            .key(keys::receipt_seq(prefix, queue))
            .arg(lease.as_millis() as u64)
            .invoke_async(&mut conn)
            .await
            .map_err(map_err)?;
        Ok(popped.map(|(receipt, payload)| Leased { receipt, payload }))
    }
}

#[async_trait]
impl QueueBackend for RedisQueueBackend {
    async fn push(&self, queue: &str, payload: &str) -> AppResult<()> {
        let mut conn = self.client.conn_mut();
        let key = keys::queue(self.client.prefix(), queue);
        let _: i64 = conn.rpush(&key, payload).await.map_err(map_err)?;
        Ok(())
    }

    async fn pop(
        &self,
        queue: &str,
        timeout: Duration,
        lease: Duration,
    ) -> AppResult<Option<Leased>> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(leased) = self.try_pop(queue, lease).await? {
                return Ok(Some(leased));
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(POLL_INTERVAL.min(deadline - now)).await;
        }
    }

    async fn ack(&self, queue: &str, receipt: &str) -> AppResult<bool> {
        let prefix = self.client.prefix();
        let mut conn = self.client.conn_mut();
        let removed: i64 = Script::new(ACK_SCRIPT)
            .key(keys::in_flight(prefix, queue))
            .key(keys::leases(prefix, queue))
            .arg(receipt)
            .invoke_async(&mut conn)
            .await
            .map_err(map_err)?;
        Ok(removed > 0)
    }

    async fn requeue_expired(&self, queue: &str) -> AppResult<u64> {
        let prefix = self.client.prefix();
        let mut conn = self.client.conn_mut();
        let moved: u64 = Script::new(REQUEUE_SCRIPT)
            .key(keys::queue(prefix, queue))
            .key(keys::in_flight(prefix, queue))
            .key(keys::leases(prefix, queue))
            .invoke_async(&mut conn)
            .await
            .map_err(map_err)?;
        if moved > 0 {
            debug!(queue = %queue, moved, "Requeued expired leases");
        }
        Ok(moved)
    }

    async fn len(&self, queue: &str) -> AppResult<u64> {
        let mut conn = self.client.conn_mut();
        conn.llen(keys::queue(self.client.prefix(), queue))
            .await
            .map_err(map_err)
    }

    async fn in_flight(&self, queue: &str) -> AppResult<u64> {
        let mut conn = self.client.conn_mut();
        conn.hlen(keys::in_flight(self.client.prefix(), queue))
            .await
            .map_err(map_err)
    }

    async fn health_check(&self) -> AppResult<bool> {
        let mut conn = self.client.conn_mut();
        let pong: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(map_err)?;
        Ok(pong == "PONG")
    }
}
