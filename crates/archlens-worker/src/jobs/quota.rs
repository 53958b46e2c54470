//! Daily analysis quota reset.

use std::sync::Arc;

use chrono::{DateTime, Days, NaiveTime, Utc};

use archlens_core::result::AppResult;
use archlens_core::traits::QuotaStore;

/// Resets every user's used-today counter.
#[derive(Debug, Clone)]
pub struct QuotaResetJob {
    store: Arc<dyn QuotaStore>,
}

impl QuotaResetJob {
    /// Create a new quota reset job
    pub fn new(store: Arc<dyn QuotaStore>) -> Self {
        Self { store }
    }

    /// Zero all counters and move next-reset to the coming UTC midnight.
    ///
    /// Running it twice in a row leaves the same state.
    pub async fn run(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let next_reset = next_utc_midnight(now);
        let users = self.store.reset_daily_usage(next_reset).await?;
        tracing::info!(users, next_reset = %next_reset, "Daily quotas reset");
        Ok(users)
    }
}

/// The first UTC midnight strictly after `now`.
pub fn next_utc_midnight(now: DateTime<Utc>) -> DateTime<Utc> {
    let today = now.date_naive();
    let tomorrow = today.checked_add_days(Days::new(1)).unwrap_or(today);
    tomorrow.and_time(NaiveTime::MIN).and_utc()
}
