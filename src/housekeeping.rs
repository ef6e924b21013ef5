//! Periodic sweep of short-lived shared state.
//!
//! Dedupe markers and rate-limit counters are keyed by email and client address, so
//! without a sweep every distinct key would leave a row behind.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use tokio::time::MissedTickBehavior;

use tokio_util::sync::CancellationToken;

use crate::repo::{DedupeCache, RateLimitStore};

/// Rows removed by one sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Purged {
    pub markers: u64,
    pub counters: u64,
}

pub struct Housekeeper {
    dedupe: Arc<dyn DedupeCache>,
    rate_limits: Arc<dyn RateLimitStore>,
    window: Duration,
    interval: Duration,
}

impl Housekeeper {
    /// `window` is the rate limiter's window; counters are kept until theirs has ended
    pub fn new(
        dedupe: Arc<dyn DedupeCache>,
        rate_limits: Arc<dyn RateLimitStore>,
        window: Duration,
        interval: Duration,
    ) -> Self {
        Self {
            dedupe,
            rate_limits,
            window,
            interval: interval.max(Duration::from_secs(1)),
        }
    }

    /// Drop expired markers and every counter whose window ended before `now`
    #[tracing::instrument(name = "Purge expired state", skip(self))]
    pub async fn purge(&self, now: DateTime<Utc>) -> sqlx::Result<Purged> {
        let markers = self.dedupe.purge_expired().await?;

        let cutoff = now - chrono::Duration::seconds(self.window.as_secs() as i64);
        let counters = self.rate_limits.purge_before(cutoff).await?;

        Ok(Purged { markers, counters })
    }

    /// Sweep every `interval` until `shutdown` is cancelled
    pub async fn run(&self, shutdown: CancellationToken) {
        let mut ticks = tokio::time::interval(self.interval);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => break,
                _ = ticks.tick() => {}
            }

            match self.purge(Utc::now()).await {
                Ok(purged) => tracing::debug!(
                    markers = purged.markers,
                    counters = purged.counters,
                    "Purged expired state"
                ),
                Err(e) => tracing::warn!(error.cause_chain = ?e, "Failed to purge expired state"),
            }
        }

        tracing::info!("Housekeeping stopped");
    }
}
