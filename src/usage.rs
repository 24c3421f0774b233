//! Daily quota and request spacing for the primary provider.
//!
//! [`UsageTracker`] enforces two independent budgets before a request is sent
//! to the primary vendor:
//!
//! - a **daily quota**: `request_count` against `daily_limit`, reset the first
//!   time any operation is attempted on a new local calendar date;
//! - a **minimum interval** between successful primary requests, a politeness
//!   policy for free tiers that penalise bursts even under quota.
//!
//! Once the quota is hit, `limit_reached` stays set for the rest of the day,
//! even if the counter is later changed from outside.
//!
//! The tracker only counts successful primary calls ([`track_request`]);
//! cache hits, fallbacks, 403/429 responses and cancelled requests are free.
//!
//! [`track_request`]: UsageTracker::track_request

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Local, NaiveDate};
use serde::Serialize;
use tracing::{debug, info};

use crate::clock::{Clock, SystemClock};
use crate::telemetry;

/// Quota configuration.
///
/// ```rust
/// # use waypost::UsageConfig;
/// # use std::time::Duration;
/// let config = UsageConfig::new()
///     .daily_limit(500)
///     .min_interval(Duration::ZERO);
/// ```
#[derive(Debug, Clone)]
pub struct UsageConfig {
    /// Successful primary requests allowed per local calendar day. Default: 2,500.
    pub daily_limit: u32,
    /// Minimum spacing between successful primary requests. Default: 2.5 hours.
    pub min_interval: Duration,
}

impl Default for UsageConfig {
    fn default() -> Self {
        Self {
            daily_limit: 2_500,
            min_interval: Duration::from_secs(9_000),
        }
    }
}

impl UsageConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn daily_limit(mut self, n: u32) -> Self {
        self.daily_limit = n;
        self
    }

    pub fn min_interval(mut self, interval: Duration) -> Self {
        self.min_interval = interval;
        self
    }
}

/// Snapshot of the tracker state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageStats {
    pub request_count: u32,
    pub daily_limit: u32,
    pub last_reset_date: NaiveDate,
    pub limit_reached: bool,
    pub last_request_at: Option<DateTime<Local>>,
}

/// Why the tracker refused a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageBlock {
    /// The daily quota is used up.
    DailyLimit { limit: u32 },
    /// The previous request was too recent.
    MinInterval { remaining: Duration },
}

impl UsageBlock {
    /// Stable label for metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DailyLimit { .. } => "daily_limit",
            Self::MinInterval { .. } => "min_interval",
        }
    }
}

impl fmt::Display for UsageBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DailyLimit { limit } => write!(f, "daily limit of {limit} requests reached"),
            Self::MinInterval { remaining } => {
                write!(f, "next request allowed in {}s", remaining.as_secs())
            }
        }
    }
}

/// Thread-safe usage tracker.
///
/// The inner mutex is never held across an `.await`, so every check or
/// mutation is atomic with respect to other tasks.
pub struct UsageTracker {
    config: UsageConfig,
    clock: Arc<dyn Clock>,
    state: Mutex<UsageStats>,
}

impl UsageTracker {
    /// Create a tracker reading the system clock.
    pub fn new(config: UsageConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a tracker with an explicit clock.
    pub fn with_clock(config: UsageConfig, clock: Arc<dyn Clock>) -> Self {
        let state = Mutex::new(fresh_stats(&config, clock.now().date_naive()));
        Self {
            config,
            clock,
            state,
        }
    }

    /// Check whether a primary request may be sent now.
    ///
    /// Runs the lazy daily reset first. Hitting the quota here latches
    /// `limit_reached` for the rest of the day.
    pub fn check(&self) -> Result<(), UsageBlock> {
        let now = self.clock.now();
        let mut state = self.lock();
        self.reset_if_new_day(&mut state, now.date_naive());

        if state.limit_reached {
            return Err(UsageBlock::DailyLimit {
                limit: state.daily_limit,
            });
        }
        if state.request_count >= state.daily_limit {
            state.limit_reached = true;
            debug!(limit = state.daily_limit, "daily request limit reached");
            return Err(UsageBlock::DailyLimit {
                limit: state.daily_limit,
            });
        }
        if let Some(last) = state.last_request_at {
            // A clock that went backwards counts as "just now".
            let elapsed = (now - last).to_std().unwrap_or(Duration::ZERO);
            if elapsed < self.config.min_interval {
                return Err(UsageBlock::MinInterval {
                    remaining: self.config.min_interval - elapsed,
                });
            }
        }
        Ok(())
    }

    /// Boolean form of [`check`](Self::check).
    pub fn can_make_request(&self) -> bool {
        self.check().is_ok()
    }

    /// Record one successful primary request.
    pub fn track_request(&self) {
        let now = self.clock.now();
        let mut state = self.lock();
        self.reset_if_new_day(&mut state, now.date_naive());
        state.request_count = state.request_count.saturating_add(1);
        state.last_request_at = Some(now);
        metrics::counter!(telemetry::QUOTA_REQUESTS_TOTAL).increment(1);
    }

    /// Snapshot of the current counters.
    pub fn stats(&self) -> UsageStats {
        self.lock().clone()
    }

    /// Replace the whole state at once.
    ///
    /// Meant for restoring a snapshot (and for tests that need "yesterday").
    pub fn restore(&self, stats: UsageStats) {
        *self.lock() = stats;
    }

    /// Zero every counter, as if the process had just started.
    pub fn reset(&self) {
        let today = self.clock.now().date_naive();
        *self.lock() = fresh_stats(&self.config, today);
    }

    fn reset_if_new_day(&self, state: &mut UsageStats, today: NaiveDate) {
        if state.last_reset_date != today {
            info!(
                previous = %state.last_reset_date,
                requests = state.request_count,
                "daily usage reset"
            );
            state.request_count = 0;
            state.limit_reached = false;
            state.last_reset_date = today;
        }
    }

    fn lock(&self) -> MutexGuard<'_, UsageStats> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl fmt::Debug for UsageTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UsageTracker")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish()
    }
}

fn fresh_stats(config: &UsageConfig, today: NaiveDate) -> UsageStats {
    UsageStats {
        request_count: 0,
        daily_limit: config.daily_limit,
        last_reset_date: today,
        limit_reached: false,
        last_request_at: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::TimeZone;

    fn clock_at(h: u32, m: u32) -> Arc<ManualClock> {
        Arc::new(ManualClock::new(
            Local.with_ymd_and_hms(2026, 5, 4, h, m, 0).unwrap(),
        ))
    }

    #[test]
    fn fresh_tracker_allows_requests() {
        let tracker = UsageTracker::with_clock(UsageConfig::new(), clock_at(8, 0));
        assert!(tracker.can_make_request());
        assert_eq!(tracker.stats().request_count, 0);
    }

    #[test]
    fn quota_latches_limit_reached() {
        let config = UsageConfig::new().daily_limit(2).min_interval(Duration::ZERO);
        let tracker = UsageTracker::with_clock(config, clock_at(8, 0));
        tracker.track_request();
        tracker.track_request();

        assert_eq!(
            tracker.check(),
            Err(UsageBlock::DailyLimit { limit: 2 })
        );
        assert!(tracker.stats().limit_reached);

        // Lowering the counter from outside does not unlatch the flag.
        let mut stats = tracker.stats();
        stats.request_count = 0;
        tracker.restore(stats);
        assert!(!tracker.can_make_request());
    }

    #[test]
    fn min_interval_blocks_until_elapsed() {
        let clock = clock_at(8, 0);
        let config = UsageConfig::new().min_interval(Duration::from_secs(600));
        let tracker = UsageTracker::with_clock(config, clock.clone());
        tracker.track_request();

        clock.advance(Duration::from_secs(300));
        match tracker.check() {
            Err(UsageBlock::MinInterval { remaining }) => {
                assert_eq!(remaining, Duration::from_secs(300))
            }
            other => panic!("expected MinInterval, got {other:?}"),
        }

        clock.advance(Duration::from_secs(300));
        assert!(tracker.can_make_request());
    }

    #[test]
    fn reset_clears_everything() {
        let config = UsageConfig::new().daily_limit(1);
        let tracker = UsageTracker::with_clock(config, clock_at(8, 0));
        tracker.track_request();
        assert!(!tracker.can_make_request());

        tracker.reset();
        let stats = tracker.stats();
        assert_eq!(stats.request_count, 0);
        assert!(!stats.limit_reached);
        assert!(stats.last_request_at.is_none());
        assert!(tracker.can_make_request());
    }

    #[test]
    fn usage_block_display() {
        assert_eq!(
            UsageBlock::DailyLimit { limit: 5 }.to_string(),
            "daily limit of 5 requests reached"
        );
        assert_eq!(
            UsageBlock::MinInterval {
                remaining: Duration::from_secs(42)
            }
            .to_string(),
            "next request allowed in 42s"
        );
    }
}
