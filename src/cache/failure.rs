//! Failure cache for primary-provider access errors.
//!
//! Records keys whose primary call answered 403 or 429. While a record is
//! fresh, dispatch skips the primary for that key and goes straight to the
//! fallback provider, without a network call and without surfacing an error.
//! Routing is the exception: it reports the remembered error instead.
//!
//! Kept apart from the response cache so the dispatcher can ask two
//! independent questions ("is there a good answer?" and "is this call
//! blocked?") without sentinel values in the response map.
//!
//! Other non-2xx statuses are not recorded: they are usually transient or
//! query-specific rather than account-wide.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use moka::sync::Cache;

use super::key::{CacheKey, Operation};
use crate::clock::{Clock, SystemClock};
use crate::error::WaypostError;

/// A 403/429 observed from the primary provider.
#[derive(Debug, Clone)]
pub struct FailureRecord {
    pub operation: Operation,
    /// 403 or 429.
    pub status: u16,
    /// Human-readable reason extracted from the error body.
    pub message: String,
    pub recorded_at: DateTime<Local>,
}

impl FailureRecord {
    /// The error this record stands in for, for callers that surface
    /// access failures instead of falling back.
    pub fn to_error(&self) -> WaypostError {
        match self.status {
            403 => WaypostError::Forbidden(self.message.clone()),
            _ => WaypostError::RateLimited { retry_after: None },
        }
    }
}

/// Configuration for the failure cache.
///
/// ```rust
/// # use waypost::FailureCacheConfig;
/// # use std::time::Duration;
/// let config = FailureCacheConfig::new().ttl(Duration::from_secs(6 * 3600));
/// ```
#[derive(Debug, Clone)]
pub struct FailureCacheConfig {
    /// How long a recorded failure bypasses the primary. Default: 24 hours.
    pub ttl: Duration,
    /// Optional capacity bound. Default: unbounded, so a fresh record only
    /// leaves through expiry or `clear()`.
    pub max_entries: Option<u64>,
}

impl Default for FailureCacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(24 * 3600),
            max_entries: None,
        }
    }
}

impl FailureCacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Bound the number of records. Past the bound moka may evict fresh
    /// records, letting the primary be asked again early.
    pub fn max_entries(mut self, n: u64) -> Self {
        self.max_entries = Some(n);
        self
    }
}

/// Thread-safe TTL map of blocked keys.
pub struct FailureCache {
    cache: Cache<CacheKey, FailureRecord>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl FailureCache {
    pub fn new(config: &FailureCacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &FailureCacheConfig, clock: Arc<dyn Clock>) -> Self {
        let mut builder = Cache::builder().time_to_live(config.ttl);
        if let Some(max) = config.max_entries {
            builder = builder.max_capacity(max);
        }
        Self {
            cache: builder.build(),
            ttl: config.ttl,
            clock,
        }
    }

    /// Record an access failure for `key`, replacing any earlier record.
    pub fn record(&self, key: CacheKey, status: u16, message: impl Into<String>) {
        let record = FailureRecord {
            operation: key.operation(),
            status,
            message: message.into(),
            recorded_at: self.clock.now(),
        };
        self.cache.insert(key, record);
    }

    /// Fresh record for `key`. Expired records are dropped on the way out.
    pub fn get(&self, key: &CacheKey) -> Option<FailureRecord> {
        let record = self.cache.get(key)?;
        if !self.is_fresh(&record) {
            self.cache.invalidate(key);
            return None;
        }
        Some(record)
    }

    /// Whether the primary should be skipped for `key`.
    pub fn is_blocked(&self, key: &CacheKey) -> bool {
        self.get(key).is_some()
    }

    /// All active records. Order is not guaranteed.
    pub fn list(&self) -> Vec<(CacheKey, FailureRecord)> {
        self.cache
            .iter()
            .filter(|(_, r)| self.is_fresh(r))
            .map(|(k, r)| ((*k).clone(), r))
            .collect()
    }

    pub fn clear(&self) {
        self.cache.invalidate_all();
    }

    pub fn len(&self) -> u64 {
        self.cache.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_fresh(&self, record: &FailureRecord) -> bool {
        self.clock.since(record.recorded_at) < self.ttl
    }
}
