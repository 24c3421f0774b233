//! Response cache for successful primary-provider answers.
//!
//! [`ResponseCache`] maps a [`CacheKey`] to the normalized response and the
//! instant it was stored. TTLs vary by operation (minutes for autocomplete,
//! hours for geocoding, a day for incidents) and are applied per entry
//! through a moka [`Expiry`].
//!
//! An entry is never returned once `now - stored_at >= ttl(operation)`: the
//! read path re-checks `stored_at` against the injected [`Clock`] instead of
//! relying only on moka's eviction timing. Stale and missing entries look
//! identical to callers.
//!
//! Only primary answers are cached. Fallback answers are returned to the
//! caller but not stored, so the primary gets asked again once it is usable.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use moka::Expiry;
use moka::future::Cache;

use super::key::{CacheKey, Operation};
use crate::clock::{Clock, SystemClock};
use crate::telemetry;
use crate::types::{FlowResult, GeocodeResponse, IncidentResponse, RouteResult, SearchResponse};

/// Configuration for the response cache.
///
/// ```rust
/// # use waypost::CacheConfig;
/// # use waypost::cache::Operation;
/// # use std::time::Duration;
/// let config = CacheConfig::new()
///     .ttl(Operation::Autocomplete, Duration::from_secs(120))
///     .max_entries(50_000);
/// ```
#[derive(Debug, Clone, Default)]
pub struct CacheConfig {
    /// Optional capacity bound. Default: unbounded (entries live for the
    /// process lifetime or until their TTL).
    pub max_entries: Option<u64>,
    /// Per-operation TTL overrides; see [`Operation::default_ttl`].
    pub ttls: HashMap<Operation, Duration>,
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound the number of cached entries.
    pub fn max_entries(mut self, n: u64) -> Self {
        self.max_entries = Some(n);
        self
    }

    /// Override the TTL for one operation.
    pub fn ttl(mut self, operation: Operation, ttl: Duration) -> Self {
        self.ttls.insert(operation, ttl);
        self
    }

    /// Use the same TTL for every operation.
    pub fn uniform_ttl(mut self, ttl: Duration) -> Self {
        for op in Operation::ALL {
            self.ttls.insert(op, ttl);
        }
        self
    }

    /// Effective TTL for an operation.
    pub fn ttl_for(&self, operation: Operation) -> Duration {
        self.ttls
            .get(&operation)
            .copied()
            .unwrap_or_else(|| operation.default_ttl())
    }
}

/// Cached value, one variant per canonical response shape.
#[derive(Clone, Debug)]
pub enum CachedResponse {
    Geocode(GeocodeResponse),
    Search(SearchResponse),
    Flow(FlowResult),
    Route(RouteResult),
    Incidents(IncidentResponse),
}

/// Conversion between a response type and its [`CachedResponse`] variant.
pub trait Cacheable: Clone + Send + Sync + 'static {
    fn into_cached(self) -> CachedResponse;
    fn from_cached(cached: CachedResponse) -> Option<Self>;
}

macro_rules! impl_cacheable {
    ($ty:ty, $variant:ident) => {
        impl Cacheable for $ty {
            fn into_cached(self) -> CachedResponse {
                CachedResponse::$variant(self)
            }

            fn from_cached(cached: CachedResponse) -> Option<Self> {
                match cached {
                    CachedResponse::$variant(v) => Some(v),
                    _ => None,
                }
            }
        }
    };
}

impl_cacheable!(GeocodeResponse, Geocode);
impl_cacheable!(SearchResponse, Search);
impl_cacheable!(FlowResult, Flow);
impl_cacheable!(RouteResult, Route);
impl_cacheable!(IncidentResponse, Incidents);

#[derive(Clone, Debug)]
struct CacheEntry {
    value: CachedResponse,
    stored_at: DateTime<Local>,
}

/// Per-entry TTL keyed on the operation.
struct OperationExpiry {
    config: CacheConfig,
}

impl Expiry<CacheKey, CacheEntry> for OperationExpiry {
    fn expire_after_create(
        &self,
        key: &CacheKey,
        _value: &CacheEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(self.config.ttl_for(key.operation()))
    }

    // Overwrites restart the clock.
    fn expire_after_update(
        &self,
        key: &CacheKey,
        _value: &CacheEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(self.config.ttl_for(key.operation()))
    }
}

/// In-memory TTL cache of normalized responses.
pub struct ResponseCache {
    cache: Cache<CacheKey, CacheEntry>,
    config: CacheConfig,
    clock: Arc<dyn Clock>,
}

impl ResponseCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &CacheConfig, clock: Arc<dyn Clock>) -> Self {
        let mut builder = Cache::builder().expire_after(OperationExpiry {
            config: config.clone(),
        });
        if let Some(max) = config.max_entries {
            builder = builder.max_capacity(max);
        }
        Self {
            cache: builder.build(),
            config: config.clone(),
            clock,
        }
    }

    /// Fresh cached value for `key`, or `None`.
    ///
    /// Emits cache hit/miss metrics.
    pub async fn get<T: Cacheable>(&self, key: &CacheKey) -> Option<T> {
        let operation = key.operation().as_str();
        let hit = self
            .fresh_entry(key)
            .await
            .and_then(|entry| T::from_cached(entry.value));
        match hit {
            Some(value) => {
                metrics::counter!(telemetry::CACHE_HITS_TOTAL, "operation" => operation)
                    .increment(1);
                Some(value)
            }
            None => {
                metrics::counter!(telemetry::CACHE_MISSES_TOTAL, "operation" => operation)
                    .increment(1);
                None
            }
        }
    }

    /// Like [`get`](Self::get) but without hit/miss metrics, for re-checks
    /// after waiting on an in-flight request.
    pub async fn peek<T: Cacheable>(&self, key: &CacheKey) -> Option<T> {
        self.fresh_entry(key)
            .await
            .and_then(|entry| T::from_cached(entry.value))
    }

    /// Store (or overwrite) a value.
    pub async fn insert<T: Cacheable>(&self, key: CacheKey, value: T) {
        let entry = CacheEntry {
            value: value.into_cached(),
            stored_at: self.clock.now(),
        };
        self.cache.insert(key, entry).await;
    }

    /// Whether a fresh entry exists, without touching metrics.
    pub async fn contains_fresh(&self, key: &CacheKey) -> bool {
        self.fresh_entry(key).await.is_some()
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.cache.invalidate_all();
    }

    /// Approximate number of entries (moka counts lazily).
    pub fn len(&self) -> u64 {
        self.cache.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    async fn fresh_entry(&self, key: &CacheKey) -> Option<CacheEntry> {
        let entry = self.cache.get(key).await?;
        if self.clock.since(entry.stored_at) >= self.config.ttl_for(key.operation()) {
            self.cache.invalidate(key).await;
            return None;
        }
        Some(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Position, PositionResult};

    fn geocode_key(q: &str) -> CacheKey {
        CacheKey::builder(Operation::Geocode).text("query", q).build()
    }

    fn one_result(lat: f64) -> GeocodeResponse {
        GeocodeResponse {
            results: vec![PositionResult {
                position: Position::new(lat, 121.0),
                ..Default::default()
            }],
        }
    }

    #[test]
    fn config_falls_back_to_operation_defaults() {
        let config = CacheConfig::new().ttl(Operation::Geocode, Duration::from_secs(1));
        assert_eq!(config.ttl_for(Operation::Geocode), Duration::from_secs(1));
        assert_eq!(
            config.ttl_for(Operation::Route),
            Operation::Route.default_ttl()
        );
    }

    #[tokio::test]
    async fn wrong_variant_is_a_miss() {
        let cache = ResponseCache::new(&CacheConfig::default());
        cache.insert(geocode_key("a"), one_result(14.0)).await;
        assert!(cache.get::<SearchResponse>(&geocode_key("a")).await.is_none());
    }

    #[tokio::test]
    async fn overwrite_restarts_the_ttl() {
        let clock = Arc::new(crate::clock::ManualClock::new(Local::now()));
        let config = CacheConfig::new().ttl(Operation::Geocode, Duration::from_secs(600));
        let cache = ResponseCache::with_clock(&config, clock.clone());
        cache.insert(geocode_key("a"), one_result(14.0)).await;
        clock.advance(Duration::from_secs(500));
        cache.insert(geocode_key("a"), one_result(15.0)).await;
        clock.advance(Duration::from_secs(500));
        assert!(cache.contains_fresh(&geocode_key("a")).await);
        clock.advance(Duration::from_secs(100));
        assert!(!cache.contains_fresh(&geocode_key("a")).await);
    }

    #[tokio::test]
    async fn overwrite_replaces_value() {
        let cache = ResponseCache::new(&CacheConfig::default());
        cache.insert(geocode_key("a"), one_result(14.0)).await;
        cache.insert(geocode_key("a"), one_result(15.0)).await;
        let got: GeocodeResponse = cache.get(&geocode_key("a")).await.unwrap();
        assert_eq!(got.results[0].position.lat, 15.0);
    }
}
