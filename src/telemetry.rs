//! Telemetry metric name constants.
//!
//! Consumers install their own `metrics` recorder (e.g. prometheus, statsd);
//! without a recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `waypost_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `provider`: provider name (e.g. "tomtom", "nominatim")
//! - `operation`: map operation (e.g. "geocode", "route")
//! - `status`: outcome: "ok" or "error"
//! - `reason`: why a fallback was taken (see [`FallbackReason`](crate::gateway::FallbackReason))

/// Total provider requests issued over the network.
///
/// Labels: `provider`, `operation`, `status` ("ok" | "error").
pub const REQUESTS_TOTAL: &str = "waypost_requests_total";

/// Provider request duration in seconds.
///
/// Labels: `provider`, `operation`.
pub const REQUEST_DURATION_SECONDS: &str = "waypost_request_duration_seconds";

/// Total retry attempts (not counting the initial request).
///
/// Labels: `provider`, `operation`.
pub const RETRIES_TOTAL: &str = "waypost_retries_total";

/// Total response cache hits.
///
/// Labels: `operation`.
pub const CACHE_HITS_TOTAL: &str = "waypost_cache_hits_total";

/// Total response cache misses.
///
/// Labels: `operation`.
pub const CACHE_MISSES_TOTAL: &str = "waypost_cache_misses_total";

/// Total requests answered by a fallback provider instead of the primary.
///
/// Labels: `operation`, `reason`.
pub const FALLBACKS_TOTAL: &str = "waypost_fallbacks_total";

/// Total 403/429 responses recorded in the failure cache.
///
/// Labels: `operation`, `status`.
pub const FAILURES_RECORDED_TOTAL: &str = "waypost_failures_recorded_total";

/// Primary requests recorded against the daily quota.
pub const QUOTA_REQUESTS_TOTAL: &str = "waypost_quota_requests_total";

/// Primary calls skipped because the usage tracker refused them.
///
/// Labels: `operation`, `reason` ("daily_limit" | "min_interval").
pub const USAGE_BLOCKED_TOTAL: &str = "waypost_usage_blocked_total";
