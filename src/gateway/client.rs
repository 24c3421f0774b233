//! MapClient: the dispatcher every map operation goes through.
//!
//! Each operation follows one template: response cache, then the failure
//! cache, the primary's circuit and the usage budget, then the primary call
//! itself under timeout, retry and cancellation. Anything that keeps the
//! primary from answering sends the call to the operation's fallback
//! provider, and a failing fallback yields the operation's neutral value.
//!
//! Routing is the exception: quota exhaustion and 403/429 surface as errors,
//! and the open routing fallback's error is returned when it fails too.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::OwnedMutexGuard;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, trace, warn};

use super::incidents;
use super::singleflight::SingleFlight;
use crate::cache::{
    CacheKey, CacheKeyBuilder, Cacheable, FailureCache, FailureRecord, Operation, ResponseCache,
};
use crate::clock::Clock;
use crate::providers::retry::{RetryConfig, with_retry};
use crate::providers::{
    CircuitPermit, CircuitState, GeocodeProvider, PlaceProvider, ProviderCircuit, RouteProvider,
    TomTomClient, TrafficProvider,
};
use crate::traits::MapGateway;
use crate::types::{
    BoundingBox, FlowOptions, FlowResult, GeocodeOptions, GeocodeResponse, IncidentOptions,
    IncidentResponse, LatLng, MapStyle, RouteOptions, RouteResult, SearchOptions, SearchResponse,
};
use crate::usage::{UsageBlock, UsageStats, UsageTracker};
use crate::{Result, WaypostError, telemetry};

// ============================================================================
// Provider sets
// ============================================================================

/// One provider slot per capability.
///
/// The gateway holds two sets: the primary (usually TomTom for every slot)
/// and the fallbacks (one open or secondary vendor per slot).
#[derive(Clone, Default)]
pub struct ProviderSet {
    pub(crate) geocode: Option<Arc<dyn GeocodeProvider>>,
    pub(crate) places: Option<Arc<dyn PlaceProvider>>,
    pub(crate) routes: Option<Arc<dyn RouteProvider>>,
    pub(crate) traffic: Option<Arc<dyn TrafficProvider>>,
}

impl ProviderSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// The same provider in every slot.
    pub fn all<P>(provider: Arc<P>) -> Self
    where
        P: GeocodeProvider + PlaceProvider + RouteProvider + TrafficProvider + 'static,
    {
        let geocode: Arc<dyn GeocodeProvider> = provider.clone();
        let places: Arc<dyn PlaceProvider> = provider.clone();
        let routes: Arc<dyn RouteProvider> = provider.clone();
        let traffic: Arc<dyn TrafficProvider> = provider;
        Self {
            geocode: Some(geocode),
            places: Some(places),
            routes: Some(routes),
            traffic: Some(traffic),
        }
    }

    pub fn geocode(mut self, provider: Arc<dyn GeocodeProvider>) -> Self {
        self.geocode = Some(provider);
        self
    }

    pub fn places(mut self, provider: Arc<dyn PlaceProvider>) -> Self {
        self.places = Some(provider);
        self
    }

    pub fn routes(mut self, provider: Arc<dyn RouteProvider>) -> Self {
        self.routes = Some(provider);
        self
    }

    pub fn traffic(mut self, provider: Arc<dyn TrafficProvider>) -> Self {
        self.traffic = Some(provider);
        self
    }

    /// Fill empty slots from `other`.
    pub(crate) fn or(self, other: ProviderSet) -> Self {
        Self {
            geocode: self.geocode.or(other.geocode),
            places: self.places.or(other.places),
            routes: self.routes.or(other.routes),
            traffic: self.traffic.or(other.traffic),
        }
    }
}

impl fmt::Debug for ProviderSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderSet")
            .field("geocode", &self.geocode.as_ref().map(|p| p.name()))
            .field("places", &self.places.as_ref().map(|p| p.name()))
            .field("routes", &self.routes.as_ref().map(|p| p.name()))
            .field("traffic", &self.traffic.as_ref().map(|p| p.name()))
            .finish()
    }
}

// ============================================================================
// Status
// ============================================================================

/// Why a call was answered by the fallback instead of the primary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    /// The key is in the failure cache.
    FailureCached,
    /// The primary's circuit is open.
    CircuitOpen,
    /// Daily quota or minimum interval.
    UsageBlocked,
    /// The primary just answered 403/429.
    AccessDenied,
    /// Transport error or timeout.
    Network,
    /// Any other primary error.
    ProviderError,
    /// No primary configured for the capability.
    NoPrimary,
    /// Turned off in configuration.
    Disabled,
}

impl FallbackReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FailureCached => "failure_cached",
            Self::CircuitOpen => "circuit_open",
            Self::UsageBlocked => "usage_blocked",
            Self::AccessDenied => "access_denied",
            Self::Network => "network",
            Self::ProviderError => "provider_error",
            Self::NoPrimary => "no_primary",
            Self::Disabled => "disabled",
        }
    }
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of the gateway's internal state.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayStatus {
    pub circuit: CircuitState,
    pub consecutive_failures: u32,
    pub usage: UsageStats,
    /// Approximate; the cache counts lazily.
    pub cached_responses: u64,
    pub blocked_keys: usize,
    pub in_flight: usize,
    pub traffic_flow_enabled: bool,
}

// ============================================================================
// MapClient
// ============================================================================

/// Rate-limited multi-provider map client.
///
/// Built with [`Waypost::builder()`](super::Waypost::builder) and shared by
/// reference (`Arc<MapClient>`) with every caller.
pub struct MapClient {
    pub(crate) primary: ProviderSet,
    pub(crate) fallback: ProviderSet,
    pub(crate) tiles: Option<TomTomClient>,
    pub(crate) responses: ResponseCache,
    pub(crate) failures: FailureCache,
    pub(crate) usage: UsageTracker,
    pub(crate) circuit: ProviderCircuit,
    pub(crate) retry: RetryConfig,
    pub(crate) request_timeout: Duration,
    pub(crate) single_flight: Option<SingleFlight>,
    pub(crate) traffic_flow_enabled: bool,
    pub(crate) clock: Arc<dyn Clock>,
}

enum Flight<T> {
    /// Another caller answered while we waited.
    Answered(T),
    /// We lead; the guard (if coalescing is on) blocks identical calls.
    Lead(Option<OwnedMutexGuard<()>>),
}

impl MapClient {
    // ------------------------------------------------------------------
    // Geocoding
    // ------------------------------------------------------------------

    /// Free-text address to positions.
    #[instrument(skip(self, options), fields(operation = "geocode"))]
    pub async fn geocode(&self, query: &str, options: &GeocodeOptions) -> Result<GeocodeResponse> {
        if query.trim().is_empty() {
            return Ok(GeocodeResponse::empty());
        }
        let key = CacheKey::builder(Operation::Geocode)
            .text("query", query)
            .opt("limit", options.limit)
            .opt_text("country", options.country.as_deref())
            .opt_text("language", options.language.as_deref())
            .build();
        let primary = self
            .primary
            .geocode
            .as_deref()
            .map(|p| (p.name(), move || p.geocode(query, options)));
        let fallback = self
            .fallback
            .geocode
            .as_deref()
            .map(|p| move || p.geocode(query, options));
        self.dispatch(key, options.cancel.as_ref(), primary, fallback, GeocodeResponse::empty())
            .await
    }

    /// Coordinates to addresses.
    #[instrument(skip(self, options), fields(operation = "reverse_geocode"))]
    pub async fn reverse_geocode(
        &self,
        lat: f64,
        lng: f64,
        options: &GeocodeOptions,
    ) -> Result<GeocodeResponse> {
        let point = LatLng::new(lat, lng);
        if !point.is_finite() {
            return Ok(GeocodeResponse::empty());
        }
        let key = CacheKey::builder(Operation::ReverseGeocode)
            .point("lat", "lng", point)
            .opt_text("language", options.language.as_deref())
            .build();
        let primary = self
            .primary
            .geocode
            .as_deref()
            .map(|p| (p.name(), move || p.reverse_geocode(point, options)));
        let fallback = self
            .fallback
            .geocode
            .as_deref()
            .map(|p| move || p.reverse_geocode(point, options));
        self.dispatch(key, options.cancel.as_ref(), primary, fallback, GeocodeResponse::empty())
            .await
    }

    // ------------------------------------------------------------------
    // Places
    // ------------------------------------------------------------------

    #[instrument(skip(self, options), fields(operation = "search_places"))]
    pub async fn search_places(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<SearchResponse> {
        if query.trim().is_empty() {
            return Ok(SearchResponse::empty());
        }
        let key = search_key(Operation::SearchPlaces, options)
            .text("query", query)
            .build();
        let primary = self
            .primary
            .places
            .as_deref()
            .map(|p| (p.name(), move || p.search_places(query, options)));
        let fallback = self
            .fallback
            .places
            .as_deref()
            .map(|p| move || p.search_places(query, options));
        self.dispatch(key, options.cancel.as_ref(), primary, fallback, SearchResponse::empty())
            .await
    }

    #[instrument(skip(self, options), fields(operation = "autocomplete"))]
    pub async fn autocomplete_places(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<SearchResponse> {
        if query.trim().is_empty() {
            return Ok(SearchResponse::empty());
        }
        let key = search_key(Operation::Autocomplete, options)
            .text("query", query)
            .build();
        let primary = self
            .primary
            .places
            .as_deref()
            .map(|p| (p.name(), move || p.autocomplete_places(query, options)));
        let fallback = self
            .fallback
            .places
            .as_deref()
            .map(|p| move || p.autocomplete_places(query, options));
        self.dispatch(key, options.cancel.as_ref(), primary, fallback, SearchResponse::empty())
            .await
    }

    /// Places at or nearest to a point.
    #[instrument(skip(self, options), fields(operation = "place_details"))]
    pub async fn place_details(
        &self,
        lat: f64,
        lng: f64,
        options: &SearchOptions,
    ) -> Result<SearchResponse> {
        let point = LatLng::new(lat, lng);
        if !point.is_finite() {
            return Ok(SearchResponse::empty());
        }
        let key = search_key(Operation::PlaceDetails, options)
            .point("lat", "lng", point)
            .build();
        let primary = self
            .primary
            .places
            .as_deref()
            .map(|p| (p.name(), move || p.place_details(point, options)));
        let fallback = self
            .fallback
            .places
            .as_deref()
            .map(|p| move || p.place_details(point, options));
        self.dispatch(key, options.cancel.as_ref(), primary, fallback, SearchResponse::empty())
            .await
    }

    /// Points of interest of one category around a point.
    #[instrument(skip(self, options), fields(operation = "poi_category"))]
    pub async fn search_poi_by_category(
        &self,
        category: &str,
        lat: f64,
        lng: f64,
        options: &SearchOptions,
    ) -> Result<SearchResponse> {
        let point = LatLng::new(lat, lng);
        if category.trim().is_empty() || !point.is_finite() {
            return Ok(SearchResponse::empty());
        }
        let key = search_key(Operation::PoiCategory, options)
            .text("category", category)
            .point("lat", "lng", point)
            .build();
        let primary = self.primary.places.as_deref().map(|p| {
            (p.name(), move || {
                p.search_poi_by_category(category, point, options)
            })
        });
        let fallback = self
            .fallback
            .places
            .as_deref()
            .map(|p| move || p.search_poi_by_category(category, point, options));
        self.dispatch(key, options.cancel.as_ref(), primary, fallback, SearchResponse::empty())
            .await
    }

    // ------------------------------------------------------------------
    // Traffic
    // ------------------------------------------------------------------

    /// Live speed on the road segment nearest to a point.
    ///
    /// Never fails for provider reasons: the worst case is
    /// [`FlowResult::default_estimate`].
    #[instrument(skip(self, options), fields(operation = "traffic_flow"))]
    pub async fn traffic_flow(&self, lat: f64, lng: f64, options: &FlowOptions) -> Result<FlowResult> {
        let point = LatLng::new(lat, lng);
        if !point.is_finite() {
            return Ok(FlowResult::default_estimate());
        }
        let cancel = options.cancel.as_ref();
        let fallback = self
            .fallback
            .traffic
            .as_deref()
            .map(|p| move || p.traffic_flow(point, options));
        if !self.traffic_flow_enabled {
            check_cancelled(cancel)?;
            return self
                .run_fallback(
                    Operation::TrafficFlow,
                    FallbackReason::Disabled,
                    cancel,
                    fallback,
                    FlowResult::default_estimate(),
                )
                .await;
        }
        let key = CacheKey::builder(Operation::TrafficFlow)
            .point("lat", "lng", point)
            .raw("zoom", options.zoom)
            .build();
        let primary = self
            .primary
            .traffic
            .as_deref()
            .map(|p| (p.name(), move || p.traffic_flow(point, options)));
        self.dispatch(key, cancel, primary, fallback, FlowResult::default_estimate())
            .await
    }

    /// Incidents inside `bounds` between `start` and `end`.
    ///
    /// `start` defaults to local midnight, `end` to now. Invalid boxes or
    /// windows yield an empty list without a network call.
    #[instrument(skip(self, options), fields(operation = "traffic_incidents"))]
    pub async fn traffic_incidents(
        &self,
        bounds: BoundingBox,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        options: &IncidentOptions,
    ) -> Result<IncidentResponse> {
        if !incidents::valid_bounds(&bounds) {
            debug!(?bounds, "rejecting incident query: invalid bounding box");
            return Ok(IncidentResponse::empty());
        }
        let now = self.clock.now();
        let Some((from, to)) = incidents::resolve_window(start, end, now) else {
            debug!(?start, ?end, "rejecting incident query: empty time window");
            return Ok(IncidentResponse::empty());
        };

        let mut key = CacheKey::builder(Operation::TrafficIncidents)
            .coord("min_lat", bounds.min_lat)
            .coord("min_lng", bounds.min_lng)
            .coord("max_lat", bounds.max_lat)
            .coord("max_lng", bounds.max_lng)
            .opt_text("language", options.language.as_deref());
        key = if start.is_none() && end.is_none() {
            key.raw("day", now.date_naive())
        } else {
            key.raw("from", from.timestamp() / 60)
                .raw("to", to.timestamp() / 60)
        };
        let key = key.build();

        let primary = self
            .primary
            .traffic
            .as_deref()
            .map(|p| (p.name(), move || p.traffic_incidents(bounds, from, to, options)));
        let fallback = self
            .fallback
            .traffic
            .as_deref()
            .map(|p| move || p.traffic_incidents(bounds, from, to, options));
        self.dispatch(key, options.cancel.as_ref(), primary, fallback, IncidentResponse::empty())
            .await
    }

    // ------------------------------------------------------------------
    // Routing
    // ------------------------------------------------------------------

    /// Route between two points.
    ///
    /// Unlike the other operations this surfaces errors: `QuotaExceeded`
    /// when the usage budget blocks, `RateLimited`/`Forbidden` on 429/403.
    /// A remembered 403/429 for the same route, or an open circuit, is
    /// reported the same way without a network call. Other primary failures
    /// go to the open routing fallback, whose error is returned if it fails
    /// as well.
    #[instrument(skip(self, options), fields(operation = "route"))]
    pub async fn calculate_route(
        &self,
        origin: LatLng,
        destination: LatLng,
        options: &RouteOptions,
    ) -> Result<RouteResult> {
        if !origin.is_finite() || !destination.is_finite() {
            return Err(WaypostError::InvalidInput(
                "route endpoints must be finite coordinates".to_string(),
            ));
        }
        let cancel = options.cancel.as_ref();
        check_cancelled(cancel)?;

        let key = CacheKey::builder(Operation::Route)
            .point("origin_lat", "origin_lng", origin)
            .point("dest_lat", "dest_lng", destination)
            .raw("mode", options.travel_mode.as_str())
            .raw("type", options.route_type.as_str())
            .raw("traffic", options.traffic)
            .build();
        if let Some(hit) = self.responses.get::<RouteResult>(&key).await {
            trace!(%key, "response cache hit");
            return Ok(hit);
        }

        let Some(primary) = self.primary.routes.as_deref() else {
            return self
                .route_via_fallback(origin, destination, options, FallbackReason::NoPrimary)
                .await;
        };

        let guard = match self.coalesce::<RouteResult>(&key, cancel).await? {
            Flight::Answered(route) => return Ok(route),
            Flight::Lead(guard) => guard,
        };

        // Access failures surface to the caller instead of falling back.
        if let Some(record) = self.failures.get(&key) {
            trace!(%key, status = record.status, "routing blocked by recent access failure");
            return Err(record.to_error());
        }
        let Some(permit) = self.circuit.try_acquire() else {
            trace!(%key, "routing blocked: circuit open");
            return Err(self.circuit_rejection());
        };
        if let Err(block) = self.usage.check() {
            self.count_usage_block(Operation::Route, &block);
            debug!(%key, %block, "usage budget blocks routing");
            return Err(WaypostError::QuotaExceeded(block));
        }

        let call = move || primary.calculate_route(origin, destination, options);
        let reason = match self.attempt_primary(&key, cancel, primary.name(), call).await {
            Ok(route) => {
                permit.succeeded();
                return Ok(route);
            }
            Err(e) if e.is_access_denied() => {
                warn!(%key, provider = primary.name(), error = %e, "routing denied by primary");
                self.record_denial(&key, &e, permit);
                return Err(e);
            }
            Err(e) if e.is_cancelled() => return Err(e),
            Err(e) => {
                drop(permit);
                debug!(%key, provider = primary.name(), error = %e, "primary routing failed");
                reason_for(&e)
            }
        };
        drop(guard);
        self.route_via_fallback(origin, destination, options, reason)
            .await
    }

    /// Route with the open routing service directly, bypassing the primary
    /// and the caches.
    #[instrument(skip(self, options), fields(operation = "route"))]
    pub async fn fallback_route(
        &self,
        origin: LatLng,
        destination: LatLng,
        options: &RouteOptions,
    ) -> Result<RouteResult> {
        let provider = self
            .fallback
            .routes
            .as_deref()
            .ok_or(WaypostError::NoProvider)?;
        cancellable(
            options.cancel.as_ref(),
            provider.calculate_route(origin, destination, options),
        )
        .await
    }

    /// Error for a route refused by the open circuit, matching the denial
    /// that opened it.
    fn circuit_rejection(&self) -> WaypostError {
        match self.circuit.last_denial() {
            Some(403) => WaypostError::Forbidden(
                "primary provider suspended after repeated access denials".to_string(),
            ),
            _ => WaypostError::RateLimited {
                retry_after: self.circuit.remaining_cooldown(),
            },
        }
    }

    async fn route_via_fallback(
        &self,
        origin: LatLng,
        destination: LatLng,
        options: &RouteOptions,
        reason: FallbackReason,
    ) -> Result<RouteResult> {
        count_fallback(Operation::Route, reason);
        self.fallback_route(origin, destination, options).await
    }

    // ------------------------------------------------------------------
    // Tiles and housekeeping
    // ------------------------------------------------------------------

    /// Raster tile URL template for `style`, with `{z}`/`{x}`/`{y}`
    /// placeholders. See [`render_tile_url`](crate::types::render_tile_url).
    pub fn tile_url_template(&self, style: MapStyle) -> Result<String> {
        self.tiles
            .as_ref()
            .map(|tiles| tiles.tile_url_template(style))
            .ok_or(WaypostError::NoProvider)
    }

    pub fn status(&self) -> GatewayStatus {
        GatewayStatus {
            circuit: self.circuit.state(),
            consecutive_failures: self.circuit.consecutive_failures(),
            usage: self.usage.stats(),
            cached_responses: self.responses.len(),
            blocked_keys: self.failures.list().len(),
            in_flight: self.single_flight.as_ref().map_or(0, SingleFlight::in_flight),
            traffic_flow_enabled: self.traffic_flow_enabled,
        }
    }

    /// Drop every cached response and every failure record.
    pub fn clear_cache(&self) {
        self.responses.clear();
        self.failures.clear();
    }

    pub fn reset_usage(&self) {
        self.usage.reset();
    }

    /// Force the primary's circuit closed.
    pub fn reset_circuit(&self) {
        self.circuit.reset();
    }

    pub fn usage(&self) -> UsageStats {
        self.usage.stats()
    }

    /// Keys currently kept away from the primary.
    pub fn failure_records(&self) -> Vec<(CacheKey, FailureRecord)> {
        self.failures.list()
    }

    // ------------------------------------------------------------------
    // Dispatch
    // ------------------------------------------------------------------

    async fn dispatch<T, P, PF, F, FF>(
        &self,
        key: CacheKey,
        cancel: Option<&CancellationToken>,
        primary: Option<(&str, P)>,
        fallback: Option<F>,
        neutral: T,
    ) -> Result<T>
    where
        T: Cacheable,
        P: Fn() -> PF,
        PF: Future<Output = Result<T>>,
        F: FnOnce() -> FF,
        FF: Future<Output = Result<T>>,
    {
        check_cancelled(cancel)?;
        if let Some(hit) = self.responses.get::<T>(&key).await {
            trace!(%key, "response cache hit");
            return Ok(hit);
        }

        let reason = match primary {
            None => FallbackReason::NoPrimary,
            Some((provider, call)) => {
                let _guard = match self.coalesce::<T>(&key, cancel).await? {
                    Flight::Answered(value) => return Ok(value),
                    Flight::Lead(guard) => guard,
                };
                match self.gate(&key) {
                    Err(reason) => reason,
                    Ok(permit) => match self.attempt_primary(&key, cancel, provider, call).await {
                        Ok(value) => {
                            permit.succeeded();
                            return Ok(value);
                        }
                        Err(e) => self.classify_failure(&key, provider, e, permit)?,
                    },
                }
            }
        };

        self.run_fallback(key.operation(), reason, cancel, fallback, neutral)
            .await
    }

    /// Wait for an identical in-flight call, if coalescing is on.
    async fn coalesce<T: Cacheable>(
        &self,
        key: &CacheKey,
        cancel: Option<&CancellationToken>,
    ) -> Result<Flight<T>> {
        let Some(flights) = &self.single_flight else {
            return Ok(Flight::Lead(None));
        };
        let guard = cancellable(cancel, async { Ok(flights.acquire(key).await) }).await?;
        match self.responses.peek::<T>(key).await {
            Some(value) => {
                trace!(%key, "answered by coalesced request");
                Ok(Flight::Answered(value))
            }
            None => Ok(Flight::Lead(Some(guard))),
        }
    }

    /// Checks that keep the primary out of the call, in order. On success
    /// the caller holds the circuit permit for the primary call.
    fn gate(&self, key: &CacheKey) -> std::result::Result<CircuitPermit<'_>, FallbackReason> {
        if let Some(record) = self.failures.get(key) {
            trace!(%key, status = record.status, "primary skipped: recent access failure");
            return Err(FallbackReason::FailureCached);
        }
        let Some(permit) = self.circuit.try_acquire() else {
            trace!(%key, "primary skipped: circuit open");
            return Err(FallbackReason::CircuitOpen);
        };
        if let Err(block) = self.usage.check() {
            self.count_usage_block(key.operation(), &block);
            debug!(%key, %block, "primary skipped: usage budget");
            return Err(FallbackReason::UsageBlocked);
        }
        Ok(permit)
    }

    /// Primary call under timeout, retry and cancellation. Success is
    /// counted and cached.
    async fn attempt_primary<T, P, PF>(
        &self,
        key: &CacheKey,
        cancel: Option<&CancellationToken>,
        provider: &str,
        call: P,
    ) -> Result<T>
    where
        T: Cacheable,
        P: Fn() -> PF,
        PF: Future<Output = Result<T>>,
    {
        let timeout = self.request_timeout;
        let call = &call;
        let attempt = move || async move {
            tokio::time::timeout(timeout, call())
                .await
                .unwrap_or_else(|_| Err(WaypostError::Timeout))
        };
        let operation = key.operation().as_str();
        let value = cancellable(cancel, with_retry(&self.retry, provider, operation, attempt)).await?;

        self.usage.track_request();
        self.responses.insert(key.clone(), value.clone()).await;
        Ok(value)
    }

    /// Book-keeping for a failed primary call. Cancellation propagates,
    /// everything else becomes a fallback reason. Only access errors give
    /// the circuit a verdict.
    fn classify_failure(
        &self,
        key: &CacheKey,
        provider: &str,
        error: WaypostError,
        permit: CircuitPermit<'_>,
    ) -> Result<FallbackReason> {
        if error.is_cancelled() {
            trace!(%key, "request cancelled");
            return Err(error);
        }
        if error.is_access_denied() {
            warn!(%key, provider, error = %error, "primary denied access, using fallback");
            self.record_denial(key, &error, permit);
            return Ok(FallbackReason::AccessDenied);
        }

        drop(permit);
        let reason = reason_for(&error);
        if reason == FallbackReason::Network {
            trace!(%key, provider, error = %error, "primary unreachable, using fallback");
        } else {
            debug!(%key, provider, error = %error, "primary failed, using fallback");
        }
        Ok(reason)
    }

    /// Memoize a 403/429 for `key` and count it against the circuit.
    fn record_denial(&self, key: &CacheKey, error: &WaypostError, permit: CircuitPermit<'_>) {
        let status = error.status().unwrap_or(429);
        let message = match error {
            WaypostError::Forbidden(message) => message.clone(),
            other => other.to_string(),
        };
        self.failures.record(key.clone(), status, message);
        metrics::counter!(telemetry::FAILURES_RECORDED_TOTAL,
            "operation" => key.operation().as_str(),
            "status" => status.to_string(),
        )
        .increment(1);
        permit.denied(status);
    }

    async fn run_fallback<T, F, FF>(
        &self,
        operation: Operation,
        reason: FallbackReason,
        cancel: Option<&CancellationToken>,
        fallback: Option<F>,
        neutral: T,
    ) -> Result<T>
    where
        F: FnOnce() -> FF,
        FF: Future<Output = Result<T>>,
    {
        count_fallback(operation, reason);
        let Some(fallback) = fallback else {
            debug!(operation = operation.as_str(), %reason, "no fallback provider, returning neutral result");
            return Ok(neutral);
        };
        match cancellable(cancel, fallback()).await {
            Ok(value) => Ok(value),
            Err(WaypostError::Cancelled) => Err(WaypostError::Cancelled),
            Err(WaypostError::NotImplemented(what)) => {
                trace!(operation = operation.as_str(), what, "fallback does not support operation");
                Ok(neutral)
            }
            Err(e) => {
                debug!(operation = operation.as_str(), %reason, error = %e, "fallback failed, returning neutral result");
                Ok(neutral)
            }
        }
    }

    fn count_usage_block(&self, operation: Operation, block: &UsageBlock) {
        metrics::counter!(telemetry::USAGE_BLOCKED_TOTAL,
            "operation" => operation.as_str(),
            "reason" => block.as_str(),
        )
        .increment(1);
    }
}

impl fmt::Debug for MapClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapClient")
            .field("primary", &self.primary)
            .field("fallback", &self.fallback)
            .field("usage", &self.usage)
            .field("circuit", &self.circuit.state())
            .field("request_timeout", &self.request_timeout)
            .field("coalesce_requests", &self.single_flight.is_some())
            .field("traffic_flow_enabled", &self.traffic_flow_enabled)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// MapGateway
// ============================================================================

#[async_trait]
impl MapGateway for MapClient {
    async fn geocode(&self, query: &str, options: &GeocodeOptions) -> Result<GeocodeResponse> {
        MapClient::geocode(self, query, options).await
    }

    async fn reverse_geocode(
        &self,
        lat: f64,
        lng: f64,
        options: &GeocodeOptions,
    ) -> Result<GeocodeResponse> {
        MapClient::reverse_geocode(self, lat, lng, options).await
    }

    async fn search_places(&self, query: &str, options: &SearchOptions) -> Result<SearchResponse> {
        MapClient::search_places(self, query, options).await
    }

    async fn autocomplete_places(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<SearchResponse> {
        MapClient::autocomplete_places(self, query, options).await
    }

    async fn place_details(
        &self,
        lat: f64,
        lng: f64,
        options: &SearchOptions,
    ) -> Result<SearchResponse> {
        MapClient::place_details(self, lat, lng, options).await
    }

    async fn search_poi_by_category(
        &self,
        category: &str,
        lat: f64,
        lng: f64,
        options: &SearchOptions,
    ) -> Result<SearchResponse> {
        MapClient::search_poi_by_category(self, category, lat, lng, options).await
    }

    async fn traffic_flow(&self, lat: f64, lng: f64, options: &FlowOptions) -> Result<FlowResult> {
        MapClient::traffic_flow(self, lat, lng, options).await
    }

    async fn traffic_incidents(
        &self,
        bounds: BoundingBox,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        options: &IncidentOptions,
    ) -> Result<IncidentResponse> {
        MapClient::traffic_incidents(self, bounds, start, end, options).await
    }

    async fn calculate_route(
        &self,
        origin: LatLng,
        destination: LatLng,
        options: &RouteOptions,
    ) -> Result<RouteResult> {
        MapClient::calculate_route(self, origin, destination, options).await
    }

    async fn fallback_route(
        &self,
        origin: LatLng,
        destination: LatLng,
        options: &RouteOptions,
    ) -> Result<RouteResult> {
        MapClient::fallback_route(self, origin, destination, options).await
    }

    fn tile_url_template(&self, style: MapStyle) -> Result<String> {
        MapClient::tile_url_template(self, style)
    }
}

/// Key arguments shared by the place-search operations.
fn search_key(operation: Operation, options: &SearchOptions) -> CacheKeyBuilder {
    let mut key = CacheKey::builder(operation)
        .opt("limit", options.limit)
        .opt("radius", options.radius_meters)
        .opt_text("country", options.country.as_deref())
        .opt_text("language", options.language.as_deref());
    if let Some(center) = options.center {
        key = key.point("center_lat", "center_lng", center);
    }
    if options.typeahead {
        key = key.raw("typeahead", true);
    }
    key
}

fn reason_for(error: &WaypostError) -> FallbackReason {
    match error {
        WaypostError::Http(_) | WaypostError::Timeout => FallbackReason::Network,
        _ => FallbackReason::ProviderError,
    }
}

fn count_fallback(operation: Operation, reason: FallbackReason) {
    metrics::counter!(telemetry::FALLBACKS_TOTAL,
        "operation" => operation.as_str(),
        "reason" => reason.as_str(),
    )
    .increment(1);
}

fn check_cancelled(cancel: Option<&CancellationToken>) -> Result<()> {
    if cancel.is_some_and(CancellationToken::is_cancelled) {
        return Err(WaypostError::Cancelled);
    }
    Ok(())
}

/// Race `fut` against the token; cancellation wins ties.
async fn cancellable<T>(
    cancel: Option<&CancellationToken>,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    match cancel {
        Some(token) => tokio::select! {
            biased;
            _ = token.cancelled() => Err(WaypostError::Cancelled),
            result = fut => result,
        },
        None => fut.await,
    }
}
