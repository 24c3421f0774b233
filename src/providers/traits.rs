//! Provider traits for capability-specific implementations.
//!
//! Providers implement capability-specific traits (`GeocodeProvider`,
//! `PlaceProvider`, `RouteProvider`, `TrafficProvider`) rather than a single
//! "god trait". The primary vendor implements all four; each fallback vendor
//! implements only what it can answer.
//!
//! Methods a vendor does not support keep the default body, which returns
//! [`WaypostError::NotImplemented`]. The dispatcher treats that like any
//! other fallback failure and answers with the operation's neutral value.
//!
//! # Example
//!
//! ```ignore
//! #[async_trait]
//! impl RouteProvider for MyRouter {
//!     fn name(&self) -> &str { "my-router" }
//!
//!     async fn calculate_route(&self, origin: LatLng, destination: LatLng, _: &RouteOptions)
//!         -> Result<RouteResult>
//!     {
//!         // ... call the service and normalize
//!     }
//! }
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::types::{
    BoundingBox, FlowOptions, FlowResult, GeocodeOptions, GeocodeResponse, IncidentOptions,
    IncidentResponse, LatLng, RouteOptions, RouteResult, SearchOptions, SearchResponse,
};
use crate::{Result, WaypostError};

// ============================================================================
// Geocode Provider
// ============================================================================

/// Forward and reverse geocoding.
#[async_trait]
pub trait GeocodeProvider: Send + Sync {
    /// Provider name for logging/metrics.
    fn name(&self) -> &str;

    /// Free-text address → positions.
    async fn geocode(&self, query: &str, options: &GeocodeOptions) -> Result<GeocodeResponse>;

    /// Coordinates → addresses.
    async fn reverse_geocode(
        &self,
        _point: LatLng,
        _options: &GeocodeOptions,
    ) -> Result<GeocodeResponse> {
        Err(WaypostError::NotImplemented("reverse_geocode"))
    }
}

// ============================================================================
// Place Provider
// ============================================================================

/// Place search, autocomplete, nearby details and category lookups.
#[async_trait]
pub trait PlaceProvider: Send + Sync {
    /// Provider name for logging/metrics.
    fn name(&self) -> &str;

    async fn search_places(&self, query: &str, options: &SearchOptions) -> Result<SearchResponse>;

    async fn autocomplete_places(
        &self,
        _query: &str,
        _options: &SearchOptions,
    ) -> Result<SearchResponse> {
        Err(WaypostError::NotImplemented("autocomplete_places"))
    }

    /// Places at or nearest to a point.
    async fn place_details(
        &self,
        _point: LatLng,
        _options: &SearchOptions,
    ) -> Result<SearchResponse> {
        Err(WaypostError::NotImplemented("place_details"))
    }

    /// Points of interest of one category around a point.
    async fn search_poi_by_category(
        &self,
        _category: &str,
        _point: LatLng,
        _options: &SearchOptions,
    ) -> Result<SearchResponse> {
        Err(WaypostError::NotImplemented("search_poi_by_category"))
    }
}

// ============================================================================
// Route Provider
// ============================================================================

/// Point-to-point routing.
#[async_trait]
pub trait RouteProvider: Send + Sync {
    /// Provider name for logging/metrics.
    fn name(&self) -> &str;

    async fn calculate_route(
        &self,
        origin: LatLng,
        destination: LatLng,
        options: &RouteOptions,
    ) -> Result<RouteResult>;
}

// ============================================================================
// Traffic Provider
// ============================================================================

/// Traffic flow and incidents.
#[async_trait]
pub trait TrafficProvider: Send + Sync {
    /// Provider name for logging/metrics.
    fn name(&self) -> &str;

    /// Speed estimate for the road segment nearest `point`.
    async fn traffic_flow(&self, point: LatLng, options: &FlowOptions) -> Result<FlowResult>;

    /// Incidents inside `bounds` active during `[start, end]`.
    ///
    /// Inputs are already validated by the caller.
    async fn traffic_incidents(
        &self,
        _bounds: BoundingBox,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
        _options: &IncidentOptions,
    ) -> Result<IncidentResponse> {
        Err(WaypostError::NotImplemented("traffic_incidents"))
    }
}

// ============================================================================
// Tests
// ============================================================================
