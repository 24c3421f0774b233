//! Core MapGateway trait

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::types::{
    BoundingBox, FlowOptions, FlowResult, GeocodeOptions, GeocodeResponse, IncidentOptions,
    IncidentResponse, LatLng, MapStyle, RouteOptions, RouteResult, SearchOptions, SearchResponse,
};
use crate::{Result, WaypostError};

/// The map operations callers depend on.
///
/// [`MapClient`](crate::MapClient) is the production implementation; the
/// trait exists so dashboards can hold an `Arc<dyn MapGateway>` and swap in
/// a fake in their own tests.
#[async_trait]
pub trait MapGateway: Send + Sync {
    // ===== Geocoding =====

    async fn geocode(&self, query: &str, options: &GeocodeOptions) -> Result<GeocodeResponse>;

    async fn reverse_geocode(
        &self,
        lat: f64,
        lng: f64,
        options: &GeocodeOptions,
    ) -> Result<GeocodeResponse>;

    // ===== Places =====

    async fn search_places(&self, query: &str, options: &SearchOptions) -> Result<SearchResponse>;

    async fn autocomplete_places(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<SearchResponse>;

    async fn place_details(&self, lat: f64, lng: f64, options: &SearchOptions)
    -> Result<SearchResponse>;

    async fn search_poi_by_category(
        &self,
        category: &str,
        lat: f64,
        lng: f64,
        options: &SearchOptions,
    ) -> Result<SearchResponse>;

    // ===== Traffic =====

    async fn traffic_flow(&self, lat: f64, lng: f64, options: &FlowOptions) -> Result<FlowResult>;

    async fn traffic_incidents(
        &self,
        bounds: BoundingBox,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        options: &IncidentOptions,
    ) -> Result<IncidentResponse>;

    // ===== Routing =====

    async fn calculate_route(
        &self,
        origin: LatLng,
        destination: LatLng,
        options: &RouteOptions,
    ) -> Result<RouteResult>;

    /// Route with the open routing service only.
    async fn fallback_route(
        &self,
        _origin: LatLng,
        _destination: LatLng,
        _options: &RouteOptions,
    ) -> Result<RouteResult> {
        Err(WaypostError::NotImplemented("fallback_route"))
    }

    // ===== Tiles =====

    fn tile_url_template(&self, _style: MapStyle) -> Result<String> {
        Err(WaypostError::NotImplemented("tile_url_template"))
    }
}
