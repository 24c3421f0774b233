//! TomTom client, the primary provider.
//!
//! Covers the Search, Routing and Traffic APIs plus map tile URLs.
//! See: <https://developer.tomtom.com/>
//!
//! The API key travels in the `key` query parameter on every call.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, Url};

use super::http::{self, build_client, endpoint, get_json, parse_base_url};
use super::traits::{GeocodeProvider, PlaceProvider, RouteProvider, TrafficProvider};
use crate::Result;
use crate::cache::Operation;
use crate::convert::tomtom as convert;
use crate::types::{
    BoundingBox, FlowOptions, FlowResult, GeocodeOptions, GeocodeResponse, IncidentOptions,
    IncidentResponse, LatLng, MapStyle, RouteOptions, RouteResult, SearchOptions,
    SearchResponse,
};

/// Default base URL for the TomTom APIs.
pub const DEFAULT_BASE_URL: &str = "https://api.tomtom.com";

/// Default radius for `nearbySearch` place details, in meters.
const DETAILS_RADIUS_METERS: u32 = 50;

/// Default radius for category searches, in meters.
const CATEGORY_RADIUS_METERS: u32 = 2_000;

/// Field projection for incident details (v5 requires one to get geometry
/// and events).
const INCIDENT_FIELDS: &str = "{incidents{type,geometry{type,coordinates},properties{id,iconCategory,magnitudeOfDelay,events{description,code,iconCategory},startTime,endTime,from,to,length,delay}}}";

const NAME: &str = "tomtom";

/// Client for the TomTom REST APIs.
#[derive(Clone)]
pub struct TomTomClient {
    api_key: String,
    http: Client,
    base_url: Url,
    country_set: Option<String>,
    language: Option<String>,
}

impl std::fmt::Debug for TomTomClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TomTomClient")
            .field("base_url", &self.base_url.as_str())
            .field("country_set", &self.country_set)
            .field("language", &self.language)
            .finish_non_exhaustive()
    }
}

impl TomTomClient {
    /// Create a client against the public TomTom endpoint.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    /// Create a client with a custom base URL (for testing with wiremock).
    pub fn with_base_url(api_key: impl Into<String>, base_url: &str) -> Result<Self> {
        Ok(Self {
            api_key: api_key.into(),
            http: build_client(http::DEFAULT_TIMEOUT)?,
            base_url: parse_base_url(base_url)?,
            country_set: Some("PH".to_string()),
            language: None,
        })
    }

    /// Replace the HTTP client (shared pool, custom timeout).
    pub fn http_client(mut self, http: Client) -> Self {
        self.http = http;
        self
    }

    /// Default country restriction for search/geocode (`countrySet`).
    /// `None` searches worldwide.
    pub fn country_set(mut self, country: Option<String>) -> Self {
        self.country_set = country;
        self
    }

    /// Default response language (IETF tag, e.g. `en-US`).
    pub fn language(mut self, language: Option<String>) -> Self {
        self.language = language;
        self
    }

    /// Raster tile URL template for `style`, with `{z}/{x}/{y}`
    /// placeholders. Render it with [`render_tile_url`](crate::types::render_tile_url).
    pub fn tile_url_template(&self, style: MapStyle) -> String {
        let base = self.base_url.as_str().trim_end_matches('/');
        format!(
            "{base}/map/1/tile/{}/{{z}}/{{x}}/{{y}}.png?key={}",
            style.tile_path(),
            self.api_key
        )
    }

    fn get(&self, segments: &[&str]) -> Result<RequestBuilder> {
        let url = endpoint(&self.base_url, segments)?;
        Ok(self.http.get(url).query(&[("key", self.api_key.as_str())]))
    }

    fn localized(
        &self,
        request: RequestBuilder,
        country: Option<&str>,
        language: Option<&str>,
    ) -> RequestBuilder {
        let request = match country.or(self.country_set.as_deref()) {
            Some(c) => request.query(&[("countrySet", c)]),
            None => request,
        };
        match language.or(self.language.as_deref()) {
            Some(l) => request.query(&[("language", l)]),
            None => request,
        }
    }

    fn search_request(
        &self,
        query: &str,
        options: &SearchOptions,
        typeahead: bool,
    ) -> Result<RequestBuilder> {
        let segment = format!("{query}.json");
        let mut request = self.get(&["search", "2", "search", &segment])?;
        request = self.localized(
            request,
            options.country.as_deref(),
            options.language.as_deref(),
        );
        if let Some(limit) = options.limit {
            request = request.query(&[("limit", limit)]);
        }
        if let Some(center) = options.center {
            request = request.query(&[("lat", center.lat), ("lon", center.lng)]);
            if let Some(radius) = options.radius_meters {
                request = request.query(&[("radius", radius)]);
            }
        }
        if typeahead {
            request = request.query(&[("typeahead", "true")]);
        }
        Ok(request)
    }
}

// ============================================================================
// Provider Trait Implementations
// ============================================================================

#[async_trait]
impl GeocodeProvider for TomTomClient {
    fn name(&self) -> &str {
        NAME
    }

    async fn geocode(&self, query: &str, options: &GeocodeOptions) -> Result<GeocodeResponse> {
        let segment = format!("{query}.json");
        let mut request = self.get(&["search", "2", "geocode", &segment])?;
        request = self.localized(
            request,
            options.country.as_deref(),
            options.language.as_deref(),
        );
        if let Some(limit) = options.limit {
            request = request.query(&[("limit", limit)]);
        }
        let body = get_json(request, NAME, Operation::Geocode.as_str()).await?;
        Ok(convert::geocode(body))
    }

    async fn reverse_geocode(
        &self,
        point: LatLng,
        options: &GeocodeOptions,
    ) -> Result<GeocodeResponse> {
        let segment = format!("{},{}.json", point.lat, point.lng);
        let mut request = self.get(&["search", "2", "reverseGeocode", &segment])?;
        if let Some(language) = options.language.as_deref().or(self.language.as_deref()) {
            request = request.query(&[("language", language)]);
        }
        let body = get_json(request, NAME, Operation::ReverseGeocode.as_str()).await?;
        Ok(convert::reverse_geocode(body))
    }
}

#[async_trait]
impl PlaceProvider for TomTomClient {
    fn name(&self) -> &str {
        NAME
    }

    async fn search_places(&self, query: &str, options: &SearchOptions) -> Result<SearchResponse> {
        let request = self.search_request(query, options, options.typeahead)?;
        let body = get_json(request, NAME, Operation::SearchPlaces.as_str()).await?;
        Ok(convert::places(body))
    }

    async fn autocomplete_places(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<SearchResponse> {
        let request = self.search_request(query, options, true)?;
        let body = get_json(request, NAME, Operation::Autocomplete.as_str()).await?;
        Ok(convert::places(body))
    }

    async fn place_details(&self, point: LatLng, options: &SearchOptions) -> Result<SearchResponse> {
        let radius = options.radius_meters.unwrap_or(DETAILS_RADIUS_METERS);
        let mut request = self
            .get(&["search", "2", "nearbySearch", ".json"])?
            .query(&[("lat", point.lat), ("lon", point.lng)])
            .query(&[("radius", radius), ("limit", options.limit.unwrap_or(1))]);
        if let Some(language) = options.language.as_deref().or(self.language.as_deref()) {
            request = request.query(&[("language", language)]);
        }
        let body = get_json(request, NAME, Operation::PlaceDetails.as_str()).await?;
        Ok(convert::places(body))
    }

    async fn search_poi_by_category(
        &self,
        category: &str,
        point: LatLng,
        options: &SearchOptions,
    ) -> Result<SearchResponse> {
        let segment = format!("{category}.json");
        let radius = options.radius_meters.unwrap_or(CATEGORY_RADIUS_METERS);
        let mut request = self
            .get(&["search", "2", "categorySearch", &segment])?
            .query(&[("lat", point.lat), ("lon", point.lng)])
            .query(&[("radius", radius)]);
        request = self.localized(
            request,
            options.country.as_deref(),
            options.language.as_deref(),
        );
        if let Some(limit) = options.limit {
            request = request.query(&[("limit", limit)]);
        }
        let body = get_json(request, NAME, Operation::PoiCategory.as_str()).await?;
        Ok(convert::places(body))
    }
}

#[async_trait]
impl RouteProvider for TomTomClient {
    fn name(&self) -> &str {
        NAME
    }

    async fn calculate_route(
        &self,
        origin: LatLng,
        destination: LatLng,
        options: &RouteOptions,
    ) -> Result<RouteResult> {
        let locations = format!(
            "{},{}:{},{}",
            origin.lat, origin.lng, destination.lat, destination.lng
        );
        let request = self
            .get(&["routing", "1", "calculateRoute", &locations, "json"])?
            .query(&[
                ("travelMode", options.travel_mode.as_str()),
                ("routeType", options.route_type.as_str()),
                ("traffic", if options.traffic { "true" } else { "false" }),
            ]);
        let body = get_json(request, NAME, Operation::Route.as_str()).await?;
        convert::route(body)
    }
}

#[async_trait]
impl TrafficProvider for TomTomClient {
    fn name(&self) -> &str {
        NAME
    }

    async fn traffic_flow(&self, point: LatLng, options: &FlowOptions) -> Result<FlowResult> {
        let zoom = options.zoom.to_string();
        let request = self
            .get(&[
                "traffic",
                "services",
                "4",
                "flowSegmentData",
                "absolute",
                &zoom,
                "json",
            ])?
            .query(&[("point", format!("{},{}", point.lat, point.lng))])
            .query(&[("unit", "KMPH")]);
        let body = get_json(request, NAME, Operation::TrafficFlow.as_str()).await?;
        convert::flow(body)
    }

    /// Incident Details v5 takes no time range: it returns what TomTom
    /// currently knows for the box. `[start, end]` never reaches the wire
    /// and only filters the answer afterwards. The dispatcher has already
    /// clamped it so that it never extends into the future.
    async fn traffic_incidents(
        &self,
        bounds: BoundingBox,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        options: &IncidentOptions,
    ) -> Result<IncidentResponse> {
        let mut request = self
            .get(&["traffic", "services", "5", "incidentDetails"])?
            .query(&[
                ("bbox", bounds.to_lon_lat_string().as_str()),
                ("fields", INCIDENT_FIELDS),
            ]);
        if let Some(language) = options.language.as_deref().or(self.language.as_deref()) {
            request = request.query(&[("language", language)]);
        }
        let body = get_json(request, NAME, Operation::TrafficIncidents.as_str()).await?;
        Ok(convert::within_window(convert::incidents(body), start, end))
    }
}
