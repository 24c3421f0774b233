//! Geoapify client, the fallback for place search and POI lookups.
//!
//! See: <https://apidocs.geoapify.com/>

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Url};

use super::http::{self, build_client, endpoint, get_json, parse_base_url};
use super::traits::PlaceProvider;
use crate::Result;
use crate::cache::Operation;
use crate::convert::geoapify as convert;
use crate::types::{LatLng, SearchOptions, SearchResponse};

/// Default base URL for the Geoapify APIs.
pub const DEFAULT_BASE_URL: &str = "https://api.geoapify.com";

/// Queries this short go to the autocomplete endpoint, which handles
/// partial words better than full-text search.
const SHORT_QUERY_CHARS: usize = 3;

const CATEGORY_RADIUS_METERS: u32 = 2_000;

const NAME: &str = "geoapify";

/// Client for the Geoapify geocoding and places APIs.
#[derive(Clone)]
pub struct GeoapifyClient {
    api_key: String,
    http: Client,
    base_url: Url,
    country_code: Option<String>,
}

impl std::fmt::Debug for GeoapifyClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeoapifyClient")
            .field("base_url", &self.base_url.as_str())
            .field("country_code", &self.country_code)
            .finish_non_exhaustive()
    }
}

impl GeoapifyClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    /// Create a client with a custom base URL (for testing with wiremock).
    pub fn with_base_url(api_key: impl Into<String>, base_url: &str) -> Result<Self> {
        Ok(Self {
            api_key: api_key.into(),
            http: build_client(http::DEFAULT_TIMEOUT)?,
            base_url: parse_base_url(base_url)?,
            country_code: Some("ph".to_string()),
        })
    }

    pub fn http_client(mut self, http: Client) -> Self {
        self.http = http;
        self
    }

    /// Country filter (`filter=countrycode:…`). `None` searches worldwide.
    pub fn country_code(mut self, country: Option<String>) -> Self {
        self.country_code = country.map(|c| c.to_lowercase());
        self
    }

    fn get(&self, segments: &[&str]) -> Result<RequestBuilder> {
        let url = endpoint(&self.base_url, segments)?;
        Ok(self.http.get(url).query(&[("apiKey", self.api_key.as_str())]))
    }

    fn geocode_request(
        &self,
        endpoint_name: &str,
        text: &str,
        options: &SearchOptions,
    ) -> Result<RequestBuilder> {
        let mut request = self
            .get(&["v1", "geocode", endpoint_name])?
            .query(&[("text", text), ("format", "json")]);
        let country = options
            .country
            .as_deref()
            .map(str::to_lowercase)
            .or_else(|| self.country_code.clone());
        if let Some(country) = country {
            request = request.query(&[("filter", format!("countrycode:{country}"))]);
        }
        if let Some(center) = options.center {
            request = request.query(&[("bias", proximity(center))]);
        }
        if let Some(limit) = options.limit {
            request = request.query(&[("limit", limit)]);
        }
        if let Some(language) = options.language.as_deref() {
            request = request.query(&[("lang", language)]);
        }
        Ok(request)
    }
}

fn proximity(point: LatLng) -> String {
    format!("proximity:{},{}", point.lng, point.lat)
}

#[async_trait]
impl PlaceProvider for GeoapifyClient {
    fn name(&self) -> &str {
        NAME
    }

    /// Full-text search. Short queries and typeahead requests use the
    /// autocomplete endpoint instead.
    async fn search_places(&self, query: &str, options: &SearchOptions) -> Result<SearchResponse> {
        if options.typeahead || query.trim().chars().count() <= SHORT_QUERY_CHARS {
            return self.autocomplete_places(query, options).await;
        }
        let request = self.geocode_request("search", query, options)?;
        let body = get_json(request, NAME, Operation::SearchPlaces.as_str()).await?;
        Ok(convert::results(body))
    }

    async fn autocomplete_places(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<SearchResponse> {
        let request = self.geocode_request("autocomplete", query, options)?;
        let body = get_json(request, NAME, Operation::Autocomplete.as_str()).await?;
        Ok(convert::results(body))
    }

    async fn place_details(&self, point: LatLng, _options: &SearchOptions) -> Result<SearchResponse> {
        let request = self
            .get(&["v2", "place-details"])?
            .query(&[("lat", point.lat), ("lon", point.lng)]);
        let body = get_json(request, NAME, Operation::PlaceDetails.as_str()).await?;
        Ok(convert::features(body))
    }

    async fn search_poi_by_category(
        &self,
        category: &str,
        point: LatLng,
        options: &SearchOptions,
    ) -> Result<SearchResponse> {
        let radius = options.radius_meters.unwrap_or(CATEGORY_RADIUS_METERS);
        let mut request = self.get(&["v2", "places"])?.query(&[
            ("categories", category.to_string()),
            ("filter", format!("circle:{},{},{radius}", point.lng, point.lat)),
            ("bias", proximity(point)),
        ]);
        if let Some(limit) = options.limit {
            request = request.query(&[("limit", limit)]);
        }
        let body = get_json(request, NAME, Operation::PoiCategory.as_str()).await?;
        Ok(convert::features(body))
    }
}
