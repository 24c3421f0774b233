//! Nominatim (OpenStreetMap) client, the geocoding fallback.
//!
//! Nominatim's usage policy requires an identifying User-Agent, which the
//! shared HTTP client sets. Results are restricted with `countrycodes`.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Url};

use super::http::{self, build_client, endpoint, get_json, parse_base_url};
use super::traits::GeocodeProvider;
use crate::Result;
use crate::cache::Operation;
use crate::convert::nominatim as convert;
use crate::types::{GeocodeOptions, GeocodeResponse, LatLng};

pub const DEFAULT_BASE_URL: &str = "https://nominatim.openstreetmap.org";

const NAME: &str = "nominatim";

#[derive(Debug, Clone)]
pub struct NominatimClient {
    http: Client,
    base_url: Url,
    country_codes: Option<String>,
}

impl NominatimClient {
    pub fn new() -> Result<Self> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Create a client with a custom base URL (for testing with wiremock).
    pub fn with_base_url(base_url: &str) -> Result<Self> {
        Ok(Self {
            http: build_client(http::DEFAULT_TIMEOUT)?,
            base_url: parse_base_url(base_url)?,
            country_codes: Some("ph".to_string()),
        })
    }

    pub fn http_client(mut self, http: Client) -> Self {
        self.http = http;
        self
    }

    /// Comma-separated ISO alpha-2 codes. `None` searches worldwide.
    pub fn country_codes(mut self, codes: Option<String>) -> Self {
        self.country_codes = codes.map(|c| c.to_lowercase());
        self
    }

    fn get(&self, path: &str, options: &GeocodeOptions) -> Result<RequestBuilder> {
        let url = endpoint(&self.base_url, &[path])?;
        let mut request = self
            .http
            .get(url)
            .query(&[("format", "jsonv2"), ("addressdetails", "1")]);
        if let Some(language) = options.language.as_deref() {
            request = request.query(&[("accept-language", language)]);
        }
        Ok(request)
    }
}

#[async_trait]
impl GeocodeProvider for NominatimClient {
    fn name(&self) -> &str {
        NAME
    }

    async fn geocode(&self, query: &str, options: &GeocodeOptions) -> Result<GeocodeResponse> {
        let mut request = self.get("search", options)?.query(&[("q", query)]);
        let codes = options
            .country
            .as_deref()
            .map(str::to_lowercase)
            .or_else(|| self.country_codes.clone());
        if let Some(codes) = codes {
            request = request.query(&[("countrycodes", codes)]);
        }
        if let Some(limit) = options.limit {
            request = request.query(&[("limit", limit)]);
        }
        let body = get_json(request, NAME, Operation::Geocode.as_str()).await?;
        Ok(convert::search(body))
    }

    async fn reverse_geocode(
        &self,
        point: LatLng,
        options: &GeocodeOptions,
    ) -> Result<GeocodeResponse> {
        let request = self
            .get("reverse", options)?
            .query(&[("lat", point.lat), ("lon", point.lng)]);
        let body = get_json(request, NAME, Operation::ReverseGeocode.as_str()).await?;
        Ok(convert::reverse(body))
    }
}
