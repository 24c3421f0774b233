//! OSRM client, the routing fallback (driving profile).

use async_trait::async_trait;
use reqwest::{Client, Url};

use super::http::{self, build_client, endpoint, get_json, parse_base_url};
use super::traits::RouteProvider;
use crate::Result;
use crate::cache::Operation;
use crate::convert::osrm as convert;
use crate::types::{LatLng, RouteOptions, RouteResult};

pub const DEFAULT_BASE_URL: &str = "https://router.project-osrm.org";

const NAME: &str = "osrm";

#[derive(Debug, Clone)]
pub struct OsrmClient {
    http: Client,
    base_url: Url,
}

impl OsrmClient {
    pub fn new() -> Result<Self> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Create a client with a custom base URL (for testing with wiremock).
    pub fn with_base_url(base_url: &str) -> Result<Self> {
        Ok(Self {
            http: build_client(http::DEFAULT_TIMEOUT)?,
            base_url: parse_base_url(base_url)?,
        })
    }

    pub fn http_client(mut self, http: Client) -> Self {
        self.http = http;
        self
    }
}

#[async_trait]
impl RouteProvider for OsrmClient {
    fn name(&self) -> &str {
        NAME
    }

    /// Travel mode and route type are ignored: the public server only runs
    /// the driving profile.
    async fn calculate_route(
        &self,
        origin: LatLng,
        destination: LatLng,
        _options: &RouteOptions,
    ) -> Result<RouteResult> {
        let coordinates = format!(
            "{},{};{},{}",
            origin.lng, origin.lat, destination.lng, destination.lat
        );
        let url = endpoint(&self.base_url, &["route", "v1", "driving", &coordinates])?;
        let request = self
            .http
            .get(url)
            .query(&[("overview", "full"), ("geometries", "geojson")]);
        let body = get_json(request, NAME, Operation::Route.as_str()).await?;
        convert::route(body)
    }
}
