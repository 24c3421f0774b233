//! Backend proxy client, the traffic-flow fallback.
//!
//! The dashboard backend aggregates recent speed reports around a point at
//! `/api/traffic/nearby`.

use async_trait::async_trait;
use reqwest::{Client, Url};

use super::http::{self, build_client, endpoint, get_json, parse_base_url};
use super::traits::TrafficProvider;
use crate::Result;
use crate::cache::Operation;
use crate::convert::backend as convert;
use crate::types::{FlowOptions, FlowResult, LatLng};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

const NAME: &str = "backend";

#[derive(Debug, Clone)]
pub struct BackendClient {
    http: Client,
    base_url: Url,
}

impl BackendClient {
    pub fn new(base_url: &str) -> Result<Self> {
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
impl TrafficProvider for BackendClient {
    fn name(&self) -> &str {
        NAME
    }

    async fn traffic_flow(&self, point: LatLng, options: &FlowOptions) -> Result<FlowResult> {
        let url = endpoint(&self.base_url, &["api", "traffic", "nearby"])?;
        let request = self
            .http
            .get(url)
            .query(&[("lat", point.lat), ("lng", point.lng)])
            .query(&[("radius", options.radius_meters)]);
        let body = get_json(request, NAME, Operation::TrafficFlow.as_str()).await?;
        convert::flow(body)
    }
}
