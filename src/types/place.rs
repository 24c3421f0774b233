//! Geocoding and place-search results

use serde::{Deserialize, Serialize};

use super::geo::Position;

/// Canonical postal address. Every provider fills what it knows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    #[serde(default)]
    pub freeform_address: String,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub municipality: Option<String>,
    #[serde(default)]
    pub street_name: Option<String>,
    #[serde(default)]
    pub street_number: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
}

/// A position with its address.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PositionResult {
    pub position: Position,
    pub address: Address,
}

/// Result of `geocode` and `reverse_geocode`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeocodeResponse {
    pub results: Vec<PositionResult>,
}

impl GeocodeResponse {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Best match, if any.
    pub fn first(&self) -> Option<&PositionResult> {
        self.results.first()
    }
}

/// Point-of-interest details attached to a place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Poi {
    pub name: String,
    #[serde(default)]
    pub categories: Vec<String>,
}

/// A place returned by search, autocomplete, nearby or category lookups.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaceResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poi: Option<Poi>,
    pub position: Position,
    pub address: Address,
    /// Distance from the bias point in meters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dist: Option<f64>,
}

/// Result of every place-search style operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<PlaceResult>,
}

impl SearchResponse {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}
