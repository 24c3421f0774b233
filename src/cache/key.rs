//! Structured cache keys.
//!
//! A [`CacheKey`] is the operation plus a canonicalised argument list. Keys
//! compare and hash structurally, so two calls with the same arguments map to
//! the same entry no matter how the caller built its options.
//!
//! Canonicalisation:
//! - text is trimmed and lowercased;
//! - coordinates are fixed to 6 decimals (~0.1 m), which also makes them
//!   hashable;
//! - arguments are sorted by name, so insertion order does not matter.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::LatLng;

/// Every cacheable map operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Geocode,
    ReverseGeocode,
    TrafficFlow,
    Route,
    SearchPlaces,
    Autocomplete,
    PlaceDetails,
    PoiCategory,
    TrafficIncidents,
}

impl Operation {
    pub const ALL: [Operation; 9] = [
        Operation::Geocode,
        Operation::ReverseGeocode,
        Operation::TrafficFlow,
        Operation::Route,
        Operation::SearchPlaces,
        Operation::Autocomplete,
        Operation::PlaceDetails,
        Operation::PoiCategory,
        Operation::TrafficIncidents,
    ];

    /// Label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Geocode => "geocode",
            Self::ReverseGeocode => "reverse_geocode",
            Self::TrafficFlow => "traffic_flow",
            Self::Route => "route",
            Self::SearchPlaces => "search_places",
            Self::Autocomplete => "autocomplete",
            Self::PlaceDetails => "place_details",
            Self::PoiCategory => "poi_category",
            Self::TrafficIncidents => "traffic_incidents",
        }
    }

    /// Default response TTL for this operation.
    pub fn default_ttl(&self) -> Duration {
        const MINUTE: u64 = 60;
        const HOUR: u64 = 60 * MINUTE;
        let secs = match self {
            Self::Autocomplete => 5 * MINUTE,
            Self::TrafficFlow => 5 * MINUTE,
            Self::Route => 30 * MINUTE,
            Self::SearchPlaces | Self::PoiCategory => HOUR,
            Self::Geocode | Self::ReverseGeocode | Self::PlaceDetails => 6 * HOUR,
            Self::TrafficIncidents => 24 * HOUR,
        };
        Duration::from_secs(secs)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured key shared by the response and failure caches.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    operation: Operation,
    args: Vec<(&'static str, String)>,
}

impl CacheKey {
    /// Start a key; finish with [`build`](Self::build).
    pub fn builder(operation: Operation) -> CacheKeyBuilder {
        CacheKeyBuilder {
            operation,
            args: Vec::new(),
        }
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    /// Canonical arguments, sorted by name.
    pub fn args(&self) -> &[(&'static str, String)] {
        &self.args
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.operation)?;
        for (i, (name, value)) in self.args.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name}={value}")?;
        }
        f.write_str(")")
    }
}

/// Accumulates canonicalised arguments.
#[derive(Debug)]
pub struct CacheKeyBuilder {
    operation: Operation,
    args: Vec<(&'static str, String)>,
}

impl CacheKeyBuilder {
    /// Free text: trimmed, lowercased, inner whitespace collapsed.
    pub fn text(mut self, name: &'static str, value: &str) -> Self {
        let normalized = value
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();
        self.args.push((name, normalized));
        self
    }

    /// Identifier-like value, kept verbatim.
    pub fn raw(mut self, name: &'static str, value: impl fmt::Display) -> Self {
        self.args.push((name, value.to_string()));
        self
    }

    pub fn coord(mut self, name: &'static str, value: f64) -> Self {
        self.args.push((name, format!("{value:.6}")));
        self
    }

    pub fn point(self, lat_name: &'static str, lng_name: &'static str, point: LatLng) -> Self {
        self.coord(lat_name, point.lat).coord(lng_name, point.lng)
    }

    /// Skip `None` values entirely so "unset" and "absent" share a key.
    pub fn opt<T: fmt::Display>(self, name: &'static str, value: Option<T>) -> Self {
        match value {
            Some(v) => self.raw(name, v),
            None => self,
        }
    }

    pub fn opt_text(self, name: &'static str, value: Option<&str>) -> Self {
        match value {
            Some(v) => self.text(name, v),
            None => self,
        }
    }

    pub fn build(mut self) -> CacheKey {
        self.args.sort_by(|a, b| a.0.cmp(b.0));
        CacheKey {
            operation: self.operation,
            args: self.args,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_deterministic() {
        let k1 = CacheKey::builder(Operation::Geocode)
            .text("query", "SM Southmall")
            .build();
        let k2 = CacheKey::builder(Operation::Geocode)
            .text("query", "SM Southmall")
            .build();
        assert_eq!(k1, k2);
    }

    #[test]
    fn key_differs_on_operation() {
        let k1 = CacheKey::builder(Operation::SearchPlaces)
            .text("query", "mall")
            .build();
        let k2 = CacheKey::builder(Operation::Autocomplete)
            .text("query", "mall")
            .build();
        assert_ne!(k1, k2);
    }

    #[test]
    fn text_is_normalized() {
        let k1 = CacheKey::builder(Operation::Geocode)
            .text("query", "  SM   Southmall ")
            .build();
        let k2 = CacheKey::builder(Operation::Geocode)
            .text("query", "sm southmall")
            .build();
        assert_eq!(k1, k2);
    }

    #[test]
    fn argument_order_is_irrelevant() {
        let k1 = CacheKey::builder(Operation::SearchPlaces)
            .text("query", "cafe")
            .raw("limit", 5)
            .build();
        let k2 = CacheKey::builder(Operation::SearchPlaces)
            .raw("limit", 5)
            .text("query", "cafe")
            .build();
        assert_eq!(k1, k2);
    }

    #[test]
    fn coordinates_round_to_six_decimals() {
        let k1 = CacheKey::builder(Operation::ReverseGeocode)
            .point("lat", "lng", LatLng::new(14.599_512_1, 120.984_222_4))
            .build();
        let k2 = CacheKey::builder(Operation::ReverseGeocode)
            .point("lat", "lng", LatLng::new(14.599_512_4, 120.984_221_9))
            .build();
        assert_eq!(k1, k2);
    }

    #[test]
    fn none_and_absent_share_a_key() {
        let k1 = CacheKey::builder(Operation::Geocode)
            .text("query", "x")
            .opt::<u32>("limit", None)
            .build();
        let k2 = CacheKey::builder(Operation::Geocode).text("query", "x").build();
        assert_eq!(k1, k2);
    }

    #[test]
    fn display_is_readable() {
        let key = CacheKey::builder(Operation::Geocode)
            .text("query", "Makati")
            .raw("limit", 3)
            .build();
        assert_eq!(key.to_string(), "geocode(limit=3, query=makati)");
    }

    #[test]
    fn ttl_ordering() {
        assert!(Operation::Autocomplete.default_ttl() < Operation::Geocode.default_ttl());
        assert_eq!(
            Operation::TrafficIncidents.default_ttl(),
            Duration::from_secs(86_400)
        );
    }
}
