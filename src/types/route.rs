//! Route results

use serde::{Deserialize, Serialize};

/// A point along a route geometry (`{latitude, longitude}` on the wire).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoutePoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl RoutePoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteSummary {
    pub length_in_meters: f64,
    pub travel_time_in_seconds: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RouteLeg {
    pub points: Vec<RoutePoint>,
}

/// Canonical route, regardless of which routing service produced it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RouteResult {
    pub summary: RouteSummary,
    pub legs: Vec<RouteLeg>,
}

impl RouteResult {
    /// Every point of every leg, in order.
    pub fn points(&self) -> impl Iterator<Item = &RoutePoint> {
        self.legs.iter().flat_map(|leg| leg.points.iter())
    }
}
