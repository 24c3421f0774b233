//! OSRM `route/v1` wire format (`geometries=geojson`).

use serde::Deserialize;

use crate::types::{RouteLeg, RoutePoint, RouteResult, RouteSummary};
use crate::{Result, WaypostError};

#[derive(Debug, Deserialize)]
pub struct RouteBody {
    code: String,
    message: Option<String>,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    /// meters
    distance: f64,
    /// seconds
    duration: f64,
    geometry: OsrmGeometry,
}

#[derive(Debug, Deserialize)]
struct OsrmGeometry {
    /// `[lng, lat]` pairs.
    coordinates: Vec<[f64; 2]>,
}

/// Convert the first OSRM route into the canonical single-leg route.
pub fn route(body: RouteBody) -> Result<RouteResult> {
    if body.code != "Ok" {
        let message = body.message.unwrap_or_else(|| body.code.clone());
        return Err(WaypostError::DataError(format!("OSRM: {message}")));
    }
    let first = body
        .routes
        .into_iter()
        .next()
        .ok_or_else(|| WaypostError::DataError("OSRM returned no route".into()))?;
    let points = first
        .geometry
        .coordinates
        .into_iter()
        .map(|[lng, lat]| RoutePoint::new(lat, lng))
        .collect();
    Ok(RouteResult {
        summary: RouteSummary {
            length_in_meters: first.distance,
            travel_time_in_seconds: first.duration,
        },
        legs: vec![RouteLeg { points }],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coordinates_are_swapped_into_lat_lng() {
        let body: RouteBody = serde_json::from_str(
            r#"{"code":"Ok","routes":[{"distance":5230.4,"duration":612.1,
               "geometry":{"type":"LineString","coordinates":[[121.0,14.5],[121.02,14.55]]}}]}"#,
        )
        .unwrap();
        let out = route(body).unwrap();
        assert_eq!(out.summary.length_in_meters, 5230.4);
        assert_eq!(out.legs[0].points[0], RoutePoint::new(14.5, 121.0));
        assert_eq!(out.points().count(), 2);
    }

    #[test]
    fn non_ok_code_is_error() {
        let body: RouteBody =
            serde_json::from_str(r#"{"code":"NoRoute","message":"Impossible route"}"#).unwrap();
        let err = route(body).unwrap_err();
        assert!(err.to_string().contains("Impossible route"));
    }
}
