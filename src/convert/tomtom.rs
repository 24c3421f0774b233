//! TomTom wire formats.
//!
//! TomTom's canonical shapes are what the rest of the crate standardizes on,
//! so most conversions here only fill defaults. The exceptions are reverse
//! geocoding (position comes back as a `"lat,lon"` string) and incidents
//! (GeoJSON features with a `properties` object).

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::types::{
    Address, FlowResult, FlowSegmentData, GeocodeResponse, Incident, IncidentGeometry,
    IncidentResponse, PlaceResult, Poi, Position, PositionResult, RouteLeg, RoutePoint,
    RouteResult, RouteSummary, SearchResponse,
};
use crate::{Result, WaypostError};

// ============================================================================
// Search / geocode
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct SearchBody {
    #[serde(default)]
    results: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: Option<String>,
    position: Option<WirePosition>,
    #[serde(default)]
    address: WireAddress,
    poi: Option<WirePoi>,
    dist: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct WirePosition {
    lat: f64,
    lon: f64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireAddress {
    freeform_address: Option<String>,
    country: Option<String>,
    municipality: Option<String>,
    street_name: Option<String>,
    street_number: Option<String>,
    postal_code: Option<String>,
}

impl From<WireAddress> for Address {
    fn from(a: WireAddress) -> Self {
        Address {
            freeform_address: a.freeform_address.unwrap_or_default(),
            country: a.country,
            municipality: a.municipality,
            street_name: a.street_name,
            street_number: a.street_number,
            postal_code: a.postal_code,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WirePoi {
    #[serde(default)]
    name: String,
    #[serde(default)]
    categories: Vec<String>,
}

/// `/search/2/geocode` body → canonical geocode response.
///
/// Items without a position are dropped.
pub fn geocode(body: SearchBody) -> GeocodeResponse {
    GeocodeResponse {
        results: body
            .results
            .into_iter()
            .filter_map(|item| {
                let p = item.position?;
                Some(PositionResult {
                    position: Position::new(p.lat, p.lon),
                    address: item.address.into(),
                })
            })
            .collect(),
    }
}

/// `/search/2/search`, `nearbySearch` and `categorySearch` bodies.
pub fn places(body: SearchBody) -> SearchResponse {
    SearchResponse {
        results: body
            .results
            .into_iter()
            .filter_map(|item| {
                let p = item.position?;
                Some(PlaceResult {
                    id: item.id,
                    poi: item.poi.map(|poi| Poi {
                        name: poi.name,
                        categories: poi.categories,
                    }),
                    position: Position::new(p.lat, p.lon),
                    address: item.address.into(),
                    dist: item.dist,
                })
            })
            .collect(),
    }
}

// ============================================================================
// Reverse geocode
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ReverseBody {
    #[serde(default)]
    addresses: Vec<ReverseItem>,
}

#[derive(Debug, Deserialize)]
struct ReverseItem {
    #[serde(default)]
    address: WireAddress,
    /// `"lat,lon"`
    position: Option<String>,
}

fn parse_lat_lon(s: &str) -> Option<Position> {
    let (lat, lon) = s.split_once(',')?;
    Some(Position::new(
        lat.trim().parse().ok()?,
        lon.trim().parse().ok()?,
    ))
}

/// `/search/2/reverseGeocode` body. Items with an unparseable position are
/// dropped.
pub fn reverse_geocode(body: ReverseBody) -> GeocodeResponse {
    GeocodeResponse {
        results: body
            .addresses
            .into_iter()
            .filter_map(|item| {
                let position = parse_lat_lon(item.position.as_deref()?)?;
                Some(PositionResult {
                    position,
                    address: item.address.into(),
                })
            })
            .collect(),
    }
}

// ============================================================================
// Traffic flow
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowBody {
    flow_segment_data: Option<WireFlow>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireFlow {
    frc: Option<String>,
    current_speed: Option<f64>,
    free_flow_speed: Option<f64>,
    confidence: Option<f64>,
}

/// `/traffic/services/4/flowSegmentData` body.
pub fn flow(body: FlowBody) -> Result<FlowResult> {
    let data = body
        .flow_segment_data
        .ok_or_else(|| WaypostError::DataError("missing flowSegmentData".into()))?;
    let current_speed = data
        .current_speed
        .ok_or_else(|| WaypostError::DataError("missing currentSpeed".into()))?;
    Ok(FlowResult {
        flow_segment_data: FlowSegmentData {
            frc: data.frc.unwrap_or_else(|| "FRC3".to_string()),
            current_speed,
            free_flow_speed: data.free_flow_speed.unwrap_or(current_speed),
            confidence: data.confidence.unwrap_or(1.0),
        },
    })
}

// ============================================================================
// Routing
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct RouteBody {
    #[serde(default)]
    routes: Vec<WireRoute>,
}

#[derive(Debug, Deserialize)]
struct WireRoute {
    summary: RouteSummary,
    #[serde(default)]
    legs: Vec<WireLeg>,
}

#[derive(Debug, Deserialize)]
struct WireLeg {
    #[serde(default)]
    points: Vec<RoutePoint>,
}

/// `/routing/1/calculateRoute` body; the first route wins.
pub fn route(body: RouteBody) -> Result<RouteResult> {
    let first = body
        .routes
        .into_iter()
        .next()
        .ok_or_else(|| WaypostError::DataError("no route returned".into()))?;
    Ok(RouteResult {
        summary: first.summary,
        legs: first
            .legs
            .into_iter()
            .map(|leg| RouteLeg { points: leg.points })
            .collect(),
    })
}

// ============================================================================
// Incidents
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct IncidentBody {
    #[serde(default)]
    incidents: Vec<WireIncident>,
}

#[derive(Debug, Deserialize)]
struct WireIncident {
    #[serde(default)]
    properties: WireIncidentProps,
    geometry: Option<IncidentGeometry>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireIncidentProps {
    id: Option<String>,
    #[serde(default)]
    icon_category: u32,
    #[serde(default)]
    magnitude_of_delay: u32,
    #[serde(default)]
    events: Vec<WireEvent>,
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
    from: Option<String>,
    to: Option<String>,
    length: Option<f64>,
    delay: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct WireEvent {
    description: Option<String>,
}

/// `/traffic/services/5/incidentDetails` body.
pub fn incidents(body: IncidentBody) -> IncidentResponse {
    IncidentResponse {
        incidents: body
            .incidents
            .into_iter()
            .map(|wire| {
                let p = wire.properties;
                let description = p.events.into_iter().find_map(|e| e.description);
                Incident {
                    id: p.id,
                    icon_category: p.icon_category,
                    magnitude_of_delay: p.magnitude_of_delay,
                    description,
                    from: p.from,
                    to: p.to,
                    delay_seconds: p.delay,
                    length_meters: p.length,
                    start_time: p.start_time,
                    end_time: p.end_time,
                    geometry: wire.geometry,
                }
            })
            .collect(),
    }
}

/// Keep incidents whose validity overlaps `[start, end]`. Open-ended
/// incidents (no start or end time) are always kept.
pub fn within_window(
    response: IncidentResponse,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> IncidentResponse {
    IncidentResponse {
        incidents: response
            .incidents
            .into_iter()
            .filter(|i| i.start_time.is_none_or(|t| t <= end))
            .filter(|i| i.end_time.is_none_or(|t| t >= start))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geocode_maps_address_and_position() {
        let body: SearchBody = serde_json::from_str(
            r#"{"summary":{},"results":[{"type":"Geocode","position":{"lat":14.55,"lon":121.02},
               "address":{"freeformAddress":"Makati, Metro Manila","country":"Philippines",
               "municipality":"Makati"}},{"type":"Geocode"}]}"#,
        )
        .unwrap();
        let out = geocode(body);
        assert_eq!(out.results.len(), 1);
        assert_eq!(out.results[0].position, Position::new(14.55, 121.02));
        assert_eq!(out.results[0].address.municipality.as_deref(), Some("Makati"));
    }

    #[test]
    fn reverse_parses_string_position() {
        let body: ReverseBody = serde_json::from_str(
            r#"{"addresses":[{"address":{"freeformAddress":"Rizal Park"},"position":"14.5831,120.9794"}]}"#,
        )
        .unwrap();
        let out = reverse_geocode(body);
        assert_eq!(out.results[0].position, Position::new(14.5831, 120.9794));
        assert_eq!(out.results[0].address.freeform_address, "Rizal Park");
    }

    #[test]
    fn flow_requires_current_speed() {
        let body: FlowBody =
            serde_json::from_str(r#"{"flowSegmentData":{"frc":"FRC1"}}"#).unwrap();
        assert!(flow(body).is_err());
    }

    #[test]
    fn route_without_routes_is_data_error() {
        let body: RouteBody = serde_json::from_str(r#"{"routes":[]}"#).unwrap();
        assert!(matches!(route(body), Err(WaypostError::DataError(_))));
    }

    #[test]
    fn incident_description_comes_from_first_event() {
        let body: IncidentBody = serde_json::from_str(
            r#"{"incidents":[{"type":"Feature","properties":{"id":"abc","iconCategory":6,
               "magnitudeOfDelay":2,"events":[{"description":"Stationary traffic","code":101}],
               "startTime":"2024-05-01T08:00:00Z","delay":240,"length":1200.5},
               "geometry":{"type":"LineString","coordinates":[[121.0,14.5],[121.01,14.51]]}}]}"#,
        )
        .unwrap();
        let out = incidents(body);
        let inc = &out.incidents[0];
        assert_eq!(inc.description.as_deref(), Some("Stationary traffic"));
        assert_eq!(inc.delay_seconds, Some(240.0));
        assert_eq!(inc.geometry.as_ref().unwrap().kind, "LineString");
        assert!(inc.start_time.is_some());
    }

    #[test]
    fn window_drops_incidents_that_ended_before_start() {
        let at = |s: &str| s.parse::<DateTime<Utc>>().unwrap();
        let response = IncidentResponse {
            incidents: vec![
                Incident {
                    id: Some("old".into()),
                    end_time: Some(at("2024-05-01T06:00:00Z")),
                    ..Default::default()
                },
                Incident {
                    id: Some("open".into()),
                    ..Default::default()
                },
                Incident {
                    id: Some("current".into()),
                    start_time: Some(at("2024-05-01T07:00:00Z")),
                    end_time: Some(at("2024-05-01T12:00:00Z")),
                    ..Default::default()
                },
            ],
        };
        let kept = within_window(
            response,
            at("2024-05-01T08:00:00Z"),
            at("2024-05-01T09:00:00Z"),
        );
        let ids: Vec<_> = kept.incidents.iter().filter_map(|i| i.id.as_deref()).collect();
        assert_eq!(ids, ["open", "current"]);
    }
}
