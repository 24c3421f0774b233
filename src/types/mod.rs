//! Public types for the Waypost API.

mod geo;
mod options;
mod place;
mod route;
mod tiles;
mod traffic;

pub use geo::{BoundingBox, LatLng, Position};
pub use options::{
    FlowOptions, GeocodeOptions, IncidentOptions, RouteOptions, RouteType, SearchOptions,
    TravelMode,
};
pub use place::{Address, GeocodeResponse, PlaceResult, Poi, PositionResult, SearchResponse};
pub use route::{RouteLeg, RoutePoint, RouteResult, RouteSummary};
pub use tiles::{MapStyle, render_tile_url};
pub use traffic::{FlowResult, FlowSegmentData, Incident, IncidentGeometry, IncidentResponse};
