//! Per-operation request options

use std::str::FromStr;

use tokio_util::sync::CancellationToken;

use super::geo::LatLng;
use crate::WaypostError;

/// Options for `geocode` and `reverse_geocode`.
#[derive(Debug, Clone, Default)]
pub struct GeocodeOptions {
    /// Maximum number of results. Provider default when unset.
    pub limit: Option<u32>,
    /// Override the configured country restriction (ISO alpha-2).
    pub country: Option<String>,
    /// Override the configured response language.
    pub language: Option<String>,
    /// Abort the request; the call then returns `Cancelled`.
    pub cancel: Option<CancellationToken>,
}

impl GeocodeOptions {
    pub fn limit(mut self, n: u32) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn country(mut self, country: impl Into<String>) -> Self {
        self.country = Some(country.into());
        self
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// Options for place search, autocomplete, nearby and category lookups.
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub limit: Option<u32>,
    /// Proximity bias point.
    pub center: Option<LatLng>,
    /// Bias radius around `center`, in meters.
    pub radius_meters: Option<u32>,
    /// Search-as-you-type mode.
    pub typeahead: bool,
    pub country: Option<String>,
    pub language: Option<String>,
    pub cancel: Option<CancellationToken>,
}

impl SearchOptions {
    pub fn limit(mut self, n: u32) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn near(mut self, center: LatLng, radius_meters: u32) -> Self {
        self.center = Some(center);
        self.radius_meters = Some(radius_meters);
        self
    }

    pub fn typeahead(mut self, enabled: bool) -> Self {
        self.typeahead = enabled;
        self
    }

    pub fn country(mut self, country: impl Into<String>) -> Self {
        self.country = Some(country.into());
        self
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum TravelMode {
    #[default]
    Car,
    Motorcycle,
    Bus,
    Bicycle,
    Pedestrian,
}

impl TravelMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Car => "car",
            Self::Motorcycle => "motorcycle",
            Self::Bus => "bus",
            Self::Bicycle => "bicycle",
            Self::Pedestrian => "pedestrian",
        }
    }
}

impl FromStr for TravelMode {
    type Err = WaypostError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "car" => Ok(Self::Car),
            "motorcycle" => Ok(Self::Motorcycle),
            "bus" => Ok(Self::Bus),
            "bicycle" | "bike" => Ok(Self::Bicycle),
            "pedestrian" | "walk" => Ok(Self::Pedestrian),
            other => Err(WaypostError::InvalidInput(format!(
                "unknown travel mode: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum RouteType {
    #[default]
    Fastest,
    Shortest,
    Eco,
}

impl RouteType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fastest => "fastest",
            Self::Shortest => "shortest",
            Self::Eco => "eco",
        }
    }
}

impl FromStr for RouteType {
    type Err = WaypostError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fastest" => Ok(Self::Fastest),
            "shortest" => Ok(Self::Shortest),
            "eco" => Ok(Self::Eco),
            other => Err(WaypostError::InvalidInput(format!(
                "unknown route type: {other}"
            ))),
        }
    }
}

/// Options for `calculate_route`.
#[derive(Debug, Clone)]
pub struct RouteOptions {
    pub travel_mode: TravelMode,
    pub route_type: RouteType,
    /// Use live traffic for travel times. Default: true.
    pub traffic: bool,
    pub cancel: Option<CancellationToken>,
}

impl Default for RouteOptions {
    fn default() -> Self {
        Self {
            travel_mode: TravelMode::default(),
            route_type: RouteType::default(),
            traffic: true,
            cancel: None,
        }
    }
}

impl RouteOptions {
    pub fn travel_mode(mut self, mode: TravelMode) -> Self {
        self.travel_mode = mode;
        self
    }

    pub fn route_type(mut self, route_type: RouteType) -> Self {
        self.route_type = route_type;
        self
    }

    pub fn traffic(mut self, enabled: bool) -> Self {
        self.traffic = enabled;
        self
    }

    pub fn cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// Options for `traffic_flow`.
#[derive(Debug, Clone)]
pub struct FlowOptions {
    /// Map zoom level the flow segment is resolved at. Default: 10.
    pub zoom: u8,
    /// Radius used by the backend proxy aggregate, in meters. Default: 1,000.
    pub radius_meters: u32,
    pub cancel: Option<CancellationToken>,
}

impl Default for FlowOptions {
    fn default() -> Self {
        Self {
            zoom: 10,
            radius_meters: 1_000,
            cancel: None,
        }
    }
}

impl FlowOptions {
    pub fn zoom(mut self, zoom: u8) -> Self {
        self.zoom = zoom;
        self
    }

    pub fn radius_meters(mut self, radius: u32) -> Self {
        self.radius_meters = radius;
        self
    }

    pub fn cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// Options for `traffic_incidents`.
#[derive(Debug, Clone, Default)]
pub struct IncidentOptions {
    pub language: Option<String>,
    pub cancel: Option<CancellationToken>,
}

impl IncidentOptions {
    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn travel_mode_parses_aliases() {
        assert_eq!("Bike".parse::<TravelMode>().unwrap(), TravelMode::Bicycle);
        assert_eq!("walk".parse::<TravelMode>().unwrap(), TravelMode::Pedestrian);
        assert!("hovercraft".parse::<TravelMode>().is_err());
    }

    #[test]
    fn route_defaults_use_traffic() {
        let options = RouteOptions::default();
        assert!(options.traffic);
        assert_eq!(options.route_type, RouteType::Fastest);
        assert_eq!("ECO".parse::<RouteType>().unwrap(), RouteType::Eco);
    }

    #[test]
    fn flow_defaults() {
        let options = FlowOptions::default();
        assert_eq!(options.zoom, 10);
        assert_eq!(options.radius_meters, 1000);
    }
}
