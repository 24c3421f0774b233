//! Nominatim (OpenStreetMap) wire format, `format=jsonv2&addressdetails=1`.

use serde::Deserialize;

use crate::types::{Address, GeocodeResponse, Position, PositionResult};

/// One Nominatim place. Coordinates arrive as strings.
#[derive(Debug, Deserialize)]
pub struct NominatimPlace {
    lat: Option<String>,
    lon: Option<String>,
    display_name: Option<String>,
    #[serde(default)]
    address: NominatimAddress,
}

#[derive(Debug, Default, Deserialize)]
struct NominatimAddress {
    road: Option<String>,
    house_number: Option<String>,
    city: Option<String>,
    town: Option<String>,
    municipality: Option<String>,
    village: Option<String>,
    postcode: Option<String>,
    country: Option<String>,
}

/// `/reverse` answers a single object, or `{"error": ...}` when nothing
/// matches.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ReverseBody {
    #[allow(dead_code)]
    Error { error: String },
    Place(NominatimPlace),
}

impl NominatimPlace {
    fn into_result(self) -> Option<PositionResult> {
        let lat = self.lat?.parse().ok()?;
        let lon = self.lon?.parse().ok()?;
        let a = self.address;
        Some(PositionResult {
            position: Position::new(lat, lon),
            address: Address {
                freeform_address: self.display_name.unwrap_or_default(),
                country: a.country,
                municipality: a.city.or(a.town).or(a.municipality).or(a.village),
                street_name: a.road,
                street_number: a.house_number,
                postal_code: a.postcode,
            },
        })
    }
}

/// `/search` body.
pub fn search(body: Vec<NominatimPlace>) -> GeocodeResponse {
    GeocodeResponse {
        results: body
            .into_iter()
            .filter_map(NominatimPlace::into_result)
            .collect(),
    }
}

/// `/reverse` body. "Unable to geocode" is an empty result, not an error.
pub fn reverse(body: ReverseBody) -> GeocodeResponse {
    match body {
        ReverseBody::Place(place) => GeocodeResponse {
            results: place.into_result().into_iter().collect(),
        },
        ReverseBody::Error { .. } => GeocodeResponse::empty(),
    }
}
