//! Geoapify wire formats.
//!
//! The geocoding endpoints are requested with `format=json` and answer
//! `{results: [...]}` with flat records. The places endpoints only speak
//! GeoJSON, so their flat record sits under `features[].properties`.
//! Both flatten into the same place record.

use serde::Deserialize;

use crate::types::{Address, PlaceResult, Poi, Position, SearchResponse};

#[derive(Debug, Deserialize)]
pub struct ResultsBody {
    #[serde(default)]
    results: Vec<GeoapifyPlace>,
}

#[derive(Debug, Deserialize)]
pub struct FeatureBody {
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    properties: GeoapifyPlace,
}

#[derive(Debug, Default, Deserialize)]
struct GeoapifyPlace {
    place_id: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
    name: Option<String>,
    formatted: Option<String>,
    address_line1: Option<String>,
    country: Option<String>,
    city: Option<String>,
    street: Option<String>,
    housenumber: Option<String>,
    postcode: Option<String>,
    #[serde(default)]
    categories: Vec<String>,
    category: Option<String>,
    distance: Option<f64>,
}

impl GeoapifyPlace {
    fn into_place(self) -> Option<PlaceResult> {
        let position = Position::new(self.lat?, self.lon?);
        let mut categories = self.categories;
        if categories.is_empty()
            && let Some(category) = self.category
        {
            categories.push(category);
        }
        let poi = self.name.clone().map(|name| Poi { name, categories });
        let freeform_address = self
            .formatted
            .or(self.address_line1)
            .or(self.name)
            .unwrap_or_default();
        Some(PlaceResult {
            id: self.place_id,
            poi,
            position,
            address: Address {
                freeform_address,
                country: self.country,
                municipality: self.city,
                street_name: self.street,
                street_number: self.housenumber,
                postal_code: self.postcode,
            },
            dist: self.distance,
        })
    }
}

fn collect(places: impl IntoIterator<Item = GeoapifyPlace>) -> SearchResponse {
    SearchResponse {
        results: places
            .into_iter()
            .filter_map(GeoapifyPlace::into_place)
            .collect(),
    }
}

/// `/v1/geocode/search` and `/v1/geocode/autocomplete` with `format=json`.
pub fn results(body: ResultsBody) -> SearchResponse {
    collect(body.results)
}

/// `/v2/places` and `/v2/place-details` (GeoJSON).
pub fn features(body: FeatureBody) -> SearchResponse {
    collect(body.features.into_iter().map(|f| f.properties))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_result_maps_to_place() {
        let body: ResultsBody = serde_json::from_str(
            r#"{"results":[{"place_id":"p1","lat":14.53,"lon":121.05,"name":"SM Aura",
               "formatted":"SM Aura Premier, Taguig","city":"Taguig","country":"Philippines",
               "category":"commercial.shopping_mall","distance":850}]}"#,
        )
        .unwrap();
        let out = results(body);
        let place = &out.results[0];
        assert_eq!(place.id.as_deref(), Some("p1"));
        assert_eq!(place.address.freeform_address, "SM Aura Premier, Taguig");
        assert_eq!(place.address.municipality.as_deref(), Some("Taguig"));
        let poi = place.poi.as_ref().unwrap();
        assert_eq!(poi.categories, vec!["commercial.shopping_mall"]);
        assert_eq!(place.dist, Some(850.0));
    }

    #[test]
    fn feature_properties_are_flattened() {
        let body: FeatureBody = serde_json::from_str(
            r#"{"type":"FeatureCollection","features":[{"type":"Feature",
               "properties":{"lat":14.6,"lon":121.0,"address_line1":"Quezon Ave",
               "categories":["catering.cafe","catering"]},"geometry":{}}]}"#,
        )
        .unwrap();
        let out = features(body);
        assert_eq!(out.results[0].address.freeform_address, "Quezon Ave");
        assert!(out.results[0].poi.is_none());
    }

    #[test]
    fn records_without_coordinates_are_dropped() {
        let body: ResultsBody =
            serde_json::from_str(r#"{"results":[{"name":"nowhere"}]}"#).unwrap();
        assert!(results(body).is_empty());
    }
}
