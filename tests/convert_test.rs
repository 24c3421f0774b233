//! Every vendor normalizes into the same canonical shape.
//!
//! Callers cannot tell which provider answered by looking at field names:
//! these tests compare the serialized key sets of equivalent answers.

use std::collections::BTreeSet;

use serde_json::{Value, json};

use waypost::convert::{backend, geoapify, nominatim, osrm, tomtom};

fn keys(value: &Value) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    collect_keys(value, "", &mut out);
    out
}

fn collect_keys(value: &Value, prefix: &str, out: &mut BTreeSet<String>) {
    match value {
        Value::Object(map) => {
            for (k, v) in map {
                let path = format!("{prefix}/{k}");
                out.insert(path.clone());
                collect_keys(v, &path, out);
            }
        }
        Value::Array(items) => {
            if let Some(first) = items.first() {
                collect_keys(first, &format!("{prefix}[]"), out);
            }
        }
        _ => {}
    }
}

fn body<T: serde::de::DeserializeOwned>(value: Value) -> T {
    serde_json::from_value(value).unwrap()
}

#[test]
fn geocode_shape_matches_across_vendors() {
    let primary = tomtom::geocode(body(json!({
        "results": [{
            "type": "Geocode",
            "position": {"lat": 14.5547, "lon": 121.0244},
            "address": {"freeformAddress": "Makati, Metro Manila", "municipality": "Makati"}
        }]
    })));
    let fallback = nominatim::search(body(json!([{
        "lat": "14.5547",
        "lon": "121.0244",
        "display_name": "Makati, Metro Manila, Philippines",
        "address": {"city": "Makati"}
    }])));

    let primary = serde_json::to_value(&primary).unwrap();
    let fallback = serde_json::to_value(&fallback).unwrap();
    assert_eq!(keys(&primary), keys(&fallback));
    assert_eq!(primary["results"][0]["position"]["lat"], 14.5547);
    assert_eq!(fallback["results"][0]["position"]["lat"], 14.5547);
}

#[test]
fn reverse_geocode_shape_matches_across_vendors() {
    let primary = tomtom::reverse_geocode(body(json!({
        "addresses": [{
            "address": {"freeformAddress": "Rizal Park"},
            "position": "14.5831,120.9794"
        }]
    })));
    let fallback = nominatim::reverse(body(json!({
        "lat": "14.5831",
        "lon": "120.9794",
        "display_name": "Rizal Park, Ermita, Manila"
    })));
    assert_eq!(
        keys(&serde_json::to_value(&primary).unwrap()),
        keys(&serde_json::to_value(&fallback).unwrap())
    );
    assert_eq!(primary.results[0].position, fallback.results[0].position);
}

#[test]
fn place_shape_matches_across_vendors() {
    let primary = tomtom::places(body(json!({
        "results": [{
            "id": "tt-1",
            "type": "POI",
            "poi": {"name": "SM Aura", "categories": ["shopping center"]},
            "position": {"lat": 14.5465, "lon": 121.0545},
            "address": {"freeformAddress": "26th Street, Taguig"},
            "dist": 300.0
        }]
    })));
    let fallback = geoapify::results(body(json!({
        "results": [{
            "place_id": "geo-1",
            "lat": 14.5465,
            "lon": 121.0545,
            "name": "SM Aura",
            "formatted": "SM Aura, 26th Street, Taguig",
            "categories": ["commercial.shopping_mall"],
            "distance": 300.0
        }]
    })));
    let details = geoapify::features(body(json!({
        "type": "FeatureCollection",
        "features": [{
            "type": "Feature",
            "properties": {
                "place_id": "geo-1",
                "lat": 14.5465,
                "lon": 121.0545,
                "name": "SM Aura",
                "formatted": "SM Aura, 26th Street, Taguig",
                "category": "commercial.shopping_mall",
                "distance": 300.0
            }
        }]
    })));

    let primary = keys(&serde_json::to_value(&primary).unwrap());
    assert_eq!(primary, keys(&serde_json::to_value(&fallback).unwrap()));
    assert_eq!(primary, keys(&serde_json::to_value(&details).unwrap()));
}

#[test]
fn route_shape_matches_across_vendors() {
    let primary = tomtom::route(body(json!({
        "routes": [{
            "summary": {"lengthInMeters": 5230, "travelTimeInSeconds": 612},
            "legs": [{"points": [{"latitude": 14.5547, "longitude": 121.0244}]}]
        }]
    })))
    .unwrap();
    let fallback = osrm::route(body(json!({
        "code": "Ok",
        "routes": [{
            "distance": 5230.0,
            "duration": 612.0,
            "geometry": {"type": "LineString", "coordinates": [[121.0244, 14.5547]]}
        }]
    })))
    .unwrap();

    assert_eq!(
        keys(&serde_json::to_value(&primary).unwrap()),
        keys(&serde_json::to_value(&fallback).unwrap())
    );
    assert_eq!(primary, fallback);
}

#[test]
fn flow_shape_matches_across_vendors() {
    let primary = tomtom::flow(body(json!({
        "flowSegmentData": {"frc": "FRC3", "currentSpeed": 22.5, "freeFlowSpeed": 50, "confidence": 0.5}
    })))
    .unwrap();
    let fallback = backend::flow(body(json!({"average_speed": 22.5}))).unwrap();

    assert_eq!(
        keys(&serde_json::to_value(&primary).unwrap()),
        keys(&serde_json::to_value(&fallback).unwrap())
    );
    assert_eq!(primary, fallback);
}

#[test]
fn canonical_wire_names() {
    let route = serde_json::to_value(
        osrm::route(body(json!({
            "code": "Ok",
            "routes": [{"distance": 1.0, "duration": 2.0, "geometry": {"coordinates": []}}]
        })))
        .unwrap(),
    )
    .unwrap();
    assert!(route["summary"].get("lengthInMeters").is_some());
    assert!(route["summary"].get("travelTimeInSeconds").is_some());

    let flow = serde_json::to_value(waypost::FlowResult::default_estimate()).unwrap();
    assert_eq!(flow["flowSegmentData"]["currentSpeed"], 30.0);
}

#[test]
fn error_messages_are_extracted_from_vendor_bodies() {
    assert_eq!(
        waypost::convert::extract_error_message(r#"{"errorText":"Developer Inactive"}"#),
        "Developer Inactive"
    );
    assert_eq!(
        waypost::convert::extract_error_message(
            "<response><errorText>Developer Over Qps</errorText></response>"
        ),
        "Developer Over Qps"
    );
}
