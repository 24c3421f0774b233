//! End-to-end fallback chains with every vendor served by wiremock.
//!
//! - TomTom 403 → Nominatim answers the geocode
//! - TomTom 500 → OSRM answers the route
//! - TomTom unreachable → backend proxy answers traffic flow
//! - Geoapify answers place searches when TomTom is blocked

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use waypost::providers::{
    BackendClient, GeoapifyClient, GeocodeProvider, NominatimClient, OsrmClient, PlaceProvider,
    RouteProvider, TrafficProvider,
};
use waypost::{
    FlowOptions, GeocodeOptions, LatLng, MapClient, RouteOptions, SearchOptions, UsageConfig,
    Waypost,
};

struct Vendors {
    tomtom: MockServer,
    nominatim: MockServer,
    geoapify: MockServer,
    osrm: MockServer,
    backend: MockServer,
}

impl Vendors {
    async fn start() -> Self {
        Self {
            tomtom: MockServer::start().await,
            nominatim: MockServer::start().await,
            geoapify: MockServer::start().await,
            osrm: MockServer::start().await,
            backend: MockServer::start().await,
        }
    }

    fn client(&self) -> MapClient {
        Waypost::builder()
            .tomtom("tt-key")
            .tomtom_base_url(self.tomtom.uri())
            .geoapify("geo-key")
            .geoapify_base_url(self.geoapify.uri())
            .nominatim_base_url(self.nominatim.uri())
            .osrm_base_url(self.osrm.uri())
            .backend_url(self.backend.uri())
            .usage(UsageConfig::new().min_interval(Duration::ZERO))
            .build()
            .unwrap()
    }
}

async fn tomtom_status(server: &MockServer, status: u16) {
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(status).set_body_json(json!({
            "errorText": "Developer Inactive"
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn forbidden_geocode_is_answered_by_nominatim() {
    let vendors = Vendors::start().await;
    tomtom_status(&vendors.tomtom, 403).await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", "Makati"))
        .and(query_param("format", "jsonv2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "place_id": 1,
            "lat": "14.5547",
            "lon": "121.0244",
            "display_name": "Makati, Metro Manila, Philippines",
            "address": {"city": "Makati", "country": "Philippines"}
        }])))
        .expect(2)
        .mount(&vendors.nominatim)
        .await;

    let client = vendors.client();
    for _ in 0..2 {
        let response = client
            .geocode("Makati", &GeocodeOptions::default())
            .await
            .unwrap();
        let first = response.first().unwrap();
        assert_eq!(first.position.lat, 14.5547);
        assert_eq!(first.address.municipality.as_deref(), Some("Makati"));
    }

    // The second call skipped TomTom: one request only.
    let tomtom_requests = vendors.tomtom.received_requests().await.unwrap();
    assert_eq!(tomtom_requests.len(), 1);
    let records = client.failure_records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].1.status, 403);
    assert!(records[0].1.message.contains("Developer Inactive"));
}

#[tokio::test]
async fn reverse_geocode_falls_back_to_nominatim_reverse() {
    let vendors = Vendors::start().await;
    tomtom_status(&vendors.tomtom, 429).await;
    Mock::given(method("GET"))
        .and(path("/reverse"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "lat": "14.5831",
            "lon": "120.9794",
            "display_name": "Rizal Park, Ermita, Manila",
            "address": {"city": "Manila"}
        })))
        .expect(1)
        .mount(&vendors.nominatim)
        .await;

    let response = vendors
        .client()
        .reverse_geocode(14.5831, 120.9794, &GeocodeOptions::default())
        .await
        .unwrap();
    assert_eq!(
        response.results[0].address.freeform_address,
        "Rizal Park, Ermita, Manila"
    );
}

#[tokio::test]
async fn server_error_route_is_answered_by_osrm() {
    let vendors = Vendors::start().await;
    tomtom_status(&vendors.tomtom, 500).await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/route/v1/driving/.+"))
        .and(query_param("geometries", "geojson"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": "Ok",
            "routes": [{
                "distance": 5230.4,
                "duration": 612.1,
                "geometry": {
                    "type": "LineString",
                    "coordinates": [[121.0244, 14.5547], [121.0494, 14.6507]]
                }
            }]
        })))
        .expect(1)
        .mount(&vendors.osrm)
        .await;

    let route = vendors
        .client()
        .calculate_route(
            LatLng::new(14.5547, 121.0244),
            LatLng::new(14.6507, 121.0494),
            &RouteOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(route.summary.length_in_meters, 5230.4);
    let first = route.points().next().unwrap();
    assert_eq!(first.latitude, 14.5547);
    assert_eq!(first.longitude, 121.0244);
}

#[tokio::test]
async fn rate_limited_route_is_an_error() {
    let vendors = Vendors::start().await;
    tomtom_status(&vendors.tomtom, 429).await;

    let err = vendors
        .client()
        .calculate_route(
            LatLng::new(14.5547, 121.0244),
            LatLng::new(14.6507, 121.0494),
            &RouteOptions::default(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), "rate-limit");
    assert!(vendors.osrm.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn unreachable_tomtom_flow_uses_backend() {
    let vendors = Vendors::start().await;
    Mock::given(method("GET"))
        .and(path("/api/traffic/nearby"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "average_speed": 22.5,
            "free_flow_speed": 45
        })))
        .expect(1)
        .mount(&vendors.backend)
        .await;

    // Nothing listens on port 1.
    let client = Waypost::builder()
        .tomtom("tt-key")
        .tomtom_base_url("http://127.0.0.1:1")
        .backend_url(vendors.backend.uri())
        .usage(UsageConfig::new().min_interval(Duration::ZERO))
        .build()
        .unwrap();

    let flow = client
        .traffic_flow(14.6, 121.0, &FlowOptions::default())
        .await
        .unwrap();
    assert_eq!(flow.flow_segment_data.current_speed, 22.5);
    assert_eq!(flow.flow_segment_data.free_flow_speed, 45.0);
    assert!(client.failure_records().is_empty());
}

#[tokio::test]
async fn blocked_search_uses_geoapify() {
    let vendors = Vendors::start().await;
    tomtom_status(&vendors.tomtom, 403).await;
    Mock::given(method("GET"))
        .and(path("/v1/geocode/search"))
        .and(query_param("apiKey", "geo-key"))
        .and(query_param("text", "SM Aura Premier"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{
                "place_id": "p1",
                "lat": 14.53,
                "lon": 121.05,
                "name": "SM Aura",
                "formatted": "SM Aura Premier, Taguig",
                "city": "Taguig",
                "country": "Philippines"
            }]
        })))
        .expect(1)
        .mount(&vendors.geoapify)
        .await;

    let response = vendors
        .client()
        .search_places("SM Aura Premier", &SearchOptions::default())
        .await
        .unwrap();
    let place = &response.results[0];
    assert_eq!(place.id.as_deref(), Some("p1"));
    assert_eq!(place.address.municipality.as_deref(), Some("Taguig"));
}

#[tokio::test]
async fn everything_failing_yields_neutral_values() {
    let vendors = Vendors::start().await;
    for server in [
        &vendors.tomtom,
        &vendors.nominatim,
        &vendors.geoapify,
        &vendors.backend,
    ] {
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502))
            .mount(server)
            .await;
    }
    let client = vendors.client();

    assert!(
        client
            .geocode("Makati", &GeocodeOptions::default())
            .await
            .unwrap()
            .is_empty()
    );
    assert!(
        client
            .search_places("SM Aura Premier", &SearchOptions::default())
            .await
            .unwrap()
            .is_empty()
    );
    assert_eq!(
        client
            .traffic_flow(14.6, 121.0, &FlowOptions::default())
            .await
            .unwrap(),
        waypost::FlowResult::default_estimate()
    );
}

// ============================================================================
// Fallback clients on their own
// ============================================================================

#[tokio::test]
async fn nominatim_sends_country_codes_in_lowercase() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("countrycodes", "ph"))
        .and(query_param("addressdetails", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let client = NominatimClient::with_base_url(&server.uri()).unwrap();
    let response = client
        .geocode("Cebu", &GeocodeOptions::default().country("PH"))
        .await
        .unwrap();
    assert!(response.is_empty());
    assert_eq!(GeocodeProvider::name(&client), "nominatim");
}

#[tokio::test]
async fn geoapify_short_queries_use_autocomplete() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/geocode/autocomplete"))
        .and(query_param("text", "sm"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": []})))
        .expect(1)
        .mount(&server)
        .await;

    let client = GeoapifyClient::with_base_url("geo-key", &server.uri()).unwrap();
    client
        .search_places("sm", &SearchOptions::default())
        .await
        .unwrap();
}

#[tokio::test]
async fn osrm_non_ok_code_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": "NoRoute",
            "message": "Impossible route between points"
        })))
        .mount(&server)
        .await;

    let client = OsrmClient::with_base_url(&server.uri()).unwrap();
    let err = client
        .calculate_route(
            LatLng::new(14.5, 121.0),
            LatLng::new(10.3, 123.9),
            &RouteOptions::default(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), "invalid-response");
}

#[tokio::test]
async fn backend_accepts_wrapped_flow() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/traffic/nearby"))
        .and(query_param("radius", "1000"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "flowSegmentData": {
                "frc": "FRC2",
                "currentSpeed": 40,
                "freeFlowSpeed": 60,
                "confidence": 0.9
            }
        })))
        .mount(&server)
        .await;

    let client = BackendClient::new(&server.uri()).unwrap();
    let flow = client
        .traffic_flow(LatLng::new(14.6, 121.0), &FlowOptions::default())
        .await
        .unwrap();
    assert_eq!(flow.flow_segment_data.frc, "FRC2");
    assert_eq!(flow.flow_segment_data.confidence, 0.9);
}
