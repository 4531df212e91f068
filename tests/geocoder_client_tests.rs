//! Contract tests for the HTTP geocoder behind its cache

use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use freightlane_server::geocode::{CachedGeocoder, GeocodeError, Geocoder, HttpGeocoder};

fn cached(mock_server: &MockServer) -> CachedGeocoder {
    let upstream = HttpGeocoder::new(mock_server.uri(), Duration::from_secs(5)).unwrap();
    CachedGeocoder::new(Arc::new(upstream), Duration::from_secs(60), 16)
}

#[tokio::test]
async fn lookup_parses_first_hit_and_is_cached() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("format", "json"))
        .and(query_param("q", "4 Point Rd, Durban"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            { "lat": "-29.8587", "lon": "31.0218", "display_name": "Point, Durban" },
            { "lat": "0", "lon": "0" }
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let geocoder = cached(&mock_server);
    let first = geocoder.geocode("4 Point Rd, Durban").await.unwrap();
    let second = geocoder.geocode("4 Point Rd, Durban").await.unwrap();

    assert_eq!(first, second);
    assert!((first.lat + 29.8587).abs() < 1e-9);
    assert!((first.lon - 31.0218).abs() < 1e-9);
    assert_eq!(geocoder.stats().await.upstream_calls, 1);
}

#[tokio::test]
async fn empty_result_is_no_match() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .mount(&mock_server)
        .await;

    let err = cached(&mock_server).geocode("Atlantis").await.unwrap_err();
    assert!(matches!(err, GeocodeError::NoMatch(address) if address == "Atlantis"));
}

#[tokio::test]
async fn upstream_error_status_is_an_http_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let err = cached(&mock_server).geocode("Durban").await.unwrap_err();
    assert!(matches!(err, GeocodeError::Http(_)));
}
