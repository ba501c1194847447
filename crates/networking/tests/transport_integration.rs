//! Integration tests for the HTTP transport
//!
//! These tests use wiremock to stand up a mock server and exercise the full
//! request/response cycle, status handling, and retry behavior.

use networking::{
    HttpRequest, HttpTransport, ReqwestTransport, RetryPolicy, RetryingTransport, TransportConfig,
    TransportError,
};
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn transport() -> ReqwestTransport {
    ReqwestTransport::new(TransportConfig::default().with_timeout(Duration::from_secs(5))).unwrap()
}

// =============================================================================
// Successful Request Tests
// =============================================================================

#[tokio::test]
async fn test_get_with_query_and_headers() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search/code"))
        .and(query_param("q", "repo:filmgirl/TextMate-Themes extension:tmTheme"))
        .and(query_param("page", "2"))
        .and(header("accept", "application/vnd.github.v3+json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "total_count": 1,
            "items": [{ "name": "Monokai.tmTheme", "path": "Monokai.tmTheme" }]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let request = HttpRequest::get(format!("{}/search/code", mock_server.uri()))
        .query("q", "repo:filmgirl/TextMate-Themes extension:tmTheme")
        .query("page", "2")
        .header("Accept", "application/vnd.github.v3+json");

    let response = transport().send(request).await.unwrap();

    assert_eq!(response.status, 200);
    assert!(response.is_json());
    let body: serde_json::Value = response.json().unwrap();
    assert_eq!(body["total_count"], 1);
}

#[tokio::test]
async fn test_post_json_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/_apis/public/gallery/extensionquery"))
        .and(body_partial_json(serde_json::json!({ "flags": 870 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "results": [] })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let request = HttpRequest::post(format!("{}/_apis/public/gallery/extensionquery", mock_server.uri()))
        .json_body(&serde_json::json!({ "flags": 870 }))
        .unwrap();

    let response = transport().send(request).await.unwrap();
    assert_eq!(response.status, 200);
}

#[tokio::test]
async fn test_default_headers_are_sent() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/gallery.json"))
        .and(header("x-client", "theme-gallery"))
        .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = TransportConfig::default().with_header("X-Client", "theme-gallery");
    let transport = ReqwestTransport::new(config).unwrap();

    let response = transport
        .send(HttpRequest::get(format!("{}/gallery.json", mock_server.uri())))
        .await
        .unwrap();

    assert_eq!(response.text(), "[]");
}

// =============================================================================
// Status Handling Tests
// =============================================================================

#[tokio::test]
async fn test_error_statuses_are_responses() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/packages/Gone.json"))
        .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
        .mount(&mock_server)
        .await;

    let response = transport()
        .send(HttpRequest::get(format!("{}/packages/Gone.json", mock_server.uri())))
        .await
        .unwrap();

    assert_eq!(response.status, 404);
    assert!(!response.is_success());
    assert_eq!(response.error_for_status().unwrap_err().status(), Some(404));
}

#[tokio::test]
async fn test_connection_refused_is_network_error() {
    let mock_server = MockServer::start().await;
    let uri = mock_server.uri();
    drop(mock_server);

    let err = transport().send(HttpRequest::get(uri)).await.unwrap_err();
    assert!(matches!(err, TransportError::Network(_) | TransportError::Timeout { .. }));
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_timeout() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&mock_server)
        .await;

    let transport =
        ReqwestTransport::new(TransportConfig::default().with_timeout(Duration::from_millis(100))).unwrap();

    let err = transport.send(HttpRequest::get(mock_server.uri())).await.unwrap_err();
    assert!(matches!(err, TransportError::Timeout { .. }));
}

// =============================================================================
// Retry Behavior Tests
// =============================================================================

#[tokio::test]
async fn test_retry_on_503_then_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/themes.json"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/themes.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
        .mount(&mock_server)
        .await;

    let transport = RetryingTransport::new(
        transport(),
        RetryPolicy::new(2).with_initial_delay(Duration::from_millis(10)),
    );

    let response = transport
        .send(HttpRequest::get(format!("{}/themes.json", mock_server.uri())))
        .await
        .unwrap();

    assert_eq!(response.status, 200);
}

#[tokio::test]
async fn test_no_retry_on_403() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&mock_server)
        .await;

    let transport = RetryingTransport::new(
        transport(),
        RetryPolicy::new(3).with_initial_delay(Duration::from_millis(10)),
    );

    let response = transport.send(HttpRequest::get(mock_server.uri())).await.unwrap();
    assert_eq!(response.status, 403);
}
