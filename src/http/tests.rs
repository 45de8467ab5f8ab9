//! Tests for the HTTP client module

use super::*;
use crate::auth::{AuthConfig, Authenticator};
use crate::types::{BackoffType, Method};
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::json;
use std::time::Duration;
use test_case::test_case;
use wiremock::matchers::{body_json, body_string, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client() -> HttpClient {
    HttpClient::with_config(HttpClientConfig::builder().no_rate_limit().build()).unwrap()
}

fn client_with_backoff(backoff_type: BackoffType, max: Duration) -> HttpClient {
    let config = HttpClientConfig::builder()
        .backoff(backoff_type, Duration::from_millis(100), max)
        .no_rate_limit()
        .build();
    HttpClient::with_config(config).unwrap()
}

#[test]
fn test_http_client_config_builder() {
    let config = HttpClientConfig::builder()
        .timeout(Duration::from_secs(60))
        .backoff(
            BackoffType::Linear,
            Duration::from_millis(200),
            Duration::from_secs(30),
        )
        .header("X-Custom", "value")
        .user_agent("test-agent/1.0")
        .build();

    assert_eq!(config.timeout, Duration::from_secs(60));
    assert_eq!(config.backoff_type, BackoffType::Linear);
    assert_eq!(config.initial_backoff, Duration::from_millis(200));
    assert_eq!(
        config.default_headers.get("X-Custom"),
        Some(&"value".to_string())
    );
    assert_eq!(config.user_agent, "test-agent/1.0");
    assert!(config.rate_limit.is_some());
}

#[tokio::test]
async fn test_execute_get_with_query_and_headers() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/users"))
        .and(query_param("page", "2"))
        .and(header("X-Request-Id", "abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "users": [{"id": 1, "name": "Alice"}]
        })))
        .mount(&mock_server)
        .await;

    let request = HttpRequest::new(Method::GET, format!("{}/api/users", mock_server.uri()))
        .query("page", "2")
        .header("X-Request-Id", "abc123");

    let response = client().execute(&request, None).await.unwrap();
    assert!(response.is_success());
    assert_eq!(response.json().unwrap()["users"][0]["name"], "Alice");
}

#[tokio::test]
async fn test_execute_json_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/search"))
        .and(body_json(json!({"filter": {"since": "2024-01-01"}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .mount(&mock_server)
        .await;

    let request = HttpRequest::new(Method::POST, format!("{}/search", mock_server.uri()))
        .body(HttpBody::Json(json!({"filter": {"since": "2024-01-01"}})));

    let response = client().execute(&request, None).await.unwrap();
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn test_execute_text_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(body_string("raw payload"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&mock_server)
        .await;

    let request = HttpRequest::new(Method::POST, mock_server.uri())
        .body(HttpBody::Text("raw payload".to_string()));

    let response = client().execute(&request, None).await.unwrap();
    assert_eq!(response.status(), 204);
}

#[tokio::test]
async fn test_execute_returns_error_statuses() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(503)
                .insert_header("Retry-After", "7")
                .set_body_string("down"),
        )
        .mount(&mock_server)
        .await;

    let request = HttpRequest::new(Method::GET, mock_server.uri());
    let response = client().execute(&request, None).await.unwrap();

    assert_eq!(response.status(), 503);
    assert!(!response.is_success());
    assert_eq!(response.text(), "down");
    assert_eq!(response.retry_after(), Some(Duration::from_secs(7)));
}

#[tokio::test]
async fn test_execute_applies_authenticator_and_default_headers() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(header("Authorization", "Bearer t0k3n"))
        .and(header("X-Default", "yes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = HttpClientConfig::builder()
        .header("X-Default", "yes")
        .no_rate_limit()
        .build();
    let client = HttpClient::with_config(config).unwrap();
    let auth = Authenticator::new(AuthConfig::Bearer {
        api_token: "t0k3n".to_string(),
    });

    let request = HttpRequest::new(Method::GET, mock_server.uri());
    client.execute(&request, Some(&auth)).await.unwrap();
}

#[test]
fn test_response_invalid_json_is_decode_error() {
    let response = HttpResponse::new(200, HeaderMap::new(), "not json", "http://x");
    let err = response.json().unwrap_err();
    assert!(matches!(err, crate::error::Error::Decode { .. }));
}

#[test]
fn test_response_header_lookup() {
    let mut headers = HeaderMap::new();
    headers.insert("x-next", HeaderValue::from_static("abc"));
    let response = HttpResponse::new(200, headers, "", "");
    assert_eq!(response.header("X-Next"), Some("abc"));
    assert!(response.retry_after().is_none());
}

#[test_case(BackoffType::Constant, &[100, 100, 100] ; "constant")]
#[test_case(BackoffType::Linear, &[100, 200, 300] ; "linear")]
#[test_case(BackoffType::Exponential, &[100, 200, 400] ; "exponential")]
fn test_calculate_backoff(backoff_type: BackoffType, expected_ms: &[u64]) {
    let client = client_with_backoff(backoff_type, Duration::from_secs(60));
    for (attempt, ms) in expected_ms.iter().enumerate() {
        assert_eq!(
            client.calculate_backoff(u32::try_from(attempt).unwrap()),
            Duration::from_millis(*ms)
        );
    }
}

#[test]
fn test_calculate_backoff_respects_max() {
    let client = client_with_backoff(BackoffType::Exponential, Duration::from_millis(500));
    assert_eq!(client.calculate_backoff(10), Duration::from_millis(500));
}

#[test]
fn test_retryable_statuses() {
    assert!(is_retryable_status(429));
    assert!(is_retryable_status(503));
    assert!(!is_retryable_status(404));
    assert!(!is_retryable_status(400));
}

#[test]
fn test_http_client_debug() {
    let debug = format!("{:?}", HttpClient::new().unwrap());
    assert!(debug.contains("HttpClient"));
    assert!(debug.contains("has_rate_limiter: true"));
}
