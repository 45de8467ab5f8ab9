//! Tests for the auth module

use super::*;
use crate::request_options::RequestOption;
use base64::Engine;
use std::collections::HashMap;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn build(auth: &Authenticator) -> reqwest::Request {
    let req = reqwest::Client::new().get("https://example.com/api");
    auth.apply(req).await.unwrap().build().unwrap()
}

fn client_credentials(server: &MockServer) -> AuthConfig {
    AuthConfig::Oauth2ClientCredentials {
        token_refresh_endpoint: format!("{}/oauth/token", server.uri()),
        client_id: "my-client".to_string(),
        client_secret: "my-secret".to_string(),
        scopes: vec!["read".to_string()],
        refresh_request_body: HashMap::new(),
    }
}

#[tokio::test]
async fn test_no_auth() {
    let built = build(&Authenticator::new(AuthConfig::None)).await;
    assert!(built.headers().get("Authorization").is_none());
}

#[tokio::test]
async fn test_api_key_header_with_prefix() {
    let auth = Authenticator::new(AuthConfig::ApiKey {
        api_token: "my-token".to_string(),
        inject_into: RequestOption::header("Authorization"),
        prefix: Some("Token ".to_string()),
    });

    let built = build(&auth).await;
    assert_eq!(built.headers().get("Authorization").unwrap(), "Token my-token");
}

#[tokio::test]
async fn test_api_key_query() {
    let auth = Authenticator::new(AuthConfig::ApiKey {
        api_token: "secret123".to_string(),
        inject_into: RequestOption::request_parameter("apikey"),
        prefix: None,
    });

    let built = build(&auth).await;
    assert!(built.url().query().unwrap().contains("apikey=secret123"));
}

#[tokio::test]
async fn test_api_key_body_rejected() {
    let auth = Authenticator::new(AuthConfig::ApiKey {
        api_token: "secret".to_string(),
        inject_into: RequestOption::body_json("key"),
        prefix: None,
    });

    let req = reqwest::Client::new().get("https://example.com/api");
    assert!(auth.apply(req).await.is_err());
}

#[tokio::test]
async fn test_basic_auth() {
    let auth = Authenticator::new(AuthConfig::Basic {
        username: "user".to_string(),
        password: "pass".to_string(),
    });

    let built = build(&auth).await;
    let header = built.headers().get("Authorization").unwrap().to_str().unwrap();
    let encoded = header.strip_prefix("Basic ").unwrap();
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .unwrap();
    assert_eq!(String::from_utf8(decoded).unwrap(), "user:pass");
}

#[tokio::test]
async fn test_bearer_auth() {
    let auth = Authenticator::new(AuthConfig::Bearer {
        api_token: "my-bearer-token".to_string(),
    });

    let built = build(&auth).await;
    assert_eq!(
        built.headers().get("Authorization").unwrap(),
        "Bearer my-bearer-token"
    );
}

#[tokio::test]
async fn test_custom_headers() {
    let mut headers = HashMap::new();
    headers.insert("X-Custom-1".to_string(), "value1".to_string());
    headers.insert("X-Custom-2".to_string(), "value2".to_string());

    let built = build(&Authenticator::new(AuthConfig::CustomHeaders { headers })).await;
    assert_eq!(built.headers().get("X-Custom-1").unwrap(), "value1");
    assert_eq!(built.headers().get("X-Custom-2").unwrap(), "value2");
}

#[tokio::test]
async fn test_oauth2_client_credentials() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_string_contains("grant_type=client_credentials"))
        .and(body_string_contains("client_id=my-client"))
        .and(body_string_contains("scope=read"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "oauth-token-123",
            "expires_in": 3600,
            "token_type": "Bearer"
        })))
        .mount(&mock_server)
        .await;

    let built = build(&Authenticator::new(client_credentials(&mock_server))).await;
    assert_eq!(
        built.headers().get("Authorization").unwrap(),
        "Bearer oauth-token-123"
    );
}

#[tokio::test]
async fn test_oauth2_token_caching() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "cached-token",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let auth = Authenticator::new(client_credentials(&mock_server));
    for _ in 0..3 {
        build(&auth).await;
    }
}

#[tokio::test]
async fn test_clear_cache_refetches() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "token",
            "expires_in": 3600
        })))
        .expect(2)
        .mount(&mock_server)
        .await;

    let auth = Authenticator::new(client_credentials(&mock_server));
    build(&auth).await;
    auth.clear_cache().await;
    build(&auth).await;
}

#[tokio::test]
async fn test_oauth2_refresh_token() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=my-refresh-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "refreshed-token"
        })))
        .mount(&mock_server)
        .await;

    let auth = Authenticator::new(AuthConfig::Oauth2Refresh {
        token_refresh_endpoint: format!("{}/oauth/token", mock_server.uri()),
        client_id: "client".to_string(),
        client_secret: "secret".to_string(),
        refresh_token: "my-refresh-token".to_string(),
    });

    let built = build(&auth).await;
    assert_eq!(
        built.headers().get("Authorization").unwrap(),
        "Bearer refreshed-token"
    );
}

#[tokio::test]
async fn test_oauth2_error_handling() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "error": "invalid_client"
        })))
        .mount(&mock_server)
        .await;

    let auth = Authenticator::new(client_credentials(&mock_server));
    let req = reqwest::Client::new().get("https://example.com/api");
    let err = auth.apply(req).await.unwrap_err();

    assert!(matches!(err, crate::error::Error::OAuth2 { .. }));
    assert!(err.to_string().contains("401"));
}
