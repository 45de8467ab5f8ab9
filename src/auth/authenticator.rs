//! Authenticator implementation
//!
//! Applies credentials to outgoing requests and keeps OAuth2 access tokens
//! cached until they expire.

use super::types::{AuthConfig, CachedToken};
use crate::error::{Error, Result};
use crate::request_options::RequestOptionType;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Applies authentication to HTTP requests
pub struct Authenticator {
    config: AuthConfig,
    cached_token: Arc<RwLock<Option<CachedToken>>>,
    http_client: Client,
}

impl Authenticator {
    /// Create a new authenticator with the given config
    pub fn new(config: AuthConfig) -> Self {
        Self::with_client(config, Client::new())
    }

    /// Create an authenticator that fetches tokens with the given client
    pub fn with_client(config: AuthConfig, http_client: Client) -> Self {
        Self {
            config,
            cached_token: Arc::new(RwLock::new(None)),
            http_client,
        }
    }

    /// Apply authentication to a request builder
    pub async fn apply(&self, req: RequestBuilder) -> Result<RequestBuilder> {
        match &self.config {
            AuthConfig::None => Ok(req),

            AuthConfig::ApiKey {
                api_token,
                inject_into,
                prefix,
            } => {
                let value = format!("{}{}", prefix.as_deref().unwrap_or(""), api_token);
                let name = inject_into.field_name.as_str();
                match inject_into.inject_into {
                    RequestOptionType::Header => Ok(req.header(name, value)),
                    RequestOptionType::RequestParameter => Ok(req.query(&[(name, value)])),
                    other => Err(Error::invalid_option(format!(
                        "API key cannot be injected into {other:?}"
                    ))),
                }
            }

            AuthConfig::Basic { username, password } => {
                Ok(req.basic_auth(username, Some(password)))
            }

            AuthConfig::Bearer { api_token } => Ok(req.bearer_auth(api_token)),

            AuthConfig::Oauth2ClientCredentials { .. } | AuthConfig::Oauth2Refresh { .. } => {
                let token = self.get_or_refresh_token().await?;
                Ok(req.bearer_auth(token))
            }

            AuthConfig::CustomHeaders { headers } => Ok(headers
                .iter()
                .fold(req, |req, (key, value)| req.header(key.as_str(), value.as_str()))),
        }
    }

    /// Get a valid access token, refreshing if necessary
    async fn get_or_refresh_token(&self) -> Result<String> {
        {
            let cached = self.cached_token.read().await;
            if let Some(token) = cached.as_ref().filter(|t| !t.is_expired()) {
                return Ok(token.access_token.clone());
            }
        }

        let mut cached = self.cached_token.write().await;

        // Another task may have refreshed while we waited for the write lock
        if let Some(token) = cached.as_ref().filter(|t| !t.is_expired()) {
            return Ok(token.access_token.clone());
        }

        let new_token = self.fetch_new_token().await?;
        let access_token = new_token.access_token.clone();
        *cached = Some(new_token);
        Ok(access_token)
    }

    async fn fetch_new_token(&self) -> Result<CachedToken> {
        match &self.config {
            AuthConfig::Oauth2ClientCredentials {
                token_refresh_endpoint,
                client_id,
                client_secret,
                scopes,
                refresh_request_body,
            } => {
                let mut form = vec![
                    ("grant_type".to_string(), "client_credentials".to_string()),
                    ("client_id".to_string(), client_id.clone()),
                    ("client_secret".to_string(), client_secret.clone()),
                ];
                if !scopes.is_empty() {
                    form.push(("scope".to_string(), scopes.join(" ")));
                }
                form.extend(
                    refresh_request_body
                        .iter()
                        .map(|(k, v)| (k.clone(), v.clone())),
                );

                self.request_token(token_refresh_endpoint, &form)
                    .await
                    .map_err(|message| Error::OAuth2 { message })
            }

            AuthConfig::Oauth2Refresh {
                token_refresh_endpoint,
                client_id,
                client_secret,
                refresh_token,
            } => {
                let form = vec![
                    ("grant_type".to_string(), "refresh_token".to_string()),
                    ("client_id".to_string(), client_id.clone()),
                    ("client_secret".to_string(), client_secret.clone()),
                    ("refresh_token".to_string(), refresh_token.clone()),
                ];

                self.request_token(token_refresh_endpoint, &form)
                    .await
                    .map_err(|message| Error::TokenRefresh { message })
            }

            _ => Err(Error::auth(
                "Token refresh not supported for this auth type",
            )),
        }
    }

    /// POST a token request; failures are returned as a message for the caller to classify
    async fn request_token(
        &self,
        endpoint: &str,
        form: &[(String, String)],
    ) -> std::result::Result<CachedToken, String> {
        debug!(endpoint, "Requesting access token");

        let response = self
            .http_client
            .post(endpoint)
            .form(form)
            .send()
            .await
            .map_err(|e| format!("Token request failed: {e}"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(format!(
                "Token request failed with status {}: {body}",
                status.as_u16()
            ));
        }

        let token_response: TokenResponse = response
            .json()
            .await
            .map_err(|e| format!("Invalid token response: {e}"))?;
        Ok(token_response.into_cached_token())
    }

    /// Drop the cached token so the next request fetches a fresh one
    pub async fn clear_cache(&self) {
        *self.cached_token.write().await = None;
    }

    /// Get the current auth config
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match &self.config {
            AuthConfig::None => "none",
            AuthConfig::ApiKey { .. } => "api_key",
            AuthConfig::Basic { .. } => "basic",
            AuthConfig::Bearer { .. } => "bearer",
            AuthConfig::Oauth2ClientCredentials { .. } => "oauth2_client_credentials",
            AuthConfig::Oauth2Refresh { .. } => "oauth2_refresh",
            AuthConfig::CustomHeaders { .. } => "custom_headers",
        };
        f.debug_struct("Authenticator")
            .field("type", &kind)
            .finish_non_exhaustive()
    }
}

/// OAuth2 token response
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

impl TokenResponse {
    fn into_cached_token(self) -> CachedToken {
        match self.expires_in {
            Some(secs) => CachedToken::expires_in(self.access_token, secs),
            None => CachedToken::new(self.access_token, None),
        }
    }
}
