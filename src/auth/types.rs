//! Auth configuration types
//!
//! These types represent the runtime auth configuration after the manifest's
//! templates have been rendered against the connector config.

use crate::request_options::RequestOption;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Authentication configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthConfig {
    /// No authentication required
    #[default]
    None,

    /// API key injected as a header or query parameter
    ApiKey {
        /// The key value
        api_token: String,
        /// Where the key goes
        inject_into: RequestOption,
        /// Prefix to add before the value (e.g., "Token ")
        #[serde(default)]
        prefix: Option<String>,
    },

    /// HTTP Basic authentication
    Basic {
        /// Username
        username: String,
        /// Password
        #[serde(default)]
        password: String,
    },

    /// Static bearer token
    Bearer {
        /// The bearer token
        api_token: String,
    },

    /// OAuth2 client credentials grant
    Oauth2ClientCredentials {
        /// Token endpoint URL
        token_refresh_endpoint: String,
        /// Client ID
        client_id: String,
        /// Client secret
        client_secret: String,
        /// Requested scopes
        #[serde(default)]
        scopes: Vec<String>,
        /// Additional token request form fields
        #[serde(default)]
        refresh_request_body: HashMap<String, String>,
    },

    /// OAuth2 refresh token grant
    Oauth2Refresh {
        /// Token endpoint URL
        token_refresh_endpoint: String,
        /// Client ID
        client_id: String,
        /// Client secret
        client_secret: String,
        /// Long-lived refresh token
        refresh_token: String,
    },

    /// Fixed set of headers
    CustomHeaders {
        /// Headers to add to each request
        headers: HashMap<String, String>,
    },
}

impl AuthConfig {
    /// Check if requests go out unauthenticated
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Check if this config needs a token from a remote endpoint
    pub fn requires_token_refresh(&self) -> bool {
        matches!(
            self,
            Self::Oauth2ClientCredentials { .. } | Self::Oauth2Refresh { .. }
        )
    }
}

/// Cached access token with expiration
#[derive(Debug, Clone)]
pub struct CachedToken {
    /// The access token
    pub access_token: String,
    /// When the token expires
    pub expires_at: Option<DateTime<Utc>>,
}

impl CachedToken {
    /// Create a new cached token
    pub fn new(access_token: String, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            access_token,
            expires_at,
        }
    }

    /// Create a token that expires in N seconds from now
    pub fn expires_in(access_token: String, seconds: i64) -> Self {
        let expires_at = Utc::now() + chrono::Duration::seconds(seconds);
        Self::new(access_token, Some(expires_at))
    }

    /// Check if the token is expired (30 second buffer)
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => Utc::now() + chrono::Duration::seconds(30) >= expires_at,
            None => false,
        }
    }
}

#[cfg(test)]
mod type_tests {
    use super::*;
    use crate::request_options::RequestOptionType;
    use serde_json::json;

    #[test]
    fn test_cached_token_expiry() {
        assert!(!CachedToken::expires_in("t".to_string(), 3600).is_expired());
        assert!(CachedToken::expires_in("t".to_string(), -100).is_expired());
        assert!(!CachedToken::new("t".to_string(), None).is_expired());
    }

    #[test]
    fn test_auth_config_from_manifest_shape() {
        let config: AuthConfig = serde_json::from_value(json!({
            "type": "api_key",
            "api_token": "secret",
            "inject_into": {"inject_into": "request_parameter", "field_name": "key"}
        }))
        .unwrap();

        match config {
            AuthConfig::ApiKey {
                api_token,
                inject_into,
                prefix,
            } => {
                assert_eq!(api_token, "secret");
                assert_eq!(inject_into.inject_into, RequestOptionType::RequestParameter);
                assert_eq!(inject_into.field_name, "key");
                assert!(prefix.is_none());
            }
            other => panic!("unexpected auth config: {other:?}"),
        }
    }

    #[test]
    fn test_auth_config_default() {
        let config = AuthConfig::default();
        assert!(config.is_none());
        assert!(!config.requires_token_refresh());
    }
}
