//! Authentication module
//!
//! Supports: API Key, Basic, Bearer, OAuth2 (client credentials and refresh
//! token grants), Custom Headers
//!
//! The `Authenticator` is owned by the requester and applied to every
//! outgoing request. OAuth2 access tokens are cached until they expire.

mod authenticator;
mod types;

pub use authenticator::Authenticator;
pub use types::{AuthConfig, CachedToken};

#[cfg(test)]
mod tests;
