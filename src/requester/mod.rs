//! Requester module
//!
//! Sends the HTTP requests of a stream.
//!
//! # Overview
//!
//! - `Requester` - the contract the retriever talks to
//! - `HttpRequester` - URL base, templated path, static options, auth
//! - `DefaultErrorHandler` - maps statuses to `ResponseAction`s
//!
//! Transient failures (429, 5xx, timeouts, connection errors) are retried
//! with the client's backoff schedule. A `Retry-After` header overrides the
//! schedule.

mod http_requester;
mod types;

pub use http_requester::{HttpRequester, DEFAULT_MAX_RETRIES};
pub use types::{DefaultErrorHandler, ErrorHandler, Requester, ResponseAction};
