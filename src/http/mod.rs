//! HTTP client module
//!
//! Provides the transport used by requesters.
//!
//! # Features
//!
//! - **Buffered Responses**: `HttpResponse` keeps status, headers and body so
//!   paginators and selectors can inspect the same page
//! - **Rate Limiting**: Token bucket rate limiter using governor
//! - **Backoff Strategies**: Constant, linear, and exponential backoff
//! - **Authentication**: Integration with auth module

mod client;
mod rate_limit;

pub use client::{
    is_retryable_status, HttpBody, HttpClient, HttpClientConfig, HttpRequest, HttpResponse,
};
pub use rate_limit::{RateLimiter, RateLimiterConfig};

#[cfg(test)]
mod tests;
