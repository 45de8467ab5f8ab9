//! Decoder types and traits
//!
//! Defines the core decoder abstractions.

use crate::error::Result;
use crate::http::HttpResponse;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Format of the response body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecoderFormat {
    /// JSON format (default)
    #[default]
    Json,
    /// JSON Lines format (one JSON document per line)
    Jsonl,
}

/// Turns a response body into JSON documents
///
/// Decoding is side-effect free: the response is only read.
pub trait RecordDecoder: Send + Sync + std::fmt::Debug {
    /// Decode the response body into documents
    fn decode(&self, response: &HttpResponse) -> Result<Vec<Value>>;
}
