//! Decoder implementations
//!
//! Each decoder handles a specific response format.

use super::types::{DecoderFormat, RecordDecoder};
use crate::error::{Error, Result};
use crate::http::HttpResponse;
use serde_json::Value;

/// Create the decoder for a format
pub fn decoder_for(format: DecoderFormat) -> Box<dyn RecordDecoder> {
    match format {
        DecoderFormat::Json => Box::new(JsonDecoder),
        DecoderFormat::Jsonl => Box::new(JsonlDecoder),
    }
}

// ============================================================================
// JSON Decoder
// ============================================================================

/// The whole body is one JSON document; an empty body yields none
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonDecoder;

impl RecordDecoder for JsonDecoder {
    fn decode(&self, response: &HttpResponse) -> Result<Vec<Value>> {
        if response.body().iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }

        let value: Value = serde_json::from_slice(response.body()).map_err(|e| {
            Error::decode(format!("Failed to parse JSON from {}: {e}", response.url()))
        })?;
        Ok(vec![value])
    }
}

// ============================================================================
// JSONL Decoder
// ============================================================================

/// JSON Lines decoder (one JSON document per line)
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonlDecoder;

impl RecordDecoder for JsonlDecoder {
    fn decode(&self, response: &HttpResponse) -> Result<Vec<Value>> {
        let body = response.text();
        let mut documents = Vec::new();

        for (line_num, line) in body.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let value: Value = serde_json::from_str(line).map_err(|e| {
                Error::decode(format!("Failed to parse JSONL at line {}: {e}", line_num + 1))
            })?;
            documents.push(value);
        }

        Ok(documents)
    }
}
