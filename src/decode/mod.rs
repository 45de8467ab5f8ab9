//! Response decoder module
//!
//! Supports: JSON, JSONL
//!
//! # Overview
//!
//! Decoders turn a buffered response body into JSON documents. Record
//! extraction from those documents is the selector's job. A malformed body
//! is a decode error for the page.

mod decoders;
mod types;

pub use decoders::{decoder_for, JsonDecoder, JsonlDecoder};
pub use types::{DecoderFormat, RecordDecoder};
