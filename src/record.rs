//! Records, slices and page tokens
//!
//! The values that flow between the retriever's collaborators. A `Record`
//! is immutable once produced; a `StreamSlice` describes one unit of
//! partitioned work; a `NextPageToken` is handed back into request building
//! for the following page.

use crate::types::{JsonObject, JsonValue, LogLevel};
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Key under which a paginator stores its own token value
pub const NEXT_PAGE_TOKEN_KEY: &str = "next_page_token";

/// Persisted per-stream state: `{cursor_field: value}` or `{"states": [...]}`
pub type StreamState = JsonObject;

// ============================================================================
// Stream Slice
// ============================================================================

/// One unit of partitioned work (a date window, a parent id, ...)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamSlice {
    /// Partition values (e.g. parent id)
    #[serde(default)]
    pub partition: JsonObject,
    /// Cursor values (e.g. start/end of a date window)
    #[serde(default)]
    pub cursor_slice: JsonObject,
    /// Values that do not identify the slice but travel with it
    #[serde(default, skip_serializing_if = "JsonObject::is_empty")]
    pub extra_fields: JsonObject,
}

impl StreamSlice {
    /// Create a slice from partition and cursor values
    pub fn new(partition: JsonObject, cursor_slice: JsonObject) -> Self {
        Self {
            partition,
            cursor_slice,
            extra_fields: JsonObject::new(),
        }
    }

    /// The empty slice used by unpartitioned streams
    pub fn empty() -> Self {
        Self::default()
    }

    /// Create a slice with only partition values
    pub fn from_partition(partition: JsonObject) -> Self {
        Self::new(partition, JsonObject::new())
    }

    /// Create a slice with only cursor values
    pub fn from_cursor(cursor_slice: JsonObject) -> Self {
        Self::new(JsonObject::new(), cursor_slice)
    }

    /// Attach an extra field
    #[must_use]
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.extra_fields.insert(key.into(), value.into());
        self
    }

    /// Look up a value in the partition first, then in the cursor slice
    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.partition
            .get(key)
            .or_else(|| self.cursor_slice.get(key))
    }

    /// Check whether the slice carries no partition or cursor values
    pub fn is_empty(&self) -> bool {
        self.partition.is_empty() && self.cursor_slice.is_empty()
    }

    /// Partition and cursor values merged into one mapping
    pub fn to_value(&self) -> JsonValue {
        let mut merged = self.partition.clone();
        for (key, value) in &self.cursor_slice {
            merged.insert(key.clone(), value.clone());
        }
        JsonValue::Object(merged)
    }

    /// Canonical key identifying the partition (sorted keys, compact JSON)
    pub fn partition_key(&self) -> String {
        partition_key(&self.partition)
    }
}

/// Canonical key for a partition mapping (keys sorted at every level)
pub fn partition_key(partition: &JsonObject) -> String {
    canonical(&JsonValue::Object(partition.clone())).to_string()
}

fn canonical(value: &JsonValue) -> JsonValue {
    match value {
        JsonValue::Object(map) => {
            let sorted: BTreeMap<&String, JsonValue> =
                map.iter().map(|(k, v)| (k, canonical(v))).collect();
            JsonValue::Object(
                sorted
                    .into_iter()
                    .map(|(k, v)| (k.clone(), v))
                    .collect(),
            )
        }
        JsonValue::Array(items) => JsonValue::Array(items.iter().map(canonical).collect()),
        other => other.clone(),
    }
}

// ============================================================================
// Record
// ============================================================================

/// A record extracted from an API response
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    data: JsonObject,
    associated_slice: Option<StreamSlice>,
    stream_name: String,
}

impl Record {
    /// Create a new record
    pub fn new(
        data: JsonObject,
        stream_name: impl Into<String>,
        associated_slice: Option<StreamSlice>,
    ) -> Self {
        Self {
            data,
            associated_slice,
            stream_name: stream_name.into(),
        }
    }

    /// The record payload
    pub fn data(&self) -> &JsonObject {
        &self.data
    }

    /// Consume the record and return its payload
    pub fn into_data(self) -> JsonObject {
        self.data
    }

    /// The slice this record was read for
    pub fn associated_slice(&self) -> Option<&StreamSlice> {
        self.associated_slice.as_ref()
    }

    /// Name of the stream that produced this record
    pub fn stream_name(&self) -> &str {
        &self.stream_name
    }

    /// Get a top-level field
    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.data.get(key)
    }

    /// Get a field by dotted path
    pub fn get_path(&self, path: &str) -> Option<&JsonValue> {
        let (head, rest) = match path.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (path, None),
        };
        let value = self.data.get(head)?;
        match rest {
            Some(rest) => crate::types::lookup_path(value, rest),
            None => Some(value),
        }
    }
}

// ============================================================================
// Next Page Token
// ============================================================================

/// Opaque mapping produced by a paginator for the following request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NextPageToken(JsonObject);

impl NextPageToken {
    /// Wrap a token value under the `next_page_token` key
    pub fn new(value: impl Into<JsonValue>) -> Self {
        let mut map = JsonObject::new();
        map.insert(NEXT_PAGE_TOKEN_KEY.to_string(), value.into());
        Self(map)
    }

    /// Build a token from an arbitrary mapping
    pub fn from_map(map: JsonObject) -> Self {
        Self(map)
    }

    /// The paginator's token value, if any
    pub fn value(&self) -> Option<&JsonValue> {
        self.0.get(NEXT_PAGE_TOKEN_KEY)
    }

    /// Get any entry of the token mapping
    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.0.get(key)
    }

    /// Add an entry to the token mapping
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// The underlying mapping
    pub fn as_map(&self) -> &JsonObject {
        &self.0
    }

    /// Token as a JSON value (for template contexts)
    pub fn to_value(&self) -> JsonValue {
        JsonValue::Object(self.0.clone())
    }
}

// ============================================================================
// Stream Data
// ============================================================================

/// A passthrough log message emitted alongside records
#[derive(Debug, Clone, PartialEq)]
pub struct LogMessage {
    /// Severity
    pub level: LogLevel,
    /// Message text
    pub message: String,
}

impl LogMessage {
    /// Create a log message
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }

    /// Create a debug log message
    pub fn debug(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Debug, message)
    }

    /// Create an info log message
    pub fn info(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Info, message)
    }
}

/// Item produced by a retriever: a typed record or a passthrough message
#[derive(Debug, Clone, PartialEq)]
pub enum StreamData {
    /// A record extracted from a response
    Record(Record),
    /// A log message, forwarded untouched
    Log(LogMessage),
}

impl StreamData {
    /// The record, if this item is one
    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Self::Record(record) => Some(record),
            Self::Log(_) => None,
        }
    }

    /// Check if this is a record
    pub fn is_record(&self) -> bool {
        matches!(self, Self::Record(_))
    }
}

/// Lazy sequence of slices. Finite and not restartable.
pub type SliceStream<'a> = BoxStream<'a, crate::error::Result<StreamSlice>>;

/// Lazy sequence of records and log messages. Finite and not restartable.
///
/// A consumer must drain it or drop it before reusing the retriever's
/// underlying connection for another read.
pub type StreamDataStream<'a> = BoxStream<'a, crate::error::Result<StreamData>>;
