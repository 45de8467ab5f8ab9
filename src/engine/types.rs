//! Engine types
//!
//! Message types, stream definition and configuration for the sync engine.

use crate::retriever::Retriever;
use crate::types::{JsonObject, JsonValue, LogLevel, SyncMode};
use serde::Serialize;
use std::sync::Arc;

/// A message emitted during sync
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Message {
    /// One record
    Record {
        /// Stream name
        stream: String,
        /// Record payload
        data: JsonObject,
    },
    /// State checkpoint
    State {
        /// Stream name
        stream: String,
        /// Stream state as the cursor reports it
        data: JsonValue,
    },
    /// Log message
    Log {
        /// Log level
        level: LogLevel,
        /// Log message
        message: String,
    },
}

impl Message {
    /// Create a record message
    pub fn record(stream: impl Into<String>, data: JsonObject) -> Self {
        Self::Record {
            stream: stream.into(),
            data,
        }
    }

    /// Create a state message
    pub fn state(stream: impl Into<String>, data: JsonValue) -> Self {
        Self::State {
            stream: stream.into(),
            data,
        }
    }

    /// Create a log message
    pub fn log(level: LogLevel, message: impl Into<String>) -> Self {
        Self::Log {
            level,
            message: message.into(),
        }
    }

    /// Create an info log
    pub fn info(message: impl Into<String>) -> Self {
        Self::log(LogLevel::Info, message)
    }

    /// Create a debug log
    pub fn debug(message: impl Into<String>) -> Self {
        Self::log(LogLevel::Debug, message)
    }

    /// Create a warning log
    pub fn warn(message: impl Into<String>) -> Self {
        Self::log(LogLevel::Warn, message)
    }

    /// Create an error log
    pub fn error(message: impl Into<String>) -> Self {
        Self::log(LogLevel::Error, message)
    }

    /// Check if this is a record message
    pub fn is_record(&self) -> bool {
        matches!(self, Self::Record { .. })
    }

    /// Check if this is a state message
    pub fn is_state(&self) -> bool {
        matches!(self, Self::State { .. })
    }

    /// Check if this is a log message
    pub fn is_log(&self) -> bool {
        matches!(self, Self::Log { .. })
    }
}

/// A stream ready to be read
#[derive(Clone)]
pub struct DeclarativeStream {
    /// Stream name
    pub name: String,
    /// Primary key paths
    pub primary_key: Vec<Vec<String>>,
    /// Cursor field; `None` for full-refresh-only streams
    pub cursor_field: Option<String>,
    /// Reads the stream
    pub retriever: Arc<dyn Retriever>,
    /// JSON schema of the records
    pub schema: JsonValue,
}

impl DeclarativeStream {
    /// Create a full-refresh stream without schema
    pub fn new(name: impl Into<String>, retriever: Arc<dyn Retriever>) -> Self {
        Self {
            name: name.into(),
            primary_key: Vec::new(),
            cursor_field: None,
            retriever,
            schema: JsonValue::Null,
        }
    }

    /// Set the primary key
    #[must_use]
    pub fn with_primary_key(mut self, primary_key: Vec<Vec<String>>) -> Self {
        self.primary_key = primary_key;
        self
    }

    /// Set the cursor field, making the stream incremental
    #[must_use]
    pub fn with_cursor_field(mut self, cursor_field: impl Into<String>) -> Self {
        self.cursor_field = Some(cursor_field.into());
        self
    }

    /// Set the record schema
    #[must_use]
    pub fn with_schema(mut self, schema: JsonValue) -> Self {
        self.schema = schema;
        self
    }

    /// Check if the stream can be read incrementally
    pub fn supports_incremental(&self) -> bool {
        self.cursor_field.is_some()
    }
}

impl std::fmt::Debug for DeclarativeStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeclarativeStream")
            .field("name", &self.name)
            .field("primary_key", &self.primary_key)
            .field("cursor_field", &self.cursor_field)
            .finish_non_exhaustive()
    }
}

/// Configuration for sync operation
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Full refresh or incremental
    pub sync_mode: SyncMode,
    /// Maximum records to sync per stream (0 = unlimited)
    pub max_records: usize,
    /// Whether to checkpoint state after every slice
    pub checkpoint_per_slice: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            sync_mode: SyncMode::FullRefresh,
            max_records: 0,
            checkpoint_per_slice: true,
        }
    }
}

impl SyncConfig {
    /// Create a new sync config
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the sync mode
    #[must_use]
    pub fn with_sync_mode(mut self, sync_mode: SyncMode) -> Self {
        self.sync_mode = sync_mode;
        self
    }

    /// Set max records
    #[must_use]
    pub fn with_max_records(mut self, max: usize) -> Self {
        self.max_records = max;
        self
    }

    /// Checkpoint after every slice
    #[must_use]
    pub fn with_checkpoint_per_slice(mut self, checkpoint: bool) -> Self {
        self.checkpoint_per_slice = checkpoint;
        self
    }
}

/// Statistics from a sync operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Total records synced
    pub records_synced: usize,
    /// Total slices fully read
    pub slices_synced: usize,
    /// Total streams synced
    pub streams_synced: usize,
    /// State checkpoints emitted
    pub checkpoints: usize,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

impl SyncStats {
    /// Create new stats
    pub fn new() -> Self {
        Self::default()
    }

    /// Add records
    pub fn add_records(&mut self, count: usize) {
        self.records_synced += count;
    }

    /// Add a slice
    pub fn add_slice(&mut self) {
        self.slices_synced += 1;
    }

    /// Add a stream
    pub fn add_stream(&mut self) {
        self.streams_synced += 1;
    }

    /// Add a checkpoint
    pub fn add_checkpoint(&mut self) {
        self.checkpoints += 1;
    }

    /// Set duration
    pub fn set_duration(&mut self, ms: u64) {
        self.duration_ms = ms;
    }
}
