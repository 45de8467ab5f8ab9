//! Record filters

use crate::incremental::DeclarativeCursor;
use crate::record::Record;
use crate::types::JsonValue;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Decides whether a record is kept
pub trait RecordFilter: Send + Sync + std::fmt::Debug {
    /// `true` keeps the record
    fn keep(&self, record: &Record) -> bool;
}

/// Filter on the value at a dotted path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldFilter {
    /// Keep records whose field equals `value`
    FieldEquals {
        /// Dotted path into the record
        path: String,
        /// Expected value
        value: JsonValue,
    },
    /// Keep records whose field is missing or differs from `value`
    FieldNotEquals {
        /// Dotted path into the record
        path: String,
        /// Rejected value
        value: JsonValue,
    },
}

impl FieldFilter {
    /// Keep records where `path` equals `value`
    pub fn equals(path: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        Self::FieldEquals {
            path: path.into(),
            value: value.into(),
        }
    }

    /// Keep records where `path` does not equal `value`
    pub fn not_equals(path: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        Self::FieldNotEquals {
            path: path.into(),
            value: value.into(),
        }
    }
}

impl RecordFilter for FieldFilter {
    fn keep(&self, record: &Record) -> bool {
        match self {
            Self::FieldEquals { path, value } => record.get_path(path) == Some(value),
            Self::FieldNotEquals { path, value } => record.get_path(path) != Some(value),
        }
    }
}

/// Client-side incremental filter: keeps records the cursor still has to sync
#[derive(Debug, Clone)]
pub struct CursorFilter {
    cursor: Arc<dyn DeclarativeCursor>,
}

impl CursorFilter {
    /// Filter by `cursor`
    pub fn new(cursor: Arc<dyn DeclarativeCursor>) -> Self {
        Self { cursor }
    }
}

impl RecordFilter for CursorFilter {
    fn keep(&self, record: &Record) -> bool {
        self.cursor.should_be_synced(record)
    }
}
