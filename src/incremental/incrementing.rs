//! Incrementing count cursor

use super::types::{advance, lock, CursorValue, DeclarativeCursor};
use crate::error::{Error, Result};
use crate::partition::StreamSlicer;
use crate::record::{NextPageToken, Record, SliceStream, StreamSlice, StreamState};
use crate::request_options::{RequestOption, RequestOptions, RequestOptionsProvider};
use crate::types::{JsonObject, JsonValue};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// Slice key holding the lower bound of an incrementing cursor
pub const INCREMENTING_START_KEY: &str = "start";

/// Declarative definition of an incrementing cursor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncrementingCursorConfig {
    /// Record field holding the counter
    pub cursor_field: String,
    /// Lower bound when there is no state yet
    #[serde(default)]
    pub start_value: Option<JsonValue>,
    /// Injection of the lower bound into requests
    #[serde(default)]
    pub start_value_option: Option<RequestOption>,
}

/// Cursor over a monotonically increasing numeric field (ids, sequence numbers)
///
/// Reads everything from the last seen value in a single slice.
#[derive(Debug)]
pub struct IncrementingCountCursor {
    cursor_field: String,
    start_value: Option<CursorValue>,
    start_value_option: Option<RequestOption>,
    state: Mutex<Option<CursorValue>>,
}

impl IncrementingCountCursor {
    /// Create a cursor over `cursor_field`
    pub fn new(cursor_field: impl Into<String>) -> Self {
        Self {
            cursor_field: cursor_field.into(),
            start_value: None,
            start_value_option: None,
            state: Mutex::new(None),
        }
    }

    /// Build a cursor from its declarative definition
    pub fn from_config(definition: &IncrementingCursorConfig) -> Result<Self> {
        let mut cursor = Self::new(&definition.cursor_field);
        if let Some(start) = &definition.start_value {
            let start = CursorValue::number_from_json(start).ok_or_else(|| {
                Error::invalid_value("start_value", format!("expected a number, got {start}"))
            })?;
            cursor.start_value = Some(start);
        }
        cursor.start_value_option = definition.start_value_option.clone();
        Ok(cursor)
    }

    /// Lower bound when there is no state yet
    #[must_use]
    pub fn with_start_value(mut self, start: f64) -> Self {
        self.start_value = Some(CursorValue::Number(start));
        self
    }

    /// Inject the lower bound into requests
    #[must_use]
    pub fn with_start_value_option(mut self, option: RequestOption) -> Self {
        self.start_value_option = Some(option);
        self
    }

    fn lower_bound(&self) -> Option<CursorValue> {
        lock(&self.state).clone().or_else(|| self.start_value.clone())
    }
}

impl RequestOptionsProvider for IncrementingCountCursor {
    fn request_options(
        &self,
        stream_slice: Option<&StreamSlice>,
        _next_page_token: Option<&NextPageToken>,
    ) -> Result<RequestOptions> {
        let mut options = RequestOptions::new();
        if let (Some(option), Some(value)) = (
            &self.start_value_option,
            stream_slice.and_then(|s| s.cursor_slice.get(INCREMENTING_START_KEY)),
        ) {
            option.inject(value.clone(), &mut options);
        }
        Ok(options)
    }
}

impl StreamSlicer for IncrementingCountCursor {
    fn stream_slices(&self) -> SliceStream<'_> {
        let mut cursor_slice = JsonObject::new();
        if let Some(start) = self.lower_bound() {
            cursor_slice.insert(INCREMENTING_START_KEY.to_string(), start.to_json());
        }
        stream::once(async move { Ok(StreamSlice::from_cursor(cursor_slice)) }).boxed()
    }
}

impl DeclarativeCursor for IncrementingCountCursor {
    fn cursor_field(&self) -> &str {
        &self.cursor_field
    }

    fn set_initial_state(&self, stream_state: &StreamState) -> Result<()> {
        let value = match stream_state.get(&self.cursor_field) {
            None | Some(JsonValue::Null) => None,
            Some(value) => Some(CursorValue::number_from_json(value).ok_or_else(|| {
                Error::state(format!(
                    "cursor '{}' must be numeric, got {value}",
                    self.cursor_field
                ))
            })?),
        };
        *lock(&self.state) = value;
        Ok(())
    }

    fn get_stream_state(&self) -> StreamState {
        let mut state = StreamState::new();
        if let Some(value) = lock(&self.state).as_ref() {
            state.insert(self.cursor_field.clone(), value.to_json());
        }
        state
    }

    fn close_slice(
        &self,
        _stream_slice: &StreamSlice,
        most_recent_record: Option<&Record>,
    ) -> Result<()> {
        if let Some(value) = most_recent_record.and_then(|r| self.record_cursor_value(r)) {
            advance(&self.state, value);
        }
        Ok(())
    }

    fn should_be_synced(&self, record: &Record) -> bool {
        match (self.record_cursor_value(record), self.lower_bound()) {
            (Some(value), Some(bound)) => value >= bound,
            _ => true,
        }
    }

    fn record_cursor_value(&self, record: &Record) -> Option<CursorValue> {
        record
            .get_path(&self.cursor_field)
            .and_then(CursorValue::number_from_json)
    }
}
