//! Record selector
//!
//! decode → extract → filter → transform → normalize → `Record`

use super::extractor::DpathExtractor;
use super::filter::RecordFilter;
use super::transform::RecordTransformation;
use crate::decode::{JsonDecoder, RecordDecoder};
use crate::error::{Error, Result};
use crate::http::HttpResponse;
use crate::record::{NextPageToken, Record, StreamSlice, StreamState};
use crate::template::TemplateContext;
use crate::types::{JsonObject, JsonValue};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Turns one response into records
///
/// Implementations are side-effect free: selecting twice from the same
/// response yields the same records.
pub trait RecordSelector: Send + Sync + std::fmt::Debug {
    /// Select the records of one page
    fn select_records(
        &self,
        response: &HttpResponse,
        stream_state: &StreamState,
        records_schema: &JsonValue,
        stream_slice: &StreamSlice,
        next_page_token: Option<&NextPageToken>,
    ) -> Result<Vec<Record>>;
}

// ============================================================================
// Schema Normalization
// ============================================================================

/// How records are conformed to the stream's JSON schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaNormalization {
    /// Leave records untouched
    #[default]
    None,
    /// Cast top-level scalars to the type the schema declares, when lossless
    Default,
}

impl SchemaNormalization {
    /// Normalize a record payload in place
    pub fn apply(self, data: &mut JsonObject, records_schema: &JsonValue) {
        if self == Self::None {
            return;
        }
        let Some(properties) = records_schema
            .get("properties")
            .and_then(JsonValue::as_object)
        else {
            return;
        };

        for (field, value) in data.iter_mut() {
            let Some(declared) = properties.get(field).and_then(|p| p.get("type")) else {
                continue;
            };
            let types: Vec<&str> = match declared {
                JsonValue::String(t) => vec![t.as_str()],
                JsonValue::Array(ts) => ts.iter().filter_map(JsonValue::as_str).collect(),
                _ => continue,
            };
            if let Some(cast) = cast_value(value, &types) {
                *value = cast;
            }
        }
    }
}

fn cast_value(value: &JsonValue, types: &[&str]) -> Option<JsonValue> {
    let matches = |t: &str| match value {
        JsonValue::Null => t == "null",
        JsonValue::Bool(_) => t == "boolean",
        JsonValue::Number(n) => t == "number" || (t == "integer" && n.is_i64()),
        JsonValue::String(_) => t == "string",
        JsonValue::Array(_) => t == "array",
        JsonValue::Object(_) => t == "object",
    };
    if types.iter().any(|t| matches(t)) {
        return None;
    }

    types.iter().find_map(|t| match (*t, value) {
        ("integer", JsonValue::String(s)) => s.trim().parse::<i64>().ok().map(JsonValue::from),
        ("number", JsonValue::String(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(JsonValue::Number),
        ("boolean", JsonValue::String(s)) => match s.trim() {
            "true" => Some(JsonValue::Bool(true)),
            "false" => Some(JsonValue::Bool(false)),
            _ => None,
        },
        ("string", JsonValue::Number(n)) => Some(JsonValue::String(n.to_string())),
        ("string", JsonValue::Bool(b)) => Some(JsonValue::String(b.to_string())),
        _ => None,
    })
}

// ============================================================================
// Default Record Selector
// ============================================================================

/// Standard selector composed of a decoder, an extractor, filters and
/// transformations
#[derive(Debug)]
pub struct DefaultRecordSelector {
    stream_name: String,
    decoder: Box<dyn RecordDecoder>,
    extractor: DpathExtractor,
    filters: Vec<Arc<dyn RecordFilter>>,
    transformations: Vec<RecordTransformation>,
    schema_normalization: SchemaNormalization,
    config: JsonValue,
}

impl DefaultRecordSelector {
    /// Create a JSON selector for a stream
    pub fn new(stream_name: impl Into<String>, extractor: DpathExtractor) -> Self {
        Self {
            stream_name: stream_name.into(),
            decoder: Box::new(JsonDecoder),
            extractor,
            filters: Vec::new(),
            transformations: Vec::new(),
            schema_normalization: SchemaNormalization::None,
            config: JsonValue::Null,
        }
    }

    /// Use another decoder
    #[must_use]
    pub fn with_decoder(mut self, decoder: Box<dyn RecordDecoder>) -> Self {
        self.decoder = decoder;
        self
    }

    /// Add a filter; records must pass every filter
    #[must_use]
    pub fn with_filter(mut self, filter: Arc<dyn RecordFilter>) -> Self {
        self.filters.push(filter);
        self
    }

    /// Add a transformation
    #[must_use]
    pub fn with_transformation(mut self, transformation: RecordTransformation) -> Self {
        self.transformations.push(transformation);
        self
    }

    /// Set schema normalization
    #[must_use]
    pub fn with_schema_normalization(mut self, normalization: SchemaNormalization) -> Self {
        self.schema_normalization = normalization;
        self
    }

    /// Bind the connector configuration used by templates
    #[must_use]
    pub fn with_config(mut self, config: JsonValue) -> Self {
        self.extractor = self.extractor.with_config(config.clone());
        self.config = config;
        self
    }
}

impl RecordSelector for DefaultRecordSelector {
    fn select_records(
        &self,
        response: &HttpResponse,
        stream_state: &StreamState,
        records_schema: &JsonValue,
        stream_slice: &StreamSlice,
        next_page_token: Option<&NextPageToken>,
    ) -> Result<Vec<Record>> {
        let ctx = TemplateContext::with_config(self.config.clone())
            .slice(Some(stream_slice))
            .token(next_page_token)
            .state(stream_state);

        let mut records = Vec::new();
        for document in self.decoder.decode(response)? {
            for raw in self.extractor.extract(document)? {
                let data = match raw {
                    JsonValue::Object(data) => data,
                    other => {
                        return Err(Error::decode(format!(
                            "stream '{}': expected a JSON object record, got {other}",
                            self.stream_name
                        )))
                    }
                };

                let record = Record::new(data, &self.stream_name, Some(stream_slice.clone()));
                if !self.filters.iter().all(|filter| filter.keep(&record)) {
                    continue;
                }

                let mut data = record.into_data();
                for transformation in &self.transformations {
                    transformation.apply(&mut data, &ctx)?;
                }
                self.schema_normalization.apply(&mut data, records_schema);

                records.push(Record::new(
                    data,
                    &self.stream_name,
                    Some(stream_slice.clone()),
                ));
            }
        }
        Ok(records)
    }
}
