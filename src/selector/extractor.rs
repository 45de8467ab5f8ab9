//! Record extraction from decoded documents

use crate::error::{Error, Result};
use crate::template::{self, TemplateContext};
use crate::types::JsonValue;
use serde::{Deserialize, Serialize};

/// Wildcard path segment
pub const WILDCARD: &str = "*";

/// Extracts records from a document by a list of path segments
///
/// An empty path yields the document itself: every element of an array, or
/// the object as a single record. A `*` segment fans out over every element
/// of an array or every value of an object. Missing paths yield no records.
/// Segments may be templates over `config`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DpathExtractor {
    /// Path segments from the document root
    #[serde(default)]
    pub field_path: Vec<String>,
    /// Runtime connector configuration for templated segments
    #[serde(skip)]
    pub config: JsonValue,
}

impl DpathExtractor {
    /// Create an extractor for a path
    pub fn new<S: Into<String>>(field_path: impl IntoIterator<Item = S>) -> Self {
        Self {
            field_path: field_path.into_iter().map(Into::into).collect(),
            config: JsonValue::Null,
        }
    }

    /// Create an extractor from a dotted path (`data.items`)
    pub fn from_dotted(path: &str) -> Self {
        let path = path.strip_prefix("$.").unwrap_or(path);
        if path.is_empty() || path == "$" {
            return Self::default();
        }
        Self::new(path.split('.'))
    }

    /// Bind the connector configuration used by templated segments
    #[must_use]
    pub fn with_config(mut self, config: JsonValue) -> Self {
        self.config = config;
        self
    }

    fn segments(&self) -> Result<Vec<String>> {
        let ctx = TemplateContext::with_config(self.config.clone());
        self.field_path
            .iter()
            .map(|segment| {
                if template::has_templates(segment) {
                    template::render(segment, &ctx)
                } else {
                    Ok(segment.clone())
                }
            })
            .collect()
    }

    /// Extract the raw records of one document
    pub fn extract(&self, document: JsonValue) -> Result<Vec<JsonValue>> {
        let segments = self.segments()?;
        if segments.is_empty() {
            return Ok(spread(document));
        }

        if segments.iter().any(|s| s == WILDCARD) {
            return extract_with_jsonpath(&document, &to_jsonpath(&segments));
        }

        let mut current = &document;
        for segment in &segments {
            current = match current {
                JsonValue::Object(map) => match map.get(segment) {
                    Some(next) => next,
                    None => return Ok(Vec::new()),
                },
                JsonValue::Array(items) => {
                    match segment.parse::<usize>().ok().and_then(|i| items.get(i)) {
                        Some(next) => next,
                        None => return Ok(Vec::new()),
                    }
                }
                _ => return Ok(Vec::new()),
            };
        }
        Ok(spread(current.clone()))
    }
}

/// Arrays become their elements; empty values become nothing
fn spread(value: JsonValue) -> Vec<JsonValue> {
    match value {
        JsonValue::Array(items) => items,
        JsonValue::Null => Vec::new(),
        JsonValue::Object(map) if map.is_empty() => Vec::new(),
        other => vec![other],
    }
}

/// Build a bracket-notation JSONPath from path segments
fn to_jsonpath(segments: &[String]) -> String {
    let mut path = String::from("$");
    for segment in segments {
        if segment == WILDCARD {
            path.push_str("[*]");
        } else if !segment.is_empty() && segment.chars().all(|c| c.is_ascii_digit()) {
            path.push_str(&format!("[{segment}]"));
        } else {
            path.push_str(&format!("['{}']", segment.replace('\'', "\\'")));
        }
    }
    path
}

/// Extract records using jsonpath-rust
fn extract_with_jsonpath(value: &JsonValue, path: &str) -> Result<Vec<JsonValue>> {
    use jsonpath_rust::JsonPath;

    let jp = JsonPath::try_from(path).map_err(|e| Error::JsonPath {
        message: format!("Invalid JSONPath: {e}"),
    })?;

    match jp.find(value) {
        JsonValue::Array(found) => Ok(found),
        JsonValue::Null => Ok(Vec::new()),
        other => Ok(vec![other]),
    }
}

#[cfg(test)]
mod path_tests {
    use super::*;

    #[test]
    fn test_to_jsonpath() {
        let segments: Vec<String> = ["data", "*", "0", "it's"]
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(to_jsonpath(&segments), r"$['data'][*][0]['it\'s']");
    }
}
