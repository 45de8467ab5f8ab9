//! Record transformations
//!
//! Applied in order to every selected record.

use crate::error::{Error, Result};
use crate::template::{self, TemplateContext};
use crate::types::{JsonObject, JsonValue};
use serde::{Deserialize, Serialize};

/// A field added by `AddFields`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddedField {
    /// Path of the new field
    pub path: Vec<String>,
    /// Value, possibly a template over `record`, `config`, `stream_slice`
    /// and `stream_state`
    pub value: JsonValue,
}

/// Modification of a record's payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RecordTransformation {
    /// Add (or overwrite) fields
    AddFields {
        /// Fields to add
        fields: Vec<AddedField>,
    },
    /// Remove fields; missing fields are ignored
    RemoveFields {
        /// Paths of the fields to remove
        field_pointers: Vec<Vec<String>>,
    },
    /// Rename a top-level field; a missing field is ignored
    RenameField {
        /// Current name
        from: String,
        /// New name
        to: String,
    },
}

impl RecordTransformation {
    /// Add a single field
    pub fn add_field<S: Into<String>>(
        path: impl IntoIterator<Item = S>,
        value: impl Into<JsonValue>,
    ) -> Self {
        Self::AddFields {
            fields: vec![AddedField {
                path: path.into_iter().map(Into::into).collect(),
                value: value.into(),
            }],
        }
    }

    /// Remove a single field
    pub fn remove_field<S: Into<String>>(path: impl IntoIterator<Item = S>) -> Self {
        Self::RemoveFields {
            field_pointers: vec![path.into_iter().map(Into::into).collect()],
        }
    }

    /// Apply to a record payload
    ///
    /// `ctx` carries config, slice and state; the record itself is bound
    /// before each added value is rendered.
    pub fn apply(&self, data: &mut JsonObject, ctx: &TemplateContext) -> Result<()> {
        match self {
            Self::AddFields { fields } => {
                for field in fields {
                    let ctx = ctx.clone().record(data);
                    let value = template::render_value(&field.value, &ctx)?;
                    insert_path(data, &field.path, value)?;
                }
            }
            Self::RemoveFields { field_pointers } => {
                for pointer in field_pointers {
                    remove_path(data, pointer);
                }
            }
            Self::RenameField { from, to } => {
                if let Some(value) = data.remove(from) {
                    data.insert(to.clone(), value);
                }
            }
        }
        Ok(())
    }
}

fn insert_path(data: &mut JsonObject, path: &[String], value: JsonValue) -> Result<()> {
    let Some((last, parents)) = path.split_last() else {
        return Err(Error::config("added field needs a non-empty path"));
    };

    let mut current = data;
    for segment in parents {
        let next = current
            .entry(segment.clone())
            .or_insert_with(|| JsonValue::Object(JsonObject::new()));
        current = match next {
            JsonValue::Object(map) => map,
            _ => {
                return Err(Error::config(format!(
                    "cannot add field under non-object '{segment}'"
                )))
            }
        };
    }
    current.insert(last.clone(), value);
    Ok(())
}

fn remove_path(data: &mut JsonObject, path: &[String]) {
    let Some((last, parents)) = path.split_last() else {
        return;
    };

    let mut current = data;
    for segment in parents {
        match current.get_mut(segment) {
            Some(JsonValue::Object(map)) => current = map,
            _ => return,
        }
    }
    current.remove(last);
}
