//! Merging of request options from several providers

use super::types::{RequestBody, RequestOptions};
use crate::error::{Error, Result};
use crate::types::{JsonObject, JsonValue};

/// Merge option mappings in order
///
/// A key present in several mappings with the same value is kept once.
/// Differing values are a configuration conflict. Nested objects are merged
/// recursively, so two providers may contribute disjoint parts of the same
/// JSON body object.
pub fn combine_mappings(option: &str, mappings: &[JsonObject]) -> Result<JsonObject> {
    let mut combined = JsonObject::new();
    for mapping in mappings {
        merge_into(option, "", &mut combined, mapping)?;
    }
    Ok(combined)
}

fn merge_into(option: &str, prefix: &str, target: &mut JsonObject, source: &JsonObject) -> Result<()> {
    for (key, value) in source {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };

        match (target.get_mut(key), value) {
            (None, _) => {
                target.insert(key.clone(), value.clone());
            }
            (Some(JsonValue::Object(existing)), JsonValue::Object(incoming)) => {
                merge_into(option, &path, existing, incoming)?;
            }
            (Some(existing), incoming) if existing == incoming => {}
            (Some(_), _) => return Err(Error::conflict(option, path)),
        }
    }
    Ok(())
}

/// Merge non-JSON bodies
///
/// Forms are merged like mappings. A text body can only be used when it is
/// the sole non-empty contribution.
pub fn combine_bodies(bodies: &[RequestBody]) -> Result<RequestBody> {
    let non_empty: Vec<&RequestBody> = bodies.iter().filter(|b| !b.is_empty()).collect();

    match non_empty.as_slice() {
        [] => Ok(RequestBody::Empty),
        [single] => Ok((*single).clone()),
        many => {
            let mut forms = Vec::with_capacity(many.len());
            for body in many {
                match body {
                    RequestBody::Form(map) => forms.push(map.clone()),
                    RequestBody::Text(_) => {
                        return Err(Error::conflict("body_data", "<text body>"));
                    }
                    RequestBody::Empty => {}
                }
            }
            combine_mappings("body_data", &forms).map(RequestBody::Form)
        }
    }
}

/// Convert merged header options into name/value pairs
///
/// Every value must be a string.
pub fn into_headers(headers: &JsonObject) -> Result<Vec<(String, String)>> {
    headers
        .iter()
        .map(|(name, value)| match value {
            JsonValue::String(s) => Ok((name.clone(), s.clone())),
            other => Err(Error::invalid_option(format!(
                "header '{name}' must be a string, got {other}"
            ))),
        })
        .collect()
}

/// Merge whole option sets part by part
pub fn combine_options(option_sets: &[RequestOptions]) -> Result<RequestOptions> {
    let part = |f: fn(&RequestOptions) -> &JsonObject| -> Vec<JsonObject> {
        option_sets.iter().map(|o| f(o).clone()).collect()
    };
    let bodies: Vec<RequestBody> = option_sets.iter().map(|o| o.body_data.clone()).collect();

    Ok(RequestOptions {
        params: combine_mappings("request_params", &part(|o| &o.params))?,
        headers: combine_mappings("request_headers", &part(|o| &o.headers))?,
        body_data: combine_bodies(&bodies)?,
        body_json: combine_mappings("request_body_json", &part(|o| &o.body_json))?,
    })
}
