//! Template interpolation for declarative components
//!
//! Handles `{{ variable }}` interpolation in paths, request options and
//! datetimes. Roots available to a template:
//!
//! - `config` - the connector's runtime configuration
//! - `stream_partition` - partition values of the current slice
//! - `stream_slice` - partition and cursor values of the current slice
//! - `next_page_token` - the paginator's token mapping
//! - `stream_state` - the stream's current state
//! - `record` - the record being transformed

use crate::error::{Error, Result};
use crate::record::{NextPageToken, StreamSlice, StreamState};
use crate::types::value_to_string;
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

/// Regex for matching template variables: {{ variable.path }}
static TEMPLATE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([a-zA-Z_][a-zA-Z0-9_]*(?:\.[a-zA-Z0-9_]+)*)\s*\}\}")
        .expect("template regex is valid")
});

/// Context for template interpolation
#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
    /// Connector configuration values
    pub config: Value,
    /// Current partition values
    pub stream_partition: Value,
    /// Current slice values (partition and cursor merged)
    pub stream_slice: Value,
    /// Current page token
    pub next_page_token: Value,
    /// Current stream state
    pub stream_state: Value,
    /// Record being transformed
    pub record: Value,
}

impl TemplateContext {
    /// Create a new empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Create context with config values
    pub fn with_config(config: Value) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// Set the current slice (fills both `stream_slice` and `stream_partition`)
    #[must_use]
    pub fn slice(mut self, slice: Option<&StreamSlice>) -> Self {
        if let Some(slice) = slice {
            self.stream_partition = Value::Object(slice.partition.clone());
            self.stream_slice = slice.to_value();
        }
        self
    }

    /// Set the current page token
    #[must_use]
    pub fn token(mut self, token: Option<&NextPageToken>) -> Self {
        if let Some(token) = token {
            self.next_page_token = token.to_value();
        }
        self
    }

    /// Set the current stream state
    #[must_use]
    pub fn state(mut self, state: &StreamState) -> Self {
        self.stream_state = Value::Object(state.clone());
        self
    }

    /// Set the record being transformed
    #[must_use]
    pub fn record(mut self, record: &crate::types::JsonObject) -> Self {
        self.record = Value::Object(record.clone());
        self
    }

    /// Get a value by path (e.g., "config.api_key")
    pub fn get(&self, path: &str) -> Option<&Value> {
        let parts: Vec<&str> = path.split('.').collect();

        let root = match parts[0] {
            "config" => &self.config,
            "stream_partition" => &self.stream_partition,
            "stream_slice" => &self.stream_slice,
            "next_page_token" => &self.next_page_token,
            "stream_state" => &self.stream_state,
            "record" => &self.record,
            // Bare names resolve against config
            _ => return get_nested_value(&self.config, &parts),
        };

        get_nested_value(root, &parts[1..])
    }
}

/// Get a nested value from a JSON value by path
fn get_nested_value<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    let mut current = value;
    for part in path {
        current = match current {
            Value::Object(map) => map.get(*part)?,
            Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Render a template string with the given context
///
/// Undefined variables are an error.
pub fn render(template: &str, ctx: &TemplateContext) -> Result<String> {
    let mut missing = Vec::new();
    let rendered = TEMPLATE_REGEX.replace_all(template, |caps: &regex::Captures<'_>| {
        let var_path = &caps[1];
        match ctx.get(var_path) {
            Some(value) => value_to_string(value),
            None => {
                missing.push(var_path.to_string());
                String::new()
            }
        }
    });

    if missing.is_empty() {
        Ok(rendered.into_owned())
    } else {
        Err(Error::undefined_var(missing.join(", ")))
    }
}

/// Render a template, substituting an empty string for undefined variables
///
/// Used for optional request options, where a missing value means "do not send".
pub fn render_lenient(template: &str, ctx: &TemplateContext) -> String {
    TEMPLATE_REGEX
        .replace_all(template, |caps: &regex::Captures<'_>| {
            ctx.get(&caps[1]).map(value_to_string).unwrap_or_default()
        })
        .into_owned()
}

/// Render a template that is exactly one variable, keeping the value's JSON type
///
/// `"{{ config.page_size }}"` with a numeric config value renders to a number
/// instead of a string. Anything else renders as a string.
pub fn render_typed(template: &str, ctx: &TemplateContext) -> Result<Value> {
    if let Some(caps) = TEMPLATE_REGEX.captures(template) {
        if caps.get(0).is_some_and(|m| m.as_str() == template.trim()) {
            return ctx
                .get(&caps[1])
                .cloned()
                .ok_or_else(|| Error::undefined_var(&caps[1]));
        }
    }
    render(template, ctx).map(Value::String)
}

/// Check if a string contains template variables
pub fn has_templates(s: &str) -> bool {
    TEMPLATE_REGEX.is_match(s)
}

/// Render all string values in a JSON object/value
pub fn render_value(value: &Value, ctx: &TemplateContext) -> Result<Value> {
    match value {
        Value::String(s) if has_templates(s) => render_typed(s, ctx),
        Value::Object(map) => {
            let mut new_map = serde_json::Map::new();
            for (k, v) in map {
                let new_key = if has_templates(k) {
                    render(k, ctx)?
                } else {
                    k.clone()
                };
                new_map.insert(new_key, render_value(v, ctx)?);
            }
            Ok(Value::Object(new_map))
        }
        Value::Array(arr) => arr
            .iter()
            .map(|v| render_value(v, ctx))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        _ => Ok(value.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_simple_substitution() {
        let ctx = TemplateContext::with_config(json!({
            "api_key": "sk_test_123"
        }));

        let result = render("Bearer {{ config.api_key }}", &ctx).unwrap();
        assert_eq!(result, "Bearer sk_test_123");
    }

    #[test]
    fn test_nested_value() {
        let ctx = TemplateContext::with_config(json!({
            "credentials": {"client_id": "my-client"}
        }));

        let result = render("Client: {{ config.credentials.client_id }}", &ctx).unwrap();
        assert_eq!(result, "Client: my-client");
    }

    #[test]
    fn test_slice_and_partition_context() {
        let slice = StreamSlice::new(
            json!({"repo_id": "12345"}).as_object().cloned().unwrap(),
            json!({"start_time": "2024-01-01"}).as_object().cloned().unwrap(),
        );
        let ctx = TemplateContext::new().slice(Some(&slice));

        assert_eq!(
            render("/repos/{{ stream_partition.repo_id }}/issues", &ctx).unwrap(),
            "/repos/12345/issues"
        );
        assert_eq!(
            render("{{ stream_slice.repo_id }}@{{ stream_slice.start_time }}", &ctx).unwrap(),
            "12345@2024-01-01"
        );
    }

    #[test]
    fn test_token_context() {
        let token = NextPageToken::new("cursor-9");
        let ctx = TemplateContext::new().token(Some(&token));
        assert_eq!(
            render("{{ next_page_token.next_page_token }}", &ctx).unwrap(),
            "cursor-9"
        );
    }

    #[test]
    fn test_undefined_variable() {
        let ctx = TemplateContext::new();
        let result = render("{{ config.missing }}", &ctx);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("config.missing"));
    }

    #[test]
    fn test_render_lenient() {
        let ctx = TemplateContext::with_config(json!({"key": "value"}));
        assert_eq!(render_lenient("a={{ config.key }}", &ctx), "a=value");
        assert_eq!(render_lenient("{{ config.missing }}", &ctx), "");
    }

    #[test]
    fn test_render_typed_keeps_numbers() {
        let ctx = TemplateContext::with_config(json!({"limit": 100}));
        assert_eq!(render_typed("{{ config.limit }}", &ctx).unwrap(), json!(100));
        assert_eq!(
            render_typed("n={{ config.limit }}", &ctx).unwrap(),
            json!("n=100")
        );
    }

    #[test]
    fn test_has_templates() {
        assert!(has_templates("{{ config.key }}"));
        assert!(has_templates("prefix {{ var }} suffix"));
        assert!(!has_templates("no templates here"));
        assert!(!has_templates("{ not a template }"));
    }

    #[test]
    fn test_render_value_object() {
        let ctx = TemplateContext::with_config(json!({"key": "value123", "size": 50}));

        let input = json!({
            "header": "X-API-Key",
            "value": "{{ config.key }}",
            "page_size": "{{ config.size }}"
        });

        let result = render_value(&input, &ctx).unwrap();
        assert_eq!(
            result,
            json!({
                "header": "X-API-Key",
                "value": "value123",
                "page_size": 50
            })
        );
    }

    #[test]
    fn test_whitespace_in_template() {
        let ctx = TemplateContext::with_config(json!({"key": "value"}));

        assert_eq!(render("{{config.key}}", &ctx).unwrap(), "value");
        assert_eq!(render("{{ config.key }}", &ctx).unwrap(), "value");
        assert_eq!(render("{{  config.key  }}", &ctx).unwrap(), "value");
    }
}
