//! Request option types and traits

use crate::error::Result;
use crate::record::{NextPageToken, StreamSlice, StreamState};
use crate::template::{self, TemplateContext};
use crate::types::{JsonObject, JsonValue};
use serde::{Deserialize, Serialize};

/// Part of the request a value is injected into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestOptionType {
    /// Query string parameter
    RequestParameter,
    /// HTTP header
    Header,
    /// Form-encoded body field
    BodyData,
    /// JSON body field
    BodyJson,
}

/// Describes where a single value is injected into a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestOption {
    /// Target part of the request
    pub inject_into: RequestOptionType,
    /// Parameter, header or body field name
    pub field_name: String,
}

impl RequestOption {
    /// Create a new request option
    pub fn new(inject_into: RequestOptionType, field_name: impl Into<String>) -> Self {
        Self {
            inject_into,
            field_name: field_name.into(),
        }
    }

    /// Inject as a query parameter
    pub fn request_parameter(field_name: impl Into<String>) -> Self {
        Self::new(RequestOptionType::RequestParameter, field_name)
    }

    /// Inject as a header
    pub fn header(field_name: impl Into<String>) -> Self {
        Self::new(RequestOptionType::Header, field_name)
    }

    /// Inject as a JSON body field
    pub fn body_json(field_name: impl Into<String>) -> Self {
        Self::new(RequestOptionType::BodyJson, field_name)
    }

    /// Inject as a form body field
    pub fn body_data(field_name: impl Into<String>) -> Self {
        Self::new(RequestOptionType::BodyData, field_name)
    }

    /// Write `value` into the matching part of `options`
    ///
    /// Headers always receive the string form of the value.
    pub fn inject(&self, value: JsonValue, options: &mut RequestOptions) {
        let key = self.field_name.clone();
        match self.inject_into {
            RequestOptionType::RequestParameter => {
                options.params.insert(key, value);
            }
            RequestOptionType::Header => {
                let value = JsonValue::String(crate::types::value_to_string(&value));
                options.headers.insert(key, value);
            }
            RequestOptionType::BodyJson => {
                options.body_json.insert(key, value);
            }
            RequestOptionType::BodyData => {
                options.body_data.form_mut().insert(key, value);
            }
        }
    }
}

/// Non-JSON request body
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RequestBody {
    /// No body
    #[default]
    Empty,
    /// Form fields, url-encoded on send
    Form(JsonObject),
    /// Raw text sent as is
    Text(String),
}

impl RequestBody {
    /// Check if there is nothing to send
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Form(map) => map.is_empty(),
            Self::Text(text) => text.is_empty(),
        }
    }

    /// Form fields, converting an empty body into an empty form
    pub fn form_mut(&mut self) -> &mut JsonObject {
        if !matches!(self, Self::Form(_)) {
            *self = Self::Form(JsonObject::new());
        }
        match self {
            Self::Form(map) => map,
            _ => unreachable!("body was just converted to a form"),
        }
    }
}

/// All options contributed to one request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestOptions {
    /// Query parameters
    pub params: JsonObject,
    /// Headers
    pub headers: JsonObject,
    /// Form or text body
    pub body_data: RequestBody,
    /// JSON body
    pub body_json: JsonObject,
}

impl RequestOptions {
    /// Create empty options
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a query parameter
    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Add a header
    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .insert(key.into(), JsonValue::String(value.into()));
        self
    }

    /// Add a JSON body field
    #[must_use]
    pub fn json_field(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.body_json.insert(key.into(), value.into());
        self
    }

    /// Check if no option is set
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
            && self.headers.is_empty()
            && self.body_data.is_empty()
            && self.body_json.is_empty()
    }
}

/// A component that contributes request options
///
/// Implementors override `request_options`; the per-part getters are derived
/// from it.
pub trait RequestOptionsProvider: Send + Sync {
    /// Options to add to the request for this slice and page
    fn request_options(
        &self,
        _stream_slice: Option<&StreamSlice>,
        _next_page_token: Option<&NextPageToken>,
    ) -> Result<RequestOptions> {
        Ok(RequestOptions::new())
    }

    /// Query parameters
    fn request_params(
        &self,
        stream_slice: Option<&StreamSlice>,
        next_page_token: Option<&NextPageToken>,
    ) -> Result<JsonObject> {
        Ok(self.request_options(stream_slice, next_page_token)?.params)
    }

    /// Headers
    fn request_headers(
        &self,
        stream_slice: Option<&StreamSlice>,
        next_page_token: Option<&NextPageToken>,
    ) -> Result<JsonObject> {
        Ok(self.request_options(stream_slice, next_page_token)?.headers)
    }

    /// Form or text body
    fn request_body_data(
        &self,
        stream_slice: Option<&StreamSlice>,
        next_page_token: Option<&NextPageToken>,
    ) -> Result<RequestBody> {
        Ok(self.request_options(stream_slice, next_page_token)?.body_data)
    }

    /// JSON body
    fn request_body_json(
        &self,
        stream_slice: Option<&StreamSlice>,
        next_page_token: Option<&NextPageToken>,
    ) -> Result<JsonObject> {
        Ok(self.request_options(stream_slice, next_page_token)?.body_json)
    }
}

/// Static, templated request options
///
/// Values may reference `config`, `stream_slice`, `stream_partition`,
/// `next_page_token` and `stream_state`. Values that render empty are not sent.
/// The state is supplied per request through [`StaticRequestOptions::render`];
/// as a plain provider the options see an empty state.
#[derive(Debug, Clone, Default)]
pub struct StaticRequestOptions {
    /// Query parameter templates
    pub params: JsonObject,
    /// Header templates
    pub headers: JsonObject,
    /// Form body templates
    pub body_data: JsonObject,
    /// Raw text body template (exclusive with `body_data`)
    pub body_text: Option<String>,
    /// JSON body templates
    pub body_json: JsonObject,
    /// Runtime connector configuration
    pub config: JsonValue,
}

impl StaticRequestOptions {
    /// Create empty static options bound to a config
    pub fn new(config: JsonValue) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// Add a templated query parameter
    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Add a templated header
    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Add a templated JSON body field
    #[must_use]
    pub fn json_field(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.body_json.insert(key.into(), value.into());
        self
    }

    fn render_map(map: &JsonObject, ctx: &TemplateContext) -> JsonObject {
        map.iter()
            .filter_map(|(key, value)| render_option_value(value, ctx).map(|v| (key.clone(), v)))
            .collect()
    }
}

/// Render one option value; `None` when it renders empty or undefined
fn render_option_value(value: &JsonValue, ctx: &TemplateContext) -> Option<JsonValue> {
    match value {
        JsonValue::String(s) if template::has_templates(s) => {
            match template::render_typed(s, ctx).ok()? {
                JsonValue::Null => None,
                JsonValue::String(rendered) if rendered.is_empty() => None,
                rendered => Some(rendered),
            }
        }
        JsonValue::Object(_) | JsonValue::Array(_) => template::render_value(value, ctx).ok(),
        other => Some(other.clone()),
    }
}

impl StaticRequestOptions {
    /// Render the options for one request against the current stream state
    pub fn render(
        &self,
        stream_state: &StreamState,
        stream_slice: Option<&StreamSlice>,
        next_page_token: Option<&NextPageToken>,
    ) -> Result<RequestOptions> {
        let ctx = TemplateContext::with_config(self.config.clone())
            .slice(stream_slice)
            .token(next_page_token)
            .state(stream_state);

        let body_data = match &self.body_text {
            Some(text) => RequestBody::Text(template::render(text, &ctx)?),
            None if self.body_data.is_empty() => RequestBody::Empty,
            None => RequestBody::Form(Self::render_map(&self.body_data, &ctx)),
        };

        Ok(RequestOptions {
            params: Self::render_map(&self.params, &ctx),
            headers: Self::render_map(&self.headers, &ctx)
                .into_iter()
                .map(|(k, v)| (k, JsonValue::String(crate::types::value_to_string(&v))))
                .collect(),
            body_data,
            body_json: Self::render_map(&self.body_json, &ctx),
        })
    }
}

impl RequestOptionsProvider for StaticRequestOptions {
    fn request_options(
        &self,
        stream_slice: Option<&StreamSlice>,
        next_page_token: Option<&NextPageToken>,
    ) -> Result<RequestOptions> {
        self.render(&StreamState::new(), stream_slice, next_page_token)
    }
}
