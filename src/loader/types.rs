//! Loader types
//!
//! Declarative manifest types for YAML parsing. Component definitions reuse
//! the components' own serde representations where they have one.

use crate::decode::DecoderFormat;
use crate::http::RateLimiterConfig;
use crate::incremental::{DatetimeCursorConfig, IncrementingCursorConfig};
use crate::pagination::{CursorPagination, OffsetIncrement, PageIncrement, PageTokenOption};
use crate::request_options::RequestOption;
use crate::selector::{DpathExtractor, FieldFilter, RecordTransformation, SchemaNormalization};
use crate::types::{BackoffType, JsonObject, JsonValue, Method};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ============================================================================
// Manifest
// ============================================================================

/// Top-level connector manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ConnectorManifest {
    /// Manifest version
    #[serde(default = "default_version")]
    pub version: String,
    /// Base URL for all requests (may reference `config`)
    pub url_base: String,
    /// Authentication, in the shape of `AuthConfig` with templated values
    #[serde(default)]
    pub auth: Option<JsonValue>,
    /// HTTP client configuration
    #[serde(default)]
    pub http: HttpDefinition,
    /// Streams read by `check`
    #[serde(default)]
    pub check: Option<CheckDefinition>,
    /// Stream definitions
    pub streams: Vec<StreamDefinition>,
}

impl ConnectorManifest {
    /// Look up a stream definition by name
    pub fn stream(&self, name: &str) -> Option<&StreamDefinition> {
        self.streams.iter().find(|s| s.name == name)
    }

    /// Names of all streams, in manifest order
    pub fn stream_names(&self) -> Vec<&str> {
        self.streams.iter().map(|s| s.name.as_str()).collect()
    }
}

fn default_version() -> String {
    "0.1.0".to_string()
}

/// Connection check configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckDefinition {
    /// Streams whose first page must be readable
    #[serde(default)]
    pub stream_names: Vec<String>,
}

// ============================================================================
// HTTP Definition
// ============================================================================

/// HTTP client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct HttpDefinition {
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Maximum retries per request
    #[serde(default = "default_retries")]
    pub max_retries: u32,
    /// Backoff between retries
    #[serde(default)]
    pub backoff_type: BackoffType,
    /// First backoff delay in milliseconds
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,
    /// Largest backoff delay in milliseconds
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
    /// Token bucket rate limit; unlimited when absent
    #[serde(default, skip_serializing)]
    pub rate_limit: Option<RateLimiterConfig>,
    /// User agent
    #[serde(default)]
    pub user_agent: Option<String>,
    /// Headers sent with every request
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

impl Default for HttpDefinition {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            max_retries: default_retries(),
            backoff_type: BackoffType::default(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
            rate_limit: None,
            user_agent: None,
            headers: HashMap::new(),
        }
    }
}

fn default_timeout() -> u64 {
    30
}

fn default_retries() -> u32 {
    3
}

fn default_initial_backoff() -> u64 {
    100
}

fn default_max_backoff() -> u64 {
    60_000
}

// ============================================================================
// Stream Definition
// ============================================================================

/// Stream definition
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct StreamDefinition {
    /// Stream name
    pub name: String,
    /// Primary key fields as dotted paths
    #[serde(default)]
    pub primary_key: Vec<String>,
    /// JSON schema of the records
    #[serde(default)]
    pub schema: JsonValue,
    /// Request configuration
    pub requester: RequesterDefinition,
    /// Record extraction
    #[serde(default)]
    pub record_selector: RecordSelectorDefinition,
    /// Pagination; a single page when absent
    #[serde(default)]
    pub paginator: Option<PaginatorDefinition>,
    /// Partition router; a single partition when absent
    #[serde(default)]
    pub partition_router: Option<PartitionRouterDefinition>,
    /// Incremental cursor; full refresh only when absent
    #[serde(default)]
    pub incremental: Option<IncrementalDefinition>,
    /// Drop partition and cursor options on every page after the first
    #[serde(default)]
    pub ignore_stream_slicer_parameters_on_paginated_requests: bool,
}

impl StreamDefinition {
    /// Names of the parent streams this stream is partitioned by
    pub fn parent_streams(&self) -> Vec<&str> {
        self.partition_router
            .as_ref()
            .map(PartitionRouterDefinition::parent_streams)
            .unwrap_or_default()
    }
}

// ============================================================================
// Requester Definition
// ============================================================================

/// Request configuration
///
/// Option values may reference `config`, `stream_partition`, `stream_slice`,
/// `next_page_token` and `stream_state`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RequesterDefinition {
    /// URL path (can contain templates)
    pub path: String,
    /// HTTP method
    #[serde(default)]
    pub method: Method,
    /// Overrides the manifest's `url_base`
    #[serde(default)]
    pub url_base: Option<String>,
    /// Query parameters
    #[serde(default)]
    pub request_parameters: JsonObject,
    /// Headers
    #[serde(default)]
    pub request_headers: JsonObject,
    /// Form body fields
    #[serde(default)]
    pub request_body_data: JsonObject,
    /// Raw text body (exclusive with `request_body_data`)
    #[serde(default)]
    pub request_body_text: Option<String>,
    /// JSON body fields
    #[serde(default)]
    pub request_body_json: JsonObject,
    /// Treat 404 as an empty slice
    #[serde(default)]
    pub ignore_not_found: bool,
    /// Overrides the manifest's `http.max_retries`
    #[serde(default)]
    pub max_retries: Option<u32>,
}

// ============================================================================
// Record Selector Definition
// ============================================================================

/// Record extraction configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RecordSelectorDefinition {
    /// Response body format
    #[serde(default)]
    pub decoder: DecoderFormat,
    /// Where the records are in the document
    #[serde(default)]
    pub extractor: DpathExtractor,
    /// Field filters, all of which must keep a record
    #[serde(default)]
    pub filters: Vec<FieldFilter>,
    /// Transformations, applied in order
    #[serde(default)]
    pub transformations: Vec<RecordTransformation>,
    /// Schema normalization
    #[serde(default)]
    pub schema_normalization: SchemaNormalization,
    /// Drop records the cursor has already synced
    #[serde(default)]
    pub client_side_incremental: bool,
}

// ============================================================================
// Paginator Definition
// ============================================================================

/// Pagination configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PaginatorDefinition {
    /// How the next token is computed
    pub pagination_strategy: PaginationStrategyDefinition,
    /// Where the token goes
    pub page_token_option: PageTokenOption,
    /// Where the page size goes
    #[serde(default)]
    pub page_size_option: Option<RequestOption>,
}

/// Pagination strategy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PaginationStrategyDefinition {
    /// Cursor from the body, a header, the Link header or the last record
    Cursor(CursorPagination),
    /// Offset plus page size
    Offset(OffsetIncrement),
    /// Page number
    Page(PageIncrement),
}

// ============================================================================
// Partition Router Definition
// ============================================================================

/// Partition router configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PartitionRouterDefinition {
    /// One partition per value of a static list
    List {
        /// Values (may be templates over `config`)
        values: JsonValue,
        /// Partition key
        cursor_field: String,
        /// Injection of the value
        #[serde(default)]
        request_option: Option<RequestOption>,
    },
    /// One partition per record of each parent stream
    Substream {
        /// Parent streams, read in order
        parent_stream_configs: Vec<ParentStreamDefinition>,
    },
    /// Every combination of the partitions of several routers
    CartesianProduct {
        /// Combined routers; the first varies slowest
        stream_slicers: Vec<PartitionRouterDefinition>,
    },
}

impl PartitionRouterDefinition {
    /// Names of the parent streams read by this router
    pub fn parent_streams(&self) -> Vec<&str> {
        match self {
            Self::List { .. } => Vec::new(),
            Self::Substream {
                parent_stream_configs,
            } => parent_stream_configs
                .iter()
                .map(|p| p.stream.as_str())
                .collect(),
            Self::CartesianProduct { stream_slicers } => stream_slicers
                .iter()
                .flat_map(Self::parent_streams)
                .collect(),
        }
    }
}

/// One parent of a substream router
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ParentStreamDefinition {
    /// Name of the parent stream in the same manifest
    pub stream: String,
    /// Dotted path of the value in parent records
    pub parent_key: String,
    /// Partition key of the value in child slices
    pub partition_field: String,
    /// Injection of the value
    #[serde(default)]
    pub request_option: Option<RequestOption>,
}

// ============================================================================
// Incremental Definition
// ============================================================================

/// Incremental cursor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IncrementalDefinition {
    /// Datetime windows over a datetime field
    Datetime(DatetimeCursorConfig),
    /// A single slice over a numeric field
    Incrementing(IncrementingCursorConfig),
}

impl IncrementalDefinition {
    /// Record field holding the cursor value
    pub fn cursor_field(&self) -> &str {
        match self {
            Self::Datetime(def) => &def.cursor_field,
            Self::Incrementing(def) => &def.cursor_field,
        }
    }
}
