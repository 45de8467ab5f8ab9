//! Component factory
//!
//! Turns a manifest into `DeclarativeStream`s wired to live components.

use super::types::{
    ConnectorManifest, HttpDefinition, IncrementalDefinition, PaginationStrategyDefinition,
    PaginatorDefinition, PartitionRouterDefinition, RecordSelectorDefinition,
    RequesterDefinition, StreamDefinition,
};
use crate::auth::{AuthConfig, Authenticator};
use crate::decode::decoder_for;
use crate::engine::DeclarativeStream;
use crate::error::{Error, Result};
use crate::http::{HttpClient, HttpClientConfig};
use crate::incremental::{
    CursorFactory, DatetimeBasedCursor, DeclarativeCursor, IncrementingCountCursor,
    PerPartitionCursor,
};
use crate::pagination::{
    DefaultPaginator, NoPagination, PaginationStrategy, Paginator, PaginatorTestReadDecorator,
};
use crate::partition::{
    CartesianProductStreamSlicer, ListPartitionRouter, ParentStreamConfig, StreamSlicer,
    SubstreamPartitionRouter,
};
use crate::request_options::StaticRequestOptions;
use crate::requester::{DefaultErrorHandler, HttpRequester};
use crate::retriever::{Retriever, SimpleRetriever, TestReadRetriever};
use crate::selector::{CursorFilter, DefaultRecordSelector};
use crate::template::{self, TemplateContext};
use crate::types::JsonValue;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Limits applied when previewing a connector
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TestReadLimits {
    /// Slices read per stream
    pub max_slices: Option<usize>,
    /// Pages read per slice
    pub max_pages: Option<u64>,
}

/// Builds streams from a manifest and a runtime config
///
/// All streams share one HTTP client and one authenticator, so rate limits
/// and cached tokens span the whole connector.
pub struct ComponentFactory {
    manifest: ConnectorManifest,
    config: JsonValue,
    client: Arc<HttpClient>,
    authenticator: Option<Arc<Authenticator>>,
    test_read: Option<TestReadLimits>,
}

impl ComponentFactory {
    /// Create a factory; renders the auth definition against `config`
    pub fn new(manifest: ConnectorManifest, config: JsonValue) -> Result<Self> {
        let client = Arc::new(HttpClient::with_config(http_config(&manifest.http))?);
        let authenticator = match &manifest.auth {
            Some(auth) => build_authenticator(auth, &config)?,
            None => None,
        };

        Ok(Self {
            manifest,
            config,
            client,
            authenticator,
            test_read: None,
        })
    }

    /// Build truncated retrievers that log their HTTP traffic
    #[must_use]
    pub fn with_test_read(mut self, limits: TestReadLimits) -> Self {
        self.test_read = Some(limits);
        self
    }

    /// The manifest
    pub fn manifest(&self) -> &ConnectorManifest {
        &self.manifest
    }

    /// The runtime config
    pub fn config(&self) -> &JsonValue {
        &self.config
    }

    /// Build every stream of the manifest
    pub fn build_streams(&self) -> Result<Vec<DeclarativeStream>> {
        self.manifest
            .streams
            .iter()
            .map(|definition| self.build_definition(definition))
            .collect()
    }

    /// Build one stream by name
    pub fn build_stream(&self, name: &str) -> Result<DeclarativeStream> {
        let definition = self.definition(name)?;
        self.build_definition(definition)
    }

    fn definition(&self, name: &str) -> Result<&StreamDefinition> {
        self.manifest.stream(name).ok_or_else(|| Error::StreamNotFound {
            stream: name.to_string(),
        })
    }

    fn build_definition(&self, definition: &StreamDefinition) -> Result<DeclarativeStream> {
        let retriever = self.build_retriever(definition, &mut Vec::new())?;

        let primary_key = definition
            .primary_key
            .iter()
            .map(|key| key.split('.').map(String::from).collect())
            .collect();
        let mut stream = DeclarativeStream::new(&definition.name, retriever)
            .with_primary_key(primary_key)
            .with_schema(definition.schema.clone());
        if let Some(incremental) = &definition.incremental {
            stream = stream.with_cursor_field(incremental.cursor_field());
        }
        Ok(stream)
    }

    /// Build the retriever of a stream
    ///
    /// `visiting` holds the streams whose retrievers are being built, to
    /// reject parent chains that loop back.
    fn build_retriever(
        &self,
        definition: &StreamDefinition,
        visiting: &mut Vec<String>,
    ) -> Result<Arc<dyn Retriever>> {
        if visiting.contains(&definition.name) {
            return Err(Error::config(format!(
                "Parent streams of '{}' form a cycle",
                definition.name
            )));
        }
        visiting.push(definition.name.clone());
        debug!(stream = %definition.name, "Building retriever");

        let router = definition
            .partition_router
            .as_ref()
            .map(|router| self.build_router(&definition.name, router, visiting))
            .transpose()?;
        let cursor = definition
            .incremental
            .as_ref()
            .map(|incremental| self.build_cursor(incremental, router.clone()))
            .transpose()?;

        let requester = self.build_requester(&definition.name, &definition.requester)?;
        let selector =
            self.build_selector(&definition.name, &definition.record_selector, cursor.as_ref());
        let paginator = self.build_paginator(definition.paginator.as_ref())?;

        let mut retriever =
            SimpleRetriever::new(&definition.name, Arc::new(requester), Box::new(selector))
                .with_paginator(paginator)
                .ignore_stream_slicer_parameters_on_paginated_requests(
                    definition.ignore_stream_slicer_parameters_on_paginated_requests,
                )
                .with_http_logs(self.test_read.is_some());
        match (cursor, router) {
            (Some(cursor), _) => retriever = retriever.with_cursor(cursor),
            (None, Some(router)) => retriever = retriever.with_stream_slicer(router),
            (None, None) => {}
        }

        visiting.pop();

        let retriever: Arc<dyn Retriever> = Arc::new(retriever);
        match self.test_read.and_then(|limits| limits.max_slices) {
            Some(max_slices) => Ok(Arc::new(TestReadRetriever::new(retriever, max_slices)?)),
            None => Ok(retriever),
        }
    }

    fn build_requester(&self, name: &str, definition: &RequesterDefinition) -> Result<HttpRequester> {
        let url_base = definition
            .url_base
            .clone()
            .unwrap_or_else(|| self.manifest.url_base.clone());
        let options = StaticRequestOptions {
            params: definition.request_parameters.clone(),
            headers: definition.request_headers.clone(),
            body_data: definition.request_body_data.clone(),
            body_text: definition.request_body_text.clone(),
            body_json: definition.request_body_json.clone(),
            config: self.config.clone(),
        };

        let mut requester = HttpRequester::new(name, url_base, &definition.path, Arc::clone(&self.client))
            .with_method(definition.method)
            .with_request_options(options)
            .with_error_handler(Box::new(DefaultErrorHandler {
                ignore_not_found: definition.ignore_not_found,
            }))
            .with_max_retries(
                definition
                    .max_retries
                    .unwrap_or(self.manifest.http.max_retries),
            );
        if let Some(authenticator) = &self.authenticator {
            requester = requester.with_authenticator(Arc::clone(authenticator));
        }
        requester.with_config(self.config.clone())
    }

    fn build_selector(
        &self,
        name: &str,
        definition: &RecordSelectorDefinition,
        cursor: Option<&Arc<dyn DeclarativeCursor>>,
    ) -> DefaultRecordSelector {
        let mut selector = DefaultRecordSelector::new(name, definition.extractor.clone())
            .with_decoder(decoder_for(definition.decoder))
            .with_schema_normalization(definition.schema_normalization)
            .with_config(self.config.clone());
        for filter in &definition.filters {
            selector = selector.with_filter(Arc::new(filter.clone()));
        }
        if let (true, Some(cursor)) = (definition.client_side_incremental, cursor) {
            selector = selector.with_filter(Arc::new(CursorFilter::new(Arc::clone(cursor))));
        }
        for transformation in &definition.transformations {
            selector = selector.with_transformation(transformation.clone());
        }
        selector
    }

    fn build_paginator(&self, definition: Option<&PaginatorDefinition>) -> Result<Box<dyn Paginator>> {
        let paginator: Box<dyn Paginator> = match definition {
            None => Box::new(NoPagination),
            Some(definition) => {
                let strategy: Box<dyn PaginationStrategy> = match &definition.pagination_strategy {
                    PaginationStrategyDefinition::Cursor(strategy) => Box::new(strategy.clone()),
                    PaginationStrategyDefinition::Offset(strategy) => Box::new(strategy.clone()),
                    PaginationStrategyDefinition::Page(strategy) => Box::new(strategy.clone()),
                };
                let mut paginator =
                    DefaultPaginator::from_boxed(strategy, definition.page_token_option.clone());
                if let Some(option) = &definition.page_size_option {
                    paginator = paginator.with_page_size_option(option.clone());
                }
                Box::new(paginator)
            }
        };

        match self.test_read.and_then(|limits| limits.max_pages) {
            Some(max_pages) => Ok(Box::new(PaginatorTestReadDecorator::new(paginator, max_pages)?)),
            None => Ok(paginator),
        }
    }

    fn build_router(
        &self,
        stream: &str,
        definition: &PartitionRouterDefinition,
        visiting: &mut Vec<String>,
    ) -> Result<Arc<dyn StreamSlicer>> {
        match definition {
            PartitionRouterDefinition::List {
                values,
                cursor_field,
                request_option,
            } => {
                let ctx = TemplateContext::with_config(self.config.clone());
                let values = match template::render_value(values, &ctx)? {
                    JsonValue::Array(values) => values,
                    other => {
                        return Err(Error::invalid_value(
                            "values",
                            format!("stream '{stream}' expects a list, got {other}"),
                        ))
                    }
                };
                let mut router = ListPartitionRouter::new(values, cursor_field);
                if let Some(option) = request_option {
                    router = router.with_request_option(option.clone());
                }
                Ok(Arc::new(router))
            }
            PartitionRouterDefinition::Substream {
                parent_stream_configs,
            } => {
                let mut parents = Vec::with_capacity(parent_stream_configs.len());
                for parent in parent_stream_configs {
                    let parent_definition = self.definition(&parent.stream)?;
                    let retriever = self.build_retriever(parent_definition, visiting)?;
                    let mut config =
                        ParentStreamConfig::new(retriever, &parent.parent_key, &parent.partition_field);
                    if let Some(option) = &parent.request_option {
                        config = config.with_request_option(option.clone());
                    }
                    parents.push(config);
                }
                Ok(Arc::new(SubstreamPartitionRouter::new(parents)))
            }
            PartitionRouterDefinition::CartesianProduct { stream_slicers } => {
                let mut slicers = Vec::with_capacity(stream_slicers.len());
                for slicer in stream_slicers {
                    slicers.push(self.build_router(stream, slicer, visiting)?);
                }
                Ok(Arc::new(CartesianProductStreamSlicer::new(slicers)))
            }
        }
    }

    /// Build the cursor of a stream; partitioned streams get one cursor per
    /// partition
    fn build_cursor(
        &self,
        definition: &IncrementalDefinition,
        router: Option<Arc<dyn StreamSlicer>>,
    ) -> Result<Arc<dyn DeclarativeCursor>> {
        let Some(router) = router else {
            return build_cursor(definition, &self.config);
        };

        let definition = definition.clone();
        let config = self.config.clone();
        let factory: CursorFactory = Arc::new(move || build_cursor(&definition, &config));
        Ok(Arc::new(PerPartitionCursor::new(router, factory)?))
    }
}

impl std::fmt::Debug for ComponentFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentFactory")
            .field("streams", &self.manifest.stream_names())
            .field("test_read", &self.test_read)
            .finish_non_exhaustive()
    }
}

fn build_cursor(
    definition: &IncrementalDefinition,
    config: &JsonValue,
) -> Result<Arc<dyn DeclarativeCursor>> {
    Ok(match definition {
        IncrementalDefinition::Datetime(definition) => {
            Arc::new(DatetimeBasedCursor::from_config(definition, config)?)
        }
        IncrementalDefinition::Incrementing(definition) => {
            Arc::new(IncrementingCountCursor::from_config(definition)?)
        }
    })
}

fn build_authenticator(auth: &JsonValue, config: &JsonValue) -> Result<Option<Arc<Authenticator>>> {
    let ctx = TemplateContext::with_config(config.clone());
    let rendered = template::render_value(auth, &ctx)?;
    let auth: AuthConfig = serde_json::from_value(rendered)
        .map_err(|e| Error::config(format!("Invalid auth definition: {e}")))?;

    if auth.is_none() {
        return Ok(None);
    }
    Ok(Some(Arc::new(Authenticator::new(auth))))
}

fn http_config(definition: &HttpDefinition) -> HttpClientConfig {
    let mut builder = HttpClientConfig::builder()
        .timeout(Duration::from_secs(definition.timeout_secs))
        .backoff(
            definition.backoff_type,
            Duration::from_millis(definition.initial_backoff_ms),
            Duration::from_millis(definition.max_backoff_ms),
        );

    builder = match &definition.rate_limit {
        Some(limit) => builder.rate_limit(limit.clone()),
        None => builder.no_rate_limit(),
    };

    if let Some(agent) = &definition.user_agent {
        builder = builder.user_agent(agent);
    }
    for (key, value) in &definition.headers {
        builder = builder.header(key, value);
    }

    builder.build()
}
