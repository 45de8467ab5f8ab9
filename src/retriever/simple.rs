//! Simple retriever
//!
//! Drives the read loop of one stream. Each slice goes through
//! fetch page, select records, compute the next token, and is closed on the
//! cursor once no token is left.

use super::types::Retriever;
use crate::error::Result;
use crate::http::HttpResponse;
use crate::incremental::DeclarativeCursor;
use crate::pagination::{NoPagination, Paginator};
use crate::partition::{SinglePartitionRouter, StreamSlicer};
use crate::record::{
    LogMessage, NextPageToken, Record, SliceStream, StreamData, StreamDataStream, StreamSlice,
    StreamState,
};
use crate::request_options::{combine_options, RequestOptions, RequestOptionsProvider};
use crate::requester::Requester;
use crate::selector::RecordSelector;
use crate::types::JsonValue;
use async_stream::try_stream;
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

/// Retriever composing a requester, a selector, a paginator and a slicer
///
/// With a cursor, the cursor is the slicer: it produces the slices,
/// contributes their request options and is closed after each slice.
pub struct SimpleRetriever {
    name: String,
    requester: Arc<dyn Requester>,
    record_selector: Box<dyn RecordSelector>,
    paginator: Box<dyn Paginator>,
    stream_slicer: Arc<dyn StreamSlicer>,
    cursor: Option<Arc<dyn DeclarativeCursor>>,
    request_option_provider: Option<Arc<dyn RequestOptionsProvider>>,
    ignore_stream_slicer_parameters_on_paginated_requests: bool,
    emit_http_logs: bool,
}

impl SimpleRetriever {
    /// Create an unpaginated, unsliced retriever
    pub fn new(
        name: impl Into<String>,
        requester: Arc<dyn Requester>,
        record_selector: Box<dyn RecordSelector>,
    ) -> Self {
        Self {
            name: name.into(),
            requester,
            record_selector,
            paginator: Box::new(NoPagination),
            stream_slicer: Arc::new(SinglePartitionRouter),
            cursor: None,
            request_option_provider: None,
            ignore_stream_slicer_parameters_on_paginated_requests: false,
            emit_http_logs: false,
        }
    }

    /// Paginate each slice
    #[must_use]
    pub fn with_paginator(mut self, paginator: Box<dyn Paginator>) -> Self {
        self.paginator = paginator;
        self
    }

    /// Slice the stream without incremental state
    #[must_use]
    pub fn with_stream_slicer(mut self, stream_slicer: Arc<dyn StreamSlicer>) -> Self {
        self.stream_slicer = stream_slicer;
        self
    }

    /// Slice the stream with a cursor and track its state
    #[must_use]
    pub fn with_cursor(mut self, cursor: Arc<dyn DeclarativeCursor>) -> Self {
        self.cursor = Some(cursor);
        self
    }

    /// Take slice request options from another component than the slicer
    #[must_use]
    pub fn with_request_option_provider(
        mut self,
        provider: Arc<dyn RequestOptionsProvider>,
    ) -> Self {
        self.request_option_provider = Some(provider);
        self
    }

    /// Drop the slicer's request options on every page after the first
    #[must_use]
    pub fn ignore_stream_slicer_parameters_on_paginated_requests(mut self, ignore: bool) -> Self {
        self.ignore_stream_slicer_parameters_on_paginated_requests = ignore;
        self
    }

    /// Emit a log message describing each request before its records
    #[must_use]
    pub fn with_http_logs(mut self, emit: bool) -> Self {
        self.emit_http_logs = emit;
        self
    }

    /// The cursor, if the stream is incremental
    pub fn cursor(&self) -> Option<&Arc<dyn DeclarativeCursor>> {
        self.cursor.as_ref()
    }

    fn slicer_options(
        &self,
        stream_slice: &StreamSlice,
        next_page_token: Option<&NextPageToken>,
    ) -> Result<RequestOptions> {
        if let Some(provider) = &self.request_option_provider {
            provider.request_options(Some(stream_slice), next_page_token)
        } else if let Some(cursor) = &self.cursor {
            cursor.request_options(Some(stream_slice), next_page_token)
        } else {
            self.stream_slicer
                .request_options(Some(stream_slice), next_page_token)
        }
    }

    /// Paginator options overlaid with the slicer's
    ///
    /// Differing values for the same key are a conflict. With
    /// `ignore_stream_slicer_parameters_on_paginated_requests`, the slicer's
    /// options are left out once a page token exists.
    pub fn request_options(
        &self,
        stream_slice: &StreamSlice,
        next_page_token: Option<&NextPageToken>,
    ) -> Result<RequestOptions> {
        let paginator = self
            .paginator
            .request_options(Some(stream_slice), next_page_token)?;

        if next_page_token.is_some() && self.ignore_stream_slicer_parameters_on_paginated_requests
        {
            return Ok(paginator);
        }

        let slicer = self.slicer_options(stream_slice, next_page_token)?;
        combine_options(&[paginator, slicer])
    }

    /// Paginator path when it has one, the requester's otherwise
    pub fn resolve_path(
        &self,
        stream_slice: &StreamSlice,
        next_page_token: Option<&NextPageToken>,
    ) -> Result<String> {
        match self.paginator.path(next_page_token) {
            Some(path) if !path.is_empty() => Ok(path),
            _ => self.requester.get_path(Some(stream_slice), next_page_token),
        }
    }

    fn selection_state(&self) -> StreamState {
        self.cursor
            .as_ref()
            .map(|cursor| cursor.get_stream_state())
            .unwrap_or_default()
    }

    /// Whether `candidate` replaces `current` as the record closing the slice
    fn is_more_recent(&self, candidate: &Record, current: Option<&Record>) -> bool {
        let Some(cursor) = &self.cursor else {
            return false;
        };
        if !cursor.should_be_synced(candidate) {
            return false;
        }
        current.map_or(true, |current| {
            cursor.is_greater_than_or_equal(candidate, current)
        })
    }

    fn http_log(&self, path: &str, response: &HttpResponse) -> LogMessage {
        let message = json!({
            "http": {
                "title": format!("{} request", self.name),
                "request": {
                    "method": format!("{:?}", self.requester.get_method()),
                    "path": path,
                },
                "response": {
                    "status_code": response.status(),
                    "url": response.url(),
                    "body": response.text(),
                },
            }
        });
        LogMessage::debug(message.to_string())
    }
}

impl std::fmt::Debug for SimpleRetriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimpleRetriever")
            .field("name", &self.name)
            .field("requester", &self.requester)
            .field("record_selector", &self.record_selector)
            .field("paginator", &self.paginator)
            .field("stream_slicer", &self.stream_slicer)
            .field("has_cursor", &self.cursor.is_some())
            .field(
                "ignore_stream_slicer_parameters_on_paginated_requests",
                &self.ignore_stream_slicer_parameters_on_paginated_requests,
            )
            .field("emit_http_logs", &self.emit_http_logs)
            .finish_non_exhaustive()
    }
}

impl Retriever for SimpleRetriever {
    fn name(&self) -> &str {
        &self.name
    }

    fn read_records<'a>(
        &'a self,
        records_schema: &'a JsonValue,
        stream_slice: StreamSlice,
    ) -> StreamDataStream<'a> {
        Box::pin(try_stream! {
            let mut next_page_token = self.paginator.initial_token();
            let mut most_recent: Option<Record> = None;
            let mut pages = 0u64;

            loop {
                let token = next_page_token.as_ref();
                let path = self.resolve_path(&stream_slice, token)?;
                let options = self.request_options(&stream_slice, token)?;
                let stream_state = self.selection_state();

                let Some(response) = self
                    .requester
                    .send_request(&path, &stream_state, Some(&stream_slice), token, &options)
                    .await?
                else {
                    debug!(stream = %self.name, %path, "Response ignored, ending slice");
                    break;
                };
                pages += 1;

                if self.emit_http_logs {
                    yield StreamData::Log(self.http_log(&path, &response));
                }

                let records = self.record_selector.select_records(
                    &response,
                    &stream_state,
                    records_schema,
                    &stream_slice,
                    token,
                )?;
                let last_page_size = records.len();
                let last_record = records.last().cloned();

                for record in records {
                    if self.is_more_recent(&record, most_recent.as_ref()) {
                        most_recent = Some(record.clone());
                    }
                    yield StreamData::Record(record);
                }

                next_page_token = self.paginator.next_page_token(
                    &response,
                    last_page_size,
                    last_record.as_ref(),
                    next_page_token.as_ref(),
                )?;
                if next_page_token.is_none() {
                    break;
                }
            }

            debug!(stream = %self.name, pages, "Slice read");
            if let Some(cursor) = &self.cursor {
                cursor.close_slice(&stream_slice, most_recent.as_ref())?;
            }
        })
    }

    fn stream_slices(&self) -> SliceStream<'_> {
        match &self.cursor {
            Some(cursor) => cursor.stream_slices(),
            None => self.stream_slicer.stream_slices(),
        }
    }

    fn state(&self) -> StreamState {
        self.selection_state()
    }

    fn set_state(&self, state: &StreamState) -> Result<()> {
        match &self.cursor {
            Some(cursor) => cursor.set_initial_state(state),
            None => Ok(()),
        }
    }
}
