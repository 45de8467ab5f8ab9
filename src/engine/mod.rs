//! Execution engine module
//!
//! Stream orchestration with state management.
//!
//! # Overview
//!
//! The engine module provides:
//! - `DeclarativeStream` - A named stream backed by a retriever
//! - `SyncEngine` - Reads streams, checkpoints and persists their state
//! - `SyncConfig` - Configuration for sync operations
//! - Message types for output (Record, State, Log)

mod types;

pub use types::{DeclarativeStream, Message, SyncConfig, SyncStats};

use crate::error::Result;
use crate::record::{StreamData, StreamState};
use crate::state::StateManager;
use crate::types::{JsonValue, SyncMode};
use futures::StreamExt;
use std::time::Instant;
use tracing::{debug, info};

/// Sync engine for orchestrating data extraction
pub struct SyncEngine {
    /// State manager
    state: StateManager,
    /// Sync configuration
    config: SyncConfig,
    /// Statistics
    stats: SyncStats,
}

impl SyncEngine {
    /// Create a new sync engine
    pub fn new(state: StateManager) -> Self {
        Self {
            state,
            config: SyncConfig::default(),
            stats: SyncStats::default(),
        }
    }

    /// Set sync configuration
    #[must_use]
    pub fn with_config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    /// Get the state manager
    pub fn state(&self) -> &StateManager {
        &self.state
    }

    /// Get statistics
    pub fn stats(&self) -> &SyncStats {
        &self.stats
    }

    /// Reset statistics
    pub fn reset_stats(&mut self) {
        self.stats = SyncStats::default();
    }

    /// Read the first slice of a stream up to its first item
    ///
    /// Succeeds when the API answers, even with no records.
    pub async fn check_stream(stream: &DeclarativeStream) -> Result<()> {
        let mut slices = stream.retriever.stream_slices();
        let Some(slice) = slices.next().await else {
            return Ok(());
        };

        let mut items = stream.retriever.read_records(&stream.schema, slice?);
        if let Some(item) = items.next().await {
            item?;
        }
        Ok(())
    }

    /// Sync one stream
    ///
    /// In incremental mode the stored state is loaded into the retriever
    /// first, a `State` message follows every closed slice (with
    /// `checkpoint_per_slice`) and the final state is persisted. Hitting
    /// `max_records` ends the sync without closing the current slice.
    ///
    /// Messages are only handed out when the whole stream succeeds, so the
    /// state is persisted at the end; a failed sync leaves it untouched.
    pub async fn sync_stream(&mut self, stream: &DeclarativeStream) -> Result<Vec<Message>> {
        let mut messages = Vec::new();
        let last = self
            .run(
                stream,
                &mut |message| {
                    messages.push(message);
                    Ok(())
                },
                false,
            )
            .await?;

        if let Some(state) = last {
            self.state.set_stream_state(&stream.name, state).await?;
        }
        Ok(messages)
    }

    /// Sync one stream, handing every message to `emit` as it is produced
    ///
    /// Each checkpoint is persisted right after `emit` accepted its `State`
    /// message. When the read or `emit` fails, the stored state stays at the
    /// last delivered checkpoint.
    pub async fn sync_stream_with<F>(
        &mut self,
        stream: &DeclarativeStream,
        mut emit: F,
    ) -> Result<()>
    where
        F: FnMut(Message) -> Result<()>,
    {
        self.run(stream, &mut emit, true).await?;
        Ok(())
    }

    /// Sync several streams in order
    ///
    /// All or nothing: states are persisted once every stream succeeded.
    pub async fn sync_streams(&mut self, streams: &[DeclarativeStream]) -> Result<Vec<Message>> {
        let mut messages = Vec::new();
        let mut pending = Vec::new();
        for stream in streams {
            let last = self
                .run(
                    stream,
                    &mut |message| {
                        messages.push(message);
                        Ok(())
                    },
                    false,
                )
                .await?;
            if let Some(state) = last {
                pending.push((stream.name.as_str(), state));
            }
        }

        for (name, state) in pending {
            self.state.set_stream_state(name, state).await?;
        }
        Ok(messages)
    }

    /// Read a stream into `emit`; returns the last checkpointed state
    async fn run(
        &mut self,
        stream: &DeclarativeStream,
        emit: &mut dyn FnMut(Message) -> Result<()>,
        persist_on_delivery: bool,
    ) -> Result<Option<StreamState>> {
        let start = Instant::now();
        let incremental =
            self.config.sync_mode == SyncMode::Incremental && stream.supports_incremental();

        info!(stream = %stream.name, incremental, "Starting sync");
        emit(Message::info(format!(
            "Starting sync for stream: {}",
            stream.name
        )))?;

        if incremental {
            let prior = self.state.get_stream_state(&stream.name).await;
            if !prior.is_empty() {
                debug!(stream = %stream.name, ?prior, "Resuming from stored state");
                stream.retriever.set_state(&prior)?;
            }
        }

        let mut last_checkpoint = None;
        let mut records = 0usize;
        let mut slices = stream.retriever.stream_slices();
        'slices: while let Some(slice) = slices.next().await {
            let mut items = stream.retriever.read_records(&stream.schema, slice?);

            while let Some(item) = items.next().await {
                match item? {
                    StreamData::Record(record) => {
                        emit(Message::record(&stream.name, record.into_data()))?;
                        records += 1;
                        self.stats.add_records(1);

                        if self.config.max_records > 0 && records >= self.config.max_records {
                            info!(stream = %stream.name, records, "Record limit reached");
                            break 'slices;
                        }
                    }
                    StreamData::Log(log) => emit(Message::log(log.level, log.message))?,
                }
            }

            self.stats.add_slice();
            if incremental && self.config.checkpoint_per_slice {
                last_checkpoint =
                    Some(self.checkpoint(stream, emit, persist_on_delivery).await?);
            }
        }

        if incremental {
            last_checkpoint = Some(self.checkpoint(stream, emit, persist_on_delivery).await?);
        }

        self.stats.add_stream();
        self.stats.set_duration(start.elapsed().as_millis() as u64);

        info!(stream = %stream.name, records, "Completed sync");
        emit(Message::info(format!(
            "Completed sync for {}: {records} records",
            stream.name
        )))?;

        Ok(last_checkpoint)
    }

    /// Emit the retriever's state, then persist it if asked to
    async fn checkpoint(
        &mut self,
        stream: &DeclarativeStream,
        emit: &mut dyn FnMut(Message) -> Result<()>,
        persist: bool,
    ) -> Result<StreamState> {
        let state = stream.retriever.state();
        emit(Message::state(&stream.name, JsonValue::Object(state.clone())))?;
        self.stats.add_checkpoint();

        if persist {
            self.state
                .set_stream_state(&stream.name, state.clone())
                .await?;
        }
        Ok(state)
    }
}
