//! CLI runner implementation

use crate::cli::commands::{Cli, Commands};
use crate::engine::{DeclarativeStream, Message, SyncConfig, SyncEngine};
use crate::error::{Error, Result};
use crate::loader::{load_manifest, ComponentFactory, ConnectorManifest, TestReadLimits};
use crate::state::StateManager;
use crate::types::SyncMode;
use serde::Serialize;
use serde_json::{json, Value};
use std::fs;
use std::io::Write;
use std::time::Instant;
use tracing::{info, warn};

/// Runs a parsed command line, writing JSON lines
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command against stdout
    pub async fn run(&self) -> Result<()> {
        let mut stdout = std::io::stdout();
        self.execute(&mut stdout).await
    }

    /// Run the CLI command, writing one JSON message per line to `out`
    pub async fn execute(&self, out: &mut dyn Write) -> Result<()> {
        match &self.cli.command {
            Commands::Check => self.check(out).await,
            Commands::Streams => self.streams(out),
            Commands::Read {
                streams,
                incremental,
                max_records,
                limit_slices,
                limit_pages,
            } => {
                let limits = (limit_slices.is_some() || limit_pages.is_some()).then_some(
                    TestReadLimits {
                        max_slices: *limit_slices,
                        max_pages: *limit_pages,
                    },
                );
                let mode = if *incremental {
                    SyncMode::Incremental
                } else {
                    SyncMode::FullRefresh
                };
                let config = SyncConfig::new()
                    .with_sync_mode(mode)
                    .with_max_records(max_records.unwrap_or(0));
                self.read(out, streams, config, limits).await
            }
        }
    }

    /// Load the manifest
    fn load_manifest(&self) -> Result<ConnectorManifest> {
        let path = self
            .cli
            .manifest
            .as_ref()
            .ok_or_else(|| Error::config("Manifest file not specified (use -m flag)"))?;
        load_manifest(path)
    }

    /// Load configuration
    fn load_config(&self) -> Result<Value> {
        // Inline config takes precedence
        if let Some(json_str) = &self.cli.config_json {
            return serde_json::from_str(json_str)
                .map_err(|e| Error::config(format!("Invalid config JSON: {e}")));
        }

        if let Some(path) = &self.cli.config {
            let content = fs::read_to_string(path)
                .map_err(|e| Error::config(format!("Failed to read config file: {e}")))?;
            return serde_json::from_str(&content)
                .map_err(|e| Error::config(format!("Invalid config JSON: {e}")));
        }

        Ok(json!({}))
    }

    /// Load state
    fn load_state(&self) -> Result<StateManager> {
        // Inline state takes precedence
        if let Some(state_json) = &self.cli.state_json {
            StateManager::from_json(state_json)
        } else if let Some(path) = &self.cli.state {
            StateManager::from_file(path)
        } else {
            Ok(StateManager::in_memory())
        }
    }

    fn factory(&self) -> Result<ComponentFactory> {
        ComponentFactory::new(self.load_manifest()?, self.load_config()?)
    }

    /// Check connection by reading the first record of the check streams
    async fn check(&self, out: &mut dyn Write) -> Result<()> {
        let factory = self.factory()?;
        let manifest = factory.manifest();
        let names: Vec<String> = match &manifest.check {
            Some(check) if !check.stream_names.is_empty() => check.stream_names.clone(),
            _ => manifest
                .streams
                .first()
                .map(|s| vec![s.name.clone()])
                .unwrap_or_default(),
        };

        let mut failure = None;
        for name in &names {
            let stream = factory.build_stream(name)?;
            if let Err(e) = SyncEngine::check_stream(&stream).await {
                warn!(stream = %name, error = %e, "Check failed");
                failure = Some(format!("Stream '{name}' failed: {e}"));
                break;
            }
        }

        let status = match failure {
            None => json!({"status": "SUCCEEDED", "message": "Connection successful"}),
            Some(message) => json!({"status": "FAILED", "message": message}),
        };
        emit(out, &json!({"type": "CONNECTION_STATUS", "connectionStatus": status}))
    }

    /// List the streams of the manifest
    fn streams(&self, out: &mut dyn Write) -> Result<()> {
        let manifest = self.load_manifest()?;
        let streams: Vec<Value> = manifest
            .streams
            .iter()
            .map(|s| {
                json!({
                    "name": s.name,
                    "primary_key": s.primary_key,
                    "cursor_field": s.incremental.as_ref().map(|i| i.cursor_field()),
                    "parents": s.parent_streams(),
                })
            })
            .collect();
        emit(out, &json!({"type": "STREAMS", "streams": streams}))
    }

    /// Read streams and emit their messages
    async fn read(
        &self,
        out: &mut dyn Write,
        names: &[String],
        config: SyncConfig,
        limits: Option<TestReadLimits>,
    ) -> Result<()> {
        let sync_start = Instant::now();
        let mut factory = self.factory()?;
        if let Some(limits) = limits {
            factory = factory.with_test_read(limits);
        }

        let streams: Vec<DeclarativeStream> = if names.is_empty() {
            factory.build_streams()?
        } else {
            names
                .iter()
                .map(|name| factory.build_stream(name))
                .collect::<Result<_>>()?
        };

        let mut engine = SyncEngine::new(self.load_state()?).with_config(config);
        let mut stream_results = Vec::new();
        let mut failed_streams = 0usize;

        for stream in &streams {
            let records_before = engine.stats().records_synced;
            let result = engine
                .sync_stream_with(stream, |message| emit(&mut *out, &message))
                .await;
            match result {
                Ok(()) => {
                    stream_results.push(json!({
                        "stream": stream.name,
                        "status": "SUCCESS",
                        "records_synced": engine.stats().records_synced - records_before,
                    }));
                }
                Err(e) => {
                    failed_streams += 1;
                    emit(
                        out,
                        &Message::error(format!("Error syncing stream {}: {e}", stream.name)),
                    )?;
                    stream_results.push(json!({
                        "stream": stream.name,
                        "status": "FAILED",
                        "error": e.to_string(),
                        "records_synced": engine.stats().records_synced - records_before,
                    }));
                }
            }
        }

        engine.state().checkpoint().await?;

        let status = if failed_streams == 0 {
            "SUCCEEDED"
        } else if failed_streams == streams.len() {
            "FAILED"
        } else {
            "PARTIAL"
        };
        info!(status, records = engine.stats().records_synced, "Read finished");

        emit(
            out,
            &json!({
                "type": "SYNC_SUMMARY",
                "summary": {
                    "status": status,
                    "total_records": engine.stats().records_synced,
                    "total_streams": streams.len(),
                    "failed_streams": failed_streams,
                    "checkpoints": engine.stats().checkpoints,
                    "duration_ms": sync_start.elapsed().as_millis() as u64,
                    "streams": stream_results,
                }
            }),
        )
    }
}

/// Write one message as a JSON line
fn emit(out: &mut dyn Write, message: &impl Serialize) -> Result<()> {
    let line = serde_json::to_string(message)?;
    writeln!(out, "{line}")?;
    Ok(())
}
