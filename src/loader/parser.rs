//! YAML parser for connector manifests
//!
//! Parses and validates manifest files.

use crate::error::{Error, Result};
use crate::loader::types::{ConnectorManifest, StreamDefinition};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

/// Load a connector manifest from a YAML file
pub fn load_manifest(path: impl AsRef<Path>) -> Result<ConnectorManifest> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| {
        Error::config(format!(
            "Failed to read manifest file '{}': {e}",
            path.display()
        ))
    })?;
    load_manifest_from_str(&content)
}

/// Load a connector manifest from a YAML string
pub fn load_manifest_from_str(yaml: &str) -> Result<ConnectorManifest> {
    let manifest: ConnectorManifest = serde_yaml::from_str(yaml)
        .map_err(|e| Error::config(format!("Failed to parse manifest YAML: {e}")))?;

    validate_manifest(&manifest)?;
    Ok(manifest)
}

/// Validate a manifest
fn validate_manifest(manifest: &ConnectorManifest) -> Result<()> {
    if manifest.url_base.is_empty() {
        return Err(Error::config("Manifest url_base cannot be empty"));
    }

    if manifest.streams.is_empty() {
        return Err(Error::config("Manifest must have at least one stream"));
    }

    let stream_names: HashSet<_> = manifest.streams.iter().map(|s| &s.name).collect();
    if stream_names.len() != manifest.streams.len() {
        return Err(Error::config("Duplicate stream names found"));
    }

    for stream in &manifest.streams {
        validate_stream(stream)?;
        for parent in stream.parent_streams() {
            if manifest.stream(parent).is_none() {
                return Err(Error::config(format!(
                    "Stream '{}' references unknown parent stream '{parent}'",
                    stream.name
                )));
            }
        }
    }

    if let Some(check) = &manifest.check {
        for name in &check.stream_names {
            if manifest.stream(name).is_none() {
                return Err(Error::config(format!(
                    "Check references unknown stream '{name}'"
                )));
            }
        }
    }

    validate_acyclic(manifest)
}

/// Validate a stream definition
fn validate_stream(stream: &StreamDefinition) -> Result<()> {
    if stream.name.is_empty() {
        return Err(Error::config("Stream name cannot be empty"));
    }

    if stream.requester.path.is_empty() {
        return Err(Error::config(format!(
            "Stream '{}' path cannot be empty",
            stream.name
        )));
    }

    if stream.record_selector.client_side_incremental && stream.incremental.is_none() {
        return Err(Error::config(format!(
            "Stream '{}' uses client_side_incremental without an incremental cursor",
            stream.name
        )));
    }

    Ok(())
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Visit {
    InProgress,
    Done,
}

/// Reject parent references that form a cycle
fn validate_acyclic(manifest: &ConnectorManifest) -> Result<()> {
    let mut visits = HashMap::new();
    for stream in &manifest.streams {
        visit(manifest, &stream.name, &mut visits)?;
    }
    Ok(())
}

fn visit<'a>(
    manifest: &'a ConnectorManifest,
    name: &'a str,
    visits: &mut HashMap<&'a str, Visit>,
) -> Result<()> {
    match visits.get(name) {
        Some(Visit::Done) => return Ok(()),
        Some(Visit::InProgress) => {
            return Err(Error::config(format!(
                "Parent streams of '{name}' form a cycle"
            )))
        }
        None => {}
    }

    visits.insert(name, Visit::InProgress);
    if let Some(stream) = manifest.stream(name) {
        for parent in stream.parent_streams() {
            visit(manifest, parent, visits)?;
        }
    }
    visits.insert(name, Visit::Done);
    Ok(())
}
