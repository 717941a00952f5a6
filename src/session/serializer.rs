//! Load and save event logs as JSON
//!
//! Two document shapes are understood:
//!
//! - **Bare array** - `[{"type": "down", "key": "a", "time": 0.0}, ...]`, the
//!   format older recordings use.
//! - **Envelope** - `{"version": 1, "metadata": {...}, "events": [...]}`, written
//!   by default so future versions can evolve the format.
//!
//! Loading is all-or-nothing: any malformed event rejects the whole document
//! with a [`KeyMacroError::Format`] naming the offending index.

use serde::Deserialize;
use serde_json::Value;
use std::path::Path;

use crate::config::StorageSettings;
use crate::error::{KeyMacroError, Result, ResultExt};
use crate::types::{EventLog, KeyEvent};

use super::types::{EventDocument, RecordingMetadata, DOCUMENT_VERSION};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct StoredEnvelope {
    version: u32,
    #[serde(default)]
    metadata: Option<RecordingMetadata>,
    events: Vec<Value>,
}

/// Save a log to `path` using default storage settings
pub fn save(log: &EventLog, path: impl AsRef<Path>) -> Result<()> {
    save_with(log, path, &StorageSettings::default())
}

/// Save a log to `path`, creating parent directories as needed
pub fn save_with(log: &EventLog, path: impl AsRef<Path>, settings: &StorageSettings) -> Result<()> {
    let path = path.as_ref();
    let content = to_string(log, settings)?;

    create_parent_dir(path)?;
    std::fs::write(path, content).with_context(|| format!("Failed to write {:?}", path))?;

    tracing::info!("Saved {} events to {:?}", log.len(), path);
    Ok(())
}

/// Check that a recording can later be saved to `path`
///
/// Creates missing parent directories and opens the file for writing without
/// truncating it. A file that did not exist before is removed again, so a
/// failed recording leaves nothing behind.
pub fn prepare_destination(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if path.is_dir() {
        return Err(KeyMacroError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "destination is a directory",
        ))
        .with_context(format!("Cannot record to {:?}", path)));
    }

    create_parent_dir(path)?;
    let existed = path.exists();
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Cannot record to {:?}", path))?;
    if !existed {
        std::fs::remove_file(path).with_context(|| format!("Failed to clean up {:?}", path))?;
    }
    Ok(())
}

fn create_parent_dir(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {:?}", parent)),
        _ => Ok(()),
    }
}

/// Serialize a log to a JSON string
pub fn to_string(log: &EventLog, settings: &StorageSettings) -> Result<String> {
    EventLog::validate(log.events()).map_err(|e| match e {
        KeyMacroError::Format(message) => KeyMacroError::Serialization(message),
        other => other,
    })?;

    let result = match (settings.write_envelope, settings.pretty) {
        (true, true) => serde_json::to_string_pretty(&EventDocument::new(log)),
        (true, false) => serde_json::to_string(&EventDocument::new(log)),
        (false, true) => serde_json::to_string_pretty(log.events()),
        (false, false) => serde_json::to_string(log.events()),
    };
    result.map_err(|e| KeyMacroError::Serialization(e.to_string()))
}

/// Load a log from `path`
pub fn load(path: impl AsRef<Path>) -> Result<EventLog> {
    load_document(path).map(|(log, _)| log)
}

/// Load a log and, for envelope documents, its metadata
pub fn load_document(path: impl AsRef<Path>) -> Result<(EventLog, Option<RecordingMetadata>)> {
    let path = path.as_ref();
    let content =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;

    let parsed = parse_document(&content)
        .map_err(|e| e.with_context(format!("Invalid recording {:?}", path)))?;
    tracing::info!("Loaded {} events from {:?}", parsed.0.len(), path);
    Ok(parsed)
}

/// Parse a log from a JSON string
pub fn from_str(content: &str) -> Result<EventLog> {
    parse_document(content).map(|(log, _)| log)
}

fn parse_document(content: &str) -> Result<(EventLog, Option<RecordingMetadata>)> {
    let root: Value = serde_json::from_str(content)
        .map_err(|e| KeyMacroError::Format(format!("not valid JSON: {}", e)))?;

    let (items, metadata) = match root {
        Value::Array(items) => (items, None),
        Value::Object(_) => {
            let envelope: StoredEnvelope = serde_json::from_value(root)
                .map_err(|e| KeyMacroError::Format(format!("malformed document: {}", e)))?;
            if envelope.version > DOCUMENT_VERSION {
                return Err(KeyMacroError::Format(format!(
                    "unsupported document version {} (newest supported is {})",
                    envelope.version, DOCUMENT_VERSION
                )));
            }
            (envelope.events, envelope.metadata)
        }
        other => {
            return Err(KeyMacroError::Format(format!(
                "expected an array of events or an envelope object, found {}",
                json_kind(&other)
            )))
        }
    };

    let events = items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            serde_json::from_value::<KeyEvent>(item)
                .map_err(|e| KeyMacroError::Format(format!("event {}: {}", index, e)))
        })
        .collect::<Result<Vec<_>>>()?;

    let log = EventLog::from_events(events)?;
    if let Some(meta) = &metadata {
        if meta.event_count != log.len() {
            tracing::warn!(
                "Recording metadata lists {} events but the document holds {}",
                meta.event_count,
                log.len()
            );
        }
    }
    Ok((log, metadata))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
