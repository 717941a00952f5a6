//! Settings groups that make up the application configuration
//!
//! # Main Types
//!
//! - [`RecordingSettings`] - Stop hotkey and whether it is kept in the log
//! - [`PlaybackSettings`] - Pacing granularity and default repeat count
//! - [`StorageSettings`] - Shape of saved recordings
//! - [`LoggingSettings`] - Log level and optional rolling log file

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::types::RepeatCount;

/// Default stop hotkey
pub const DEFAULT_STOP_KEY: &str = "esc";

/// Default upper bound on a single pacing wait, in milliseconds
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2;

/// Largest accepted pacing wait, in milliseconds
pub const MAX_POLL_INTERVAL_MS: u64 = 10;

/// Recording behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingSettings {
    /// Key whose press ends the recording
    pub stop_key: String,

    /// Keep the stop key's transitions in the recorded log
    pub record_stop_key: bool,

    /// Capacity of the queue between the keyboard hook and the capture loop
    ///
    /// The hook never waits for the capture thread. Transitions arriving while
    /// this many are still unprocessed are lost and reported as a warning when
    /// the recording ends.
    pub queue_capacity: usize,
}

impl Default for RecordingSettings {
    fn default() -> Self {
        Self {
            stop_key: DEFAULT_STOP_KEY.to_string(),
            record_stop_key: false,
            queue_capacity: 4096,
        }
    }
}

/// Playback behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackSettings {
    /// Upper bound on a single pacing wait (cancellation granularity)
    pub poll_interval_ms: u64,

    /// Repeat count used when none is given ("1", "5", "inf", ...)
    pub default_repeat: String,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            default_repeat: "1".to_string(),
        }
    }
}

impl PlaybackSettings {
    /// Poll interval clamped to 1..=10 ms
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.clamp(1, MAX_POLL_INTERVAL_MS))
    }

    /// Parsed default repeat count, falling back to a single run
    pub fn default_repeat(&self) -> RepeatCount {
        self.default_repeat.parse().unwrap_or_else(|e| {
            tracing::warn!(
                "Ignoring invalid default repeat '{}': {}",
                self.default_repeat,
                e
            );
            RepeatCount::ONCE
        })
    }
}

/// Persistence behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Wrap saved events in a versioned document with metadata
    pub write_envelope: bool,

    /// Pretty-print saved JSON
    pub pretty: bool,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            write_envelope: true,
            pretty: true,
        }
    }
}

/// Logging behaviour
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Filter directive used when RUST_LOG is not set
    pub level: Option<String>,

    /// Directory for a daily-rolling log file
    pub log_dir: Option<PathBuf>,
}
