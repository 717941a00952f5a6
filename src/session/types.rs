//! Session data types

use serde::{Deserialize, Serialize};

use crate::types::{EventLog, KeyEvent};

/// Current persisted document version
pub const DOCUMENT_VERSION: u32 = 1;

/// State of a recording or playback session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No active session
    #[default]
    Idle,
    /// Capturing keyboard input
    Recording,
    /// Replaying an event log
    Playing,
}

impl SessionState {
    /// Check if currently recording
    pub fn is_recording(&self) -> bool {
        matches!(self, SessionState::Recording)
    }

    /// Check if currently playing
    pub fn is_playing(&self) -> bool {
        matches!(self, SessionState::Playing)
    }

    /// Check if no session is active
    pub fn is_idle(&self) -> bool {
        matches!(self, SessionState::Idle)
    }

    /// Display name for the state
    pub fn display_name(&self) -> &'static str {
        match self {
            SessionState::Idle => "Idle",
            SessionState::Recording => "Recording",
            SessionState::Playing => "Playing",
        }
    }
}

/// Metadata stored alongside events in an envelope document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingMetadata {
    /// When the document was written
    pub recorded_at: chrono::DateTime<chrono::Utc>,
    /// Number of events in the document
    pub event_count: usize,
    /// Offset of the last event, in seconds
    pub duration: f64,
}

impl RecordingMetadata {
    /// Describe a log as of now
    pub fn describe(log: &EventLog) -> Self {
        Self {
            recorded_at: chrono::Utc::now(),
            event_count: log.len(),
            duration: log.duration().as_secs_f64(),
        }
    }
}

/// Versioned document written when envelopes are enabled
///
/// ```json
/// { "version": 1, "metadata": { ... }, "events": [ { "type": "down", "key": "a", "time": 0.0 } ] }
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct EventDocument<'a> {
    /// Format version
    pub version: u32,
    /// Recording metadata
    pub metadata: RecordingMetadata,
    /// Events in playback order
    pub events: &'a [KeyEvent],
}

impl<'a> EventDocument<'a> {
    /// Wrap a log with fresh metadata
    pub fn new(log: &'a EventLog) -> Self {
        Self {
            version: DOCUMENT_VERSION,
            metadata: RecordingMetadata::describe(log),
            events: log.events(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_state() {
        assert!(SessionState::Recording.is_recording());
        assert!(SessionState::Playing.is_playing());
        assert!(SessionState::default().is_idle());
        assert_eq!(SessionState::Playing.display_name(), "Playing");
    }

    #[test]
    fn test_metadata_describes_log() {
        let log = EventLog::from_events(vec![
            KeyEvent::press("a", 0.0),
            KeyEvent::release("a", 1.25),
        ])
        .unwrap();

        let metadata = RecordingMetadata::describe(&log);
        assert_eq!(metadata.event_count, 2);
        assert_eq!(metadata.duration, 1.25);
    }
}
