//! Session recording and playback module
//!
//! This module provides the capture and replay engine: a recorder that turns
//! a global keyboard stream into a timestamped [`EventLog`](crate::types::EventLog),
//! a serializer that persists logs as JSON, and a player that replays them
//! with the original pacing.
//!
//! # Features
//!
//! - Record key transitions with millisecond offsets relative to the start
//! - Stop recording from code or with a stop hotkey
//! - Save and load recordings (bare array or versioned envelope)
//! - Replay once, N times or until cancelled, each repeat on its own clock
//! - Cancel playback within one poll interval

pub mod player;
pub mod recorder;
pub mod serializer;
pub mod types;

pub use player::{
    CancelToken, DispatchFailure, PlaybackHandle, PlaybackOutcome, PlaybackReport, Player,
};
pub use recorder::{Recorder, RecordingStopHandle};
pub use types::{EventDocument, RecordingMetadata, SessionState};
