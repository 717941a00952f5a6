//! Core data types for KeyMacro-RS
//!
//! This module contains the fundamental types shared by recording, persistence
//! and playback:
//!
//! - [`KeyAction`] - Direction of a key transition (press / release)
//! - [`KeyEvent`] - One timestamped key transition
//! - [`EventLog`] - Ordered, offset-monotonic sequence of key events (one macro)
//! - [`RepeatCount`] - How many times a log is replayed (finite or unbounded)
//!
//! # Offsets
//!
//! Every [`KeyEvent`] carries an offset in seconds from the start of the
//! recording. Offsets are rounded to millisecond precision on construction and
//! are non-decreasing across an [`EventLog`]; consecutive events may share an
//! offset.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroU32;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{KeyMacroError, Result};

/// Round a number of seconds to millisecond precision
pub fn round_millis(secs: f64) -> f64 {
    (secs * 1000.0).round() / 1000.0
}

/// Direction of a key transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyAction {
    /// Key went down
    #[serde(rename = "down")]
    Press,
    /// Key came up
    #[serde(rename = "up")]
    Release,
}

impl KeyAction {
    /// Token used in the persisted format
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyAction::Press => "down",
            KeyAction::Release => "up",
        }
    }

    /// Verb used in log messages and dispatch errors
    pub fn verb(&self) -> &'static str {
        match self {
            KeyAction::Press => "press",
            KeyAction::Release => "release",
        }
    }
}

impl fmt::Display for KeyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeyAction {
    type Err = KeyMacroError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "down" => Ok(KeyAction::Press),
            "up" => Ok(KeyAction::Release),
            other => Err(KeyMacroError::Format(format!(
                "unknown transition type '{}', expected \"down\" or \"up\"",
                other
            ))),
        }
    }
}

/// One observed or replayed key transition
///
/// Serializes as `{ "type": "down" | "up", "key": <string>, "time": <seconds> }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KeyEvent {
    /// Press or release
    #[serde(rename = "type")]
    pub kind: KeyAction,
    /// Symbolic key token (e.g. "a", "shift", "esc")
    pub key: String,
    /// Seconds since the start of the recording
    #[serde(rename = "time")]
    pub offset: f64,
}

impl KeyEvent {
    /// Create a new event, rounding the offset to milliseconds
    pub fn new(kind: KeyAction, key: impl Into<String>, offset: f64) -> Self {
        Self {
            kind,
            key: key.into(),
            offset: round_millis(offset),
        }
    }

    /// Create a key-down event
    pub fn press(key: impl Into<String>, offset: f64) -> Self {
        Self::new(KeyAction::Press, key, offset)
    }

    /// Create a key-up event
    pub fn release(key: impl Into<String>, offset: f64) -> Self {
        Self::new(KeyAction::Release, key, offset)
    }

    /// Offset as a Duration
    ///
    /// Negative or NaN offsets map to zero, offsets too large for a Duration
    /// saturate to [`Duration::MAX`].
    pub fn offset_duration(&self) -> Duration {
        match Duration::try_from_secs_f64(self.offset) {
            Ok(duration) => duration,
            Err(_) if self.offset > 0.0 => Duration::MAX,
            Err(_) => Duration::ZERO,
        }
    }
}

/// Ordered sequence of key events forming one recorded macro
///
/// Insertion order is playback order. Offsets are non-negative and
/// non-decreasing; every public constructor enforces this.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventLog {
    events: Vec<KeyEvent>,
}

impl EventLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a log from events, validating the ordering invariants
    pub fn from_events(events: Vec<KeyEvent>) -> Result<Self> {
        Self::validate(&events)?;
        Ok(Self { events })
    }

    /// Check that a sequence of events forms a valid log
    pub fn validate(events: &[KeyEvent]) -> Result<()> {
        let mut previous = 0.0_f64;
        for (index, event) in events.iter().enumerate() {
            if !event.offset.is_finite() {
                return Err(KeyMacroError::Format(format!(
                    "event {}: time is not a finite number",
                    index
                )));
            }
            if event.offset < 0.0 {
                return Err(KeyMacroError::Format(format!(
                    "event {}: negative time {}",
                    index, event.offset
                )));
            }
            if Duration::try_from_secs_f64(event.offset).is_err() {
                return Err(KeyMacroError::Format(format!(
                    "event {}: time {} is out of range",
                    index, event.offset
                )));
            }
            if event.offset < previous {
                return Err(KeyMacroError::Format(format!(
                    "event {}: time {} is earlier than the preceding event ({})",
                    index, event.offset, previous
                )));
            }
            if event.key.is_empty() {
                return Err(KeyMacroError::Format(format!(
                    "event {}: key is empty",
                    index
                )));
            }
            previous = event.offset;
        }
        Ok(())
    }

    /// Append an event, clamping its offset so the log stays non-decreasing
    pub(crate) fn push_clamped(&mut self, kind: KeyAction, key: String, offset: Duration) {
        let floor = self.events.last().map(|e| e.offset).unwrap_or(0.0);
        let offset = round_millis(offset.as_secs_f64()).max(floor);
        self.events.push(KeyEvent { kind, key, offset });
    }

    /// All events in playback order
    pub fn events(&self) -> &[KeyEvent] {
        &self.events
    }

    /// Iterate over events in playback order
    pub fn iter(&self) -> std::slice::Iter<'_, KeyEvent> {
        self.events.iter()
    }

    /// Consume the log, returning its events
    pub fn into_events(self) -> Vec<KeyEvent> {
        self.events
    }

    /// Number of events
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Check if the log is empty
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Nominal span of one playback iteration (offset of the last event)
    pub fn duration(&self) -> Duration {
        self.events
            .last()
            .map(|e| e.offset_duration())
            .unwrap_or(Duration::ZERO)
    }

    /// Number of key-down events
    pub fn press_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| e.kind == KeyAction::Press)
            .count()
    }
}

impl<'a> IntoIterator for &'a EventLog {
    type Item = &'a KeyEvent;
    type IntoIter = std::slice::Iter<'a, KeyEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}

/// Number of times an event log is replayed in one playback invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepeatCount {
    /// Replay a fixed, positive number of times
    Finite(NonZeroU32),
    /// Replay until cancelled
    Unbounded,
}

impl Default for RepeatCount {
    fn default() -> Self {
        RepeatCount::Finite(NonZeroU32::MIN)
    }
}

impl RepeatCount {
    /// Replay exactly once
    pub const ONCE: RepeatCount = RepeatCount::Finite(NonZeroU32::MIN);

    /// Create a finite repeat count, rejecting zero
    pub fn finite(count: u32) -> Result<Self> {
        NonZeroU32::new(count)
            .map(RepeatCount::Finite)
            .ok_or_else(|| {
                KeyMacroError::InvalidArgument("repeat count must be at least 1".to_string())
            })
    }

    /// Whether this count has no upper bound
    pub fn is_unbounded(&self) -> bool {
        matches!(self, RepeatCount::Unbounded)
    }

    /// Whether another iteration should run after `completed` iterations
    pub fn allows(&self, completed: u64) -> bool {
        match self {
            RepeatCount::Finite(n) => completed < u64::from(n.get()),
            RepeatCount::Unbounded => true,
        }
    }
}

impl fmt::Display for RepeatCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepeatCount::Finite(n) => write!(f, "{}", n),
            RepeatCount::Unbounded => f.write_str("inf"),
        }
    }
}

impl FromStr for RepeatCount {
    type Err = KeyMacroError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "inf" | "infinite" | "unbounded" | "forever" => Ok(RepeatCount::Unbounded),
            other => {
                let count: u32 = other.parse().map_err(|_| {
                    KeyMacroError::InvalidArgument(format!(
                        "repeat count '{}' is neither a positive integer nor 'inf'",
                        trimmed
                    ))
                })?;
                RepeatCount::finite(count)
            }
        }
    }
}
