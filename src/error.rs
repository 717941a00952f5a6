//! Error handling for KeyMacro-RS
//!
//! This module defines the error type shared by the recorder, player,
//! serializer and controller, plus a Result alias used throughout the crate.

use thiserror::Error;

/// Main error type for KeyMacro-RS operations
#[derive(Error, Debug)]
pub enum KeyMacroError {
    /// A recording destination or source could not be read or written
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A persisted event log did not parse into a valid ordered sequence
    #[error("Format error: {0}")]
    Format(String),

    /// An event log could not be serialized
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The global keyboard hook could not be installed
    #[error("Failed to install keyboard hook: {0}")]
    HookInstall(String),

    /// A recording session is already active
    #[error("A recording session is already active")]
    AlreadyRecording,

    /// Another session (recording or playback) is occupying the controller
    #[error("Busy: {0} in progress")]
    Busy(&'static str),

    /// Invalid argument, e.g. a zero or unparsable repeat count
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A synthetic key action was rejected by the OS
    #[error("Failed to dispatch {action} for key '{key}': {message}")]
    Dispatch {
        action: &'static str,
        key: String,
        message: String,
    },

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors related to channel communication or worker threads
    #[error("Channel error: {0}")]
    Channel(String),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<KeyMacroError>,
    },
}

impl KeyMacroError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        KeyMacroError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, skipping any context wrappers
    pub fn root(&self) -> &KeyMacroError {
        match self {
            KeyMacroError::WithContext { source, .. } => source.root(),
            other => other,
        }
    }

    /// Whether this is a malformed-log error (looking through context)
    pub fn is_format(&self) -> bool {
        matches!(self.root(), KeyMacroError::Format(_))
    }

    /// Whether this is an IO error (looking through context)
    pub fn is_io(&self) -> bool {
        matches!(self.root(), KeyMacroError::Io(_))
    }
}

/// Result type alias for KeyMacro-RS operations
pub type Result<T> = std::result::Result<T, KeyMacroError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, std::io::Error> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| KeyMacroError::Io(e).with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| KeyMacroError::Io(e).with_context(f()))
    }
}
