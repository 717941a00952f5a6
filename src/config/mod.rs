//! Configuration module for KeyMacro-RS
//!
//! This module handles the persistent application configuration: the stop
//! hotkey, playback pacing, the shape of saved recordings and logging.
//!
//! # App Data Location
//!
//! Configuration is stored in the platform-appropriate location:
//! - **Linux**: `~/.local/share/dev.keymacro.keymacro-rs/`
//! - **macOS**: `~/Library/Application Support/dev.keymacro.keymacro-rs/`
//! - **Windows**: `%APPDATA%\dev.keymacro.keymacro-rs\`
//!
//! # Files
//!
//! - `config.toml` - [`AppConfig`]
//!
//! # Example
//!
//! ```toml
//! [recording]
//! stop_key = "f12"
//!
//! [playback]
//! poll_interval_ms = 1
//! default_repeat = "inf"
//! ```

pub mod settings;

pub use settings::*;

use crate::error::{KeyMacroError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application identifier for data directories
pub const APP_ID: &str = "dev.keymacro.keymacro-rs";

/// Config filename
pub const CONFIG_FILE: &str = "config.toml";

// ==================== App Data Directory ====================

/// Get the application data directory path
pub fn app_data_dir() -> Option<PathBuf> {
    dirs_next::data_dir().map(|p| p.join(APP_ID))
}

/// Ensure the app data directory exists
pub fn ensure_app_data_dir() -> Result<PathBuf> {
    let dir = app_data_dir().ok_or_else(|| {
        KeyMacroError::Config("Could not determine app data directory".to_string())
    })?;

    if !dir.exists() {
        std::fs::create_dir_all(&dir).map_err(|e| {
            KeyMacroError::Config(format!("Failed to create app data directory: {}", e))
        })?;
    }

    Ok(dir)
}

/// Get the path to the default config file
pub fn config_path() -> Option<PathBuf> {
    app_data_dir().map(|p| p.join(CONFIG_FILE))
}

// ==================== App Config ====================

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Recording behaviour
    pub recording: RecordingSettings,

    /// Playback behaviour
    pub playback: PlaybackSettings,

    /// Persistence behaviour
    pub storage: StorageSettings,

    /// Logging behaviour
    pub logging: LoggingSettings,
}

impl AppConfig {
    /// Load config from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            KeyMacroError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        toml::from_str(&content).map_err(|e| {
            KeyMacroError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })
    }

    /// Load config from the given path, or the default location when `None`
    ///
    /// A missing default config is not an error; any other failure falls back
    /// to defaults with a warning.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match config_path() {
                Some(p) if p.exists() => p,
                _ => return Self::default(),
            },
        };

        Self::load(&path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Save config as TOML
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                KeyMacroError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| KeyMacroError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content).map_err(|e| {
            KeyMacroError::Config(format!("Failed to write config file {:?}: {}", path, e))
        })
    }

    /// Save config to the default location
    pub fn save_default(&self) -> Result<()> {
        let dir = ensure_app_data_dir()?;
        self.save(dir.join(CONFIG_FILE))
    }
}
