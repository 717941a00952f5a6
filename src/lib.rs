//! # KeyMacro-RS: Keyboard Macro Recorder
//!
//! Captures global keyboard activity as a timeline of press/release events,
//! saves it as JSON and replays it later with the original timing, once, a
//! fixed number of times or until stopped.
//!
//! ## Architecture
//!
//! - **Input**: [`KeyboardHook`](input::KeyboardHook) and
//!   [`KeyDispatcher`](input::KeyDispatcher) abstract the OS. `rdev` backs them
//!   with the `native` feature; scripted doubles live in [`input::mock`]
//! - **Session**: [`Recorder`](session::Recorder) and [`Player`](session::Player)
//!   run on their own threads and are stopped through cloneable handles
//! - **Serializer**: [`session::serializer`] reads and writes recordings
//! - **Controller**: [`MacroController`] is the non-blocking surface a
//!   front-end drives, reporting over crossbeam channels
//!
//! ## Configuration
//!
//! Settings are stored as TOML in the platform data directory under
//! `dev.keymacro.keymacro-rs`:
//!
//! - **Linux**: `~/.local/share/dev.keymacro.keymacro-rs/`
//! - **macOS**: `~/Library/Application Support/dev.keymacro.keymacro-rs/`
//! - **Windows**: `%APPDATA%\dev.keymacro.keymacro-rs\`
//!
//! ## Example
//!
//! ```ignore
//! use keymacro_rs::{input, session::{serializer, Player}, AppConfig, RepeatCount};
//! use std::sync::Arc;
//!
//! fn main() -> keymacro_rs::Result<()> {
//!     let config = AppConfig::load_or_default(None);
//!     let log = serializer::load("macro.json")?;
//!
//!     let player = Player::new(input::native_dispatcher()?, config.playback);
//!     let report = player.start(Arc::new(log), "3".parse::<RepeatCount>()?)?.wait()?;
//!     println!("{} iterations", report.iterations_completed);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod controller;
pub mod error;
pub mod input;
pub mod session;
pub mod types;

// Re-export commonly used types
pub use config::AppConfig;
pub use controller::{ControllerEvent, MacroController, StatusReceiver, StopReason};
pub use error::{KeyMacroError, Result, ResultExt};
pub use session::{PlaybackHandle, PlaybackReport, Player, Recorder, SessionState};
pub use types::{EventLog, KeyAction, KeyEvent, RepeatCount};
