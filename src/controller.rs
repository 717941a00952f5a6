//! Non-blocking control surface for front-ends
//!
//! [`MacroController`] is what a GUI (or the CLI) drives: start/stop recording
//! to a file and start/stop playback from a file. Every call returns
//! immediately. Errors that abort an operation are returned synchronously and
//! leave the controller idle; everything that happens later is reported as a
//! [`ControllerEvent`] on the [`StatusReceiver`].
//!
//! Only one session runs at a time: starting playback while recording (or the
//! reverse) fails with [`KeyMacroError::Busy`].
//!
//! # Example
//!
//! ```ignore
//! let (mut controller, status) = MacroController::new(config, hook, dispatcher);
//! controller.start_recording("macro.json")?;
//! // ... user presses esc ...
//! for event in status.drain() {
//!     if let ControllerEvent::RecordingStopped { saved_path, .. } = event {
//!         controller.start_playback(&saved_path, "3".parse()?)?;
//!     }
//! }
//! ```

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::config::AppConfig;
use crate::error::{KeyMacroError, Result};
use crate::input::{KeyDispatcher, KeyboardHook};
use crate::session::{
    serializer, CancelToken, PlaybackOutcome, PlaybackReport, Player, Recorder,
    RecordingStopHandle, SessionState,
};
use crate::types::RepeatCount;

/// Why a playback ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// All iterations ran
    Completed,
    /// Stopped by the user
    Cancelled,
    /// The playback thread failed
    Failed(String),
}

/// Status notification from the controller
#[derive(Debug, Clone)]
pub enum ControllerEvent {
    /// Capture began
    RecordingStarted { destination: PathBuf },
    /// Capture ended and the log was saved
    RecordingStopped {
        saved_path: PathBuf,
        event_count: usize,
    },
    /// Capture ended but the log could not be saved
    RecordingFailed { destination: PathBuf, error: String },
    /// Replay began
    PlaybackStarted { source: PathBuf, repeat: RepeatCount },
    /// Replay ended
    PlaybackStopped {
        reason: StopReason,
        report: Option<PlaybackReport>,
    },
}

/// Front-end side of the status channel
#[derive(Debug, Clone)]
pub struct StatusReceiver {
    receiver: Receiver<ControllerEvent>,
}

impl StatusReceiver {
    /// Take every pending notification
    pub fn drain(&self) -> Vec<ControllerEvent> {
        self.receiver.try_iter().collect()
    }

    /// Take one pending notification, if any
    pub fn try_recv(&self) -> Option<ControllerEvent> {
        self.receiver.try_recv().ok()
    }

    /// Wait up to `timeout` for the next notification
    pub fn recv_timeout(&self, timeout: Duration) -> Option<ControllerEvent> {
        match self.receiver.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }
}

#[derive(Debug)]
struct ActiveRecording {
    stop: RecordingStopHandle,
    supervisor: JoinHandle<()>,
}

#[derive(Debug)]
struct ActivePlayback {
    cancel: CancelToken,
    supervisor: JoinHandle<()>,
}

/// Owns the recorder/player lifecycle on behalf of a front-end
pub struct MacroController {
    /// Application configuration
    config: AppConfig,
    /// Keyboard input source for recording
    hook: Arc<dyn KeyboardHook>,
    /// Synthetic output for playback
    dispatcher: Arc<dyn KeyDispatcher>,
    /// Sender for status notifications
    status_tx: Sender<ControllerEvent>,
    recording: Option<ActiveRecording>,
    playback: Option<ActivePlayback>,
}

impl std::fmt::Debug for MacroController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MacroController")
            .field("config", &self.config)
            .field("recording", &self.recording)
            .field("playback", &self.playback)
            .finish_non_exhaustive()
    }
}

impl MacroController {
    /// Create a controller and the receiver for its notifications
    pub fn new(
        config: AppConfig,
        hook: Arc<dyn KeyboardHook>,
        dispatcher: Arc<dyn KeyDispatcher>,
    ) -> (Self, StatusReceiver) {
        let (status_tx, status_rx) = bounded(256);
        let controller = Self {
            config,
            hook,
            dispatcher,
            status_tx,
            recording: None,
            playback: None,
        };
        (controller, StatusReceiver { receiver: status_rx })
    }

    /// Which session, if any, is active
    pub fn state(&self) -> SessionState {
        if self.is_recording() {
            SessionState::Recording
        } else if self.is_playing() {
            SessionState::Playing
        } else {
            SessionState::Idle
        }
    }

    /// Check if a recording is in progress (including its final save)
    pub fn is_recording(&self) -> bool {
        self.recording
            .as_ref()
            .is_some_and(|r| !r.supervisor.is_finished())
    }

    /// Check if a playback is in progress
    pub fn is_playing(&self) -> bool {
        self.playback
            .as_ref()
            .is_some_and(|p| !p.supervisor.is_finished())
    }

    /// Start recording; the log is saved to `destination` when it stops
    ///
    /// An unwritable destination fails here with an IO error, before any key
    /// is captured.
    pub fn start_recording(&mut self, destination: impl Into<PathBuf>) -> Result<()> {
        self.reap();
        if self.is_recording() {
            return Err(KeyMacroError::AlreadyRecording);
        }
        if self.is_playing() {
            return Err(KeyMacroError::Busy("playback"));
        }

        let destination = destination.into();
        serializer::prepare_destination(&destination)?;

        let mut recorder = Recorder::new(Arc::clone(&self.hook), self.config.recording.clone());
        let stop = recorder.start()?;

        self.notify(ControllerEvent::RecordingStarted {
            destination: destination.clone(),
        });

        let status_tx = self.status_tx.clone();
        let storage = self.config.storage.clone();
        let supervisor = std::thread::Builder::new()
            .name("keymacro-record-supervisor".to_string())
            .spawn(move || {
                let outcome = recorder.wait().and_then(|log| {
                    let log = log.unwrap_or_default();
                    serializer::save_with(&log, &destination, &storage).map(|()| log.len())
                });
                let event = match outcome {
                    Ok(event_count) => ControllerEvent::RecordingStopped {
                        saved_path: destination,
                        event_count,
                    },
                    Err(e) => {
                        tracing::error!("Recording could not be saved: {}", e);
                        ControllerEvent::RecordingFailed {
                            destination,
                            error: e.to_string(),
                        }
                    }
                };
                send(&status_tx, event);
            })
            .map_err(|e| {
                stop.stop();
                KeyMacroError::Channel(format!("failed to spawn recording supervisor: {}", e))
            })?;

        self.recording = Some(ActiveRecording { stop, supervisor });
        Ok(())
    }

    /// Ask the current recording to stop; no-op when not recording
    pub fn stop_recording(&mut self) {
        if let Some(recording) = &self.recording {
            recording.stop.stop();
        }
    }

    /// Load `source` and start replaying it `repeat` times
    pub fn start_playback(&mut self, source: impl AsRef<Path>, repeat: RepeatCount) -> Result<()> {
        self.reap();
        if self.is_playing() {
            return Err(KeyMacroError::Busy("playback"));
        }
        if self.is_recording() {
            return Err(KeyMacroError::Busy("recording"));
        }

        let source = source.as_ref().to_path_buf();
        let log = serializer::load(&source)?;

        let player = Player::new(Arc::clone(&self.dispatcher), self.config.playback.clone());
        let handle = player.start(Arc::new(log), repeat)?;
        let cancel = handle.cancel_token();

        self.notify(ControllerEvent::PlaybackStarted { source, repeat });

        let status_tx = self.status_tx.clone();
        let supervisor = std::thread::Builder::new()
            .name("keymacro-play-supervisor".to_string())
            .spawn(move || {
                let event = match handle.wait() {
                    Ok(report) => ControllerEvent::PlaybackStopped {
                        reason: match report.outcome {
                            PlaybackOutcome::Completed => StopReason::Completed,
                            PlaybackOutcome::Cancelled => StopReason::Cancelled,
                        },
                        report: Some(report),
                    },
                    Err(e) => ControllerEvent::PlaybackStopped {
                        reason: StopReason::Failed(e.to_string()),
                        report: None,
                    },
                };
                send(&status_tx, event);
            })
            .map_err(|e| {
                cancel.cancel();
                KeyMacroError::Channel(format!("failed to spawn playback supervisor: {}", e))
            })?;

        self.playback = Some(ActivePlayback { cancel, supervisor });
        Ok(())
    }

    /// Ask the current playback to stop; no-op when not playing
    pub fn stop_playback(&mut self) {
        if let Some(playback) = &self.playback {
            playback.cancel.cancel();
        }
    }

    /// Block until every session has finished and its notification was sent
    pub fn wait_idle(&mut self) {
        if let Some(recording) = self.recording.take() {
            let _ = recording.supervisor.join();
        }
        if let Some(playback) = self.playback.take() {
            let _ = playback.supervisor.join();
        }
    }

    /// Drop bookkeeping for sessions that already ended
    fn reap(&mut self) {
        if self
            .recording
            .as_ref()
            .is_some_and(|r| r.supervisor.is_finished())
        {
            if let Some(recording) = self.recording.take() {
                let _ = recording.supervisor.join();
            }
        }
        if self
            .playback
            .as_ref()
            .is_some_and(|p| p.supervisor.is_finished())
        {
            if let Some(playback) = self.playback.take() {
                let _ = playback.supervisor.join();
            }
        }
    }

    fn notify(&self, event: ControllerEvent) {
        send(&self.status_tx, event);
    }
}

impl Drop for MacroController {
    fn drop(&mut self) {
        self.stop_recording();
        self.stop_playback();
        self.wait_idle();
    }
}

fn send(tx: &Sender<ControllerEvent>, event: ControllerEvent) {
    match tx.try_send(event) {
        Ok(()) => {}
        Err(TrySendError::Full(event)) => {
            tracing::warn!("Status queue full, dropping {:?}", event);
        }
        Err(TrySendError::Disconnected(_)) => {}
    }
}
