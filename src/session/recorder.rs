//! Recorder that turns a live keyboard stream into an [`EventLog`]
//!
//! Starting a recording subscribes to the keyboard hook and hands the queue to
//! a dedicated capture thread. The hook thread only enqueues; the capture
//! thread alone owns and appends to the log, so input timing is decoupled from
//! log mutation.
//!
//! # Stop hotkey
//!
//! Pressing the configured stop key (default `esc`) ends the recording exactly
//! like [`Recorder::stop`]. Unless `record_stop_key` is set, every transition
//! of the stop key is left out of the log, including ones still queued when
//! the recording ends. When it is set, the final press is followed by a
//! release at the same offset, since the real release arrives after capture
//! has ended.
//!
//! # Queue capacity
//!
//! The hook never blocks on a slow capture thread. Transitions that arrive
//! while the queue holds `queue_capacity` unprocessed events are lost; the
//! recorder logs a warning with the count when the session ends.
//!
//! Transitions a backend marks as synthetic input are not recorded and do not
//! trigger the stop key.

use crossbeam_channel::{bounded, select, Receiver, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::config::RecordingSettings;
use crate::error::{KeyMacroError, Result};
use crate::input::{keys, KeyboardHook, RawKeyEvent, Subscription};
use crate::types::{EventLog, KeyAction};

use super::types::SessionState;

/// Cloneable handle that asks a recording to stop without waiting for it
#[derive(Debug, Clone)]
pub struct RecordingStopHandle {
    tx: Sender<()>,
}

impl RecordingStopHandle {
    /// Request the capture loop to finish; idempotent
    pub fn stop(&self) {
        let _ = self.tx.try_send(());
    }
}

/// An active capture session
#[derive(Debug)]
struct RecordingSession {
    started_at: Instant,
    stop: RecordingStopHandle,
    worker: JoinHandle<EventLog>,
}

/// Records keyboard transitions into an event log
pub struct Recorder {
    /// Source of raw transitions
    hook: Arc<dyn KeyboardHook>,
    /// Stop hotkey policy and queue sizing
    settings: RecordingSettings,
    /// Session in progress (or finished but not yet collected)
    session: Option<RecordingSession>,
}

impl std::fmt::Debug for Recorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recorder")
            .field("settings", &self.settings)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

impl Recorder {
    /// Create a recorder reading from `hook`
    pub fn new(hook: Arc<dyn KeyboardHook>, settings: RecordingSettings) -> Self {
        Self {
            hook,
            settings,
            session: None,
        }
    }

    /// Current state
    pub fn state(&self) -> SessionState {
        if self.is_recording() {
            SessionState::Recording
        } else {
            SessionState::Idle
        }
    }

    /// Check if the capture loop is still running
    pub fn is_recording(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| !s.worker.is_finished())
    }

    /// Time since the current recording started
    pub fn elapsed(&self) -> Duration {
        self.session
            .as_ref()
            .map(|s| s.started_at.elapsed())
            .unwrap_or(Duration::ZERO)
    }

    /// Handle for stopping the current recording from another thread
    pub fn stop_handle(&self) -> Option<RecordingStopHandle> {
        self.session.as_ref().map(|s| s.stop.clone())
    }

    /// Start recording; returns immediately
    ///
    /// Fails with [`KeyMacroError::AlreadyRecording`] while a previous session's
    /// log has not been collected with [`stop`](Self::stop) or
    /// [`wait`](Self::wait), and with [`KeyMacroError::HookInstall`] if the
    /// keyboard hook cannot be installed. No session exists after a failure.
    pub fn start(&mut self) -> Result<RecordingStopHandle> {
        if self.session.is_some() {
            return Err(KeyMacroError::AlreadyRecording);
        }

        let (event_tx, event_rx) = bounded(self.settings.queue_capacity.max(1));
        let (stop_tx, stop_rx) = bounded(1);

        let started_at = Instant::now();
        let subscription = self.hook.subscribe(event_tx)?;

        let capture = CaptureLoop {
            started_at,
            stop_key: stop_key(&self.settings),
            record_stop_key: self.settings.record_stop_key,
            log: EventLog::new(),
        };

        let worker = std::thread::Builder::new()
            .name("keymacro-recorder".to_string())
            .spawn(move || capture.run(subscription, event_rx, stop_rx))
            .map_err(|e| KeyMacroError::Channel(format!("failed to spawn recorder thread: {}", e)))?;

        let stop = RecordingStopHandle { tx: stop_tx };
        self.session = Some(RecordingSession {
            started_at,
            stop: stop.clone(),
            worker,
        });

        tracing::info!(
            "Recording started (stop key: {})",
            self.settings.stop_key.as_str()
        );
        Ok(stop)
    }

    /// Stop recording and return the finalized log
    ///
    /// Returns `Ok(None)` when no recording is active.
    pub fn stop(&mut self) -> Result<Option<EventLog>> {
        if let Some(session) = &self.session {
            session.stop.stop();
        }
        self.wait()
    }

    /// Block until the current recording ends (stop hotkey or a stop handle)
    ///
    /// Returns `Ok(None)` when no recording is active.
    pub fn wait(&mut self) -> Result<Option<EventLog>> {
        let Some(session) = self.session.take() else {
            return Ok(None);
        };

        let log = session
            .worker
            .join()
            .map_err(|_| KeyMacroError::Channel("recorder thread panicked".to_string()))?;

        tracing::info!(
            "Recording stopped after {:.3}s with {} events",
            session.started_at.elapsed().as_secs_f64(),
            log.len()
        );
        Ok(Some(log))
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            session.stop.stop();
            let _ = session.worker.join();
        }
    }
}

fn stop_key(settings: &RecordingSettings) -> Option<String> {
    let key = keys::normalize(&settings.stop_key);
    if key.is_empty() {
        None
    } else {
        Some(key)
    }
}

/// Whether the capture loop should keep going
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

/// State owned by the capture thread
struct CaptureLoop {
    started_at: Instant,
    stop_key: Option<String>,
    record_stop_key: bool,
    log: EventLog,
}

impl CaptureLoop {
    fn run(
        mut self,
        subscription: Subscription,
        events: Receiver<RawKeyEvent>,
        stop: Receiver<()>,
    ) -> EventLog {
        let requested = loop {
            select! {
                recv(events) -> msg => match msg {
                    Ok(raw) => {
                        if self.handle(raw) == Flow::Stop {
                            tracing::debug!("Stop hotkey pressed");
                            break false;
                        }
                    }
                    Err(_) => {
                        tracing::warn!("Keyboard hook closed the event queue");
                        break false;
                    }
                },
                // A request or every stop handle being dropped
                recv(stop) -> _ => break true,
            }
        };

        let dropped = subscription.dropped();
        drop(subscription);
        if dropped > 0 {
            tracing::warn!(
                "{} key transitions were lost because the capture queue was full",
                dropped
            );
        }

        // Transitions queued before a stop request still belong to the log;
        // anything after the stop hotkey does not
        if requested {
            for raw in events.try_iter() {
                if self.handle(raw) == Flow::Stop {
                    break;
                }
            }
        }

        self.log
    }

    fn handle(&mut self, raw: RawKeyEvent) -> Flow {
        let Some(action) = raw.transition.action() else {
            tracing::trace!("Ignoring non key transition for '{}'", raw.key);
            return Flow::Continue;
        };
        if raw.is_injected() {
            tracing::trace!("Ignoring synthetic {} of '{}'", action.verb(), raw.key);
            return Flow::Continue;
        }

        let is_stop_key = self
            .stop_key
            .as_deref()
            .is_some_and(|stop| keys::normalize(&raw.key) == stop);
        let flow = if is_stop_key && action == KeyAction::Press {
            Flow::Stop
        } else {
            Flow::Continue
        };

        if is_stop_key && !self.record_stop_key {
            return flow;
        }

        let offset = raw.observed_at.saturating_duration_since(self.started_at);
        tracing::debug!("{} '{}' at {:.3}s", action.verb(), raw.key, offset.as_secs_f64());
        if flow == Flow::Stop {
            // The real release is never captured; close the press so replay
            // does not leave the stop key held down
            self.log.push_clamped(action, raw.key.clone(), offset);
            self.log.push_clamped(KeyAction::Release, raw.key, offset);
        } else {
            self.log.push_clamped(action, raw.key, offset);
        }
        flow
    }
}
