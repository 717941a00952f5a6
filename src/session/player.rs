//! Player that replays an [`EventLog`] against the wall clock
//!
//! # Pacing
//!
//! Each iteration takes its own zero point. Before dispatching an event the
//! player waits until `now - iteration_start >= event.offset`, so a slow
//! iteration never shifts the next one. Waits are sliced into chunks no longer
//! than the configured poll interval and park on a cancellation channel, so a
//! [`CancelToken::cancel`] wakes the playback thread immediately instead of
//! after the current slice.
//!
//! # Errors
//!
//! A rejected synthetic key action is logged and recorded in the
//! [`PlaybackReport`]; playback carries on with the next event.

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::config::PlaybackSettings;
use crate::error::{KeyMacroError, Result};
use crate::input::KeyDispatcher;
use crate::types::{EventLog, KeyAction, RepeatCount};

use super::types::SessionState;

/// Most dispatch failures kept in a report; later ones are only counted
pub const MAX_REPORTED_FAILURES: usize = 256;

// ==================== Cancellation ====================

#[derive(Debug)]
struct CancelInner {
    cancelled: AtomicBool,
    /// Dropped on cancel, which disconnects `wake_rx` and wakes every waiter
    wake_tx: Mutex<Option<Sender<()>>>,
    wake_rx: Receiver<()>,
}

/// Cooperative cancellation flag with an interruptible wait
#[derive(Debug, Clone)]
pub struct CancelToken {
    inner: Arc<CancelInner>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    /// Create an un-cancelled token
    pub fn new() -> Self {
        let (wake_tx, wake_rx) = bounded(0);
        Self {
            inner: Arc::new(CancelInner {
                cancelled: AtomicBool::new(false),
                wake_tx: Mutex::new(Some(wake_tx)),
                wake_rx,
            }),
        }
    }

    /// Request cancellation; idempotent
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        let sender = self
            .inner
            .wake_tx
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        drop(sender);
    }

    /// Check if cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Sleep for up to `timeout`, returning early with `true` on cancellation
    pub fn wait(&self, timeout: Duration) -> bool {
        if self.is_cancelled() {
            return true;
        }
        match self.inner.wake_rx.recv_timeout(timeout) {
            Err(RecvTimeoutError::Timeout) => self.is_cancelled(),
            _ => true,
        }
    }
}

// ==================== Reports ====================

/// How a playback ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackOutcome {
    /// Every requested iteration ran
    #[default]
    Completed,
    /// Stopped early by cancellation
    Cancelled,
}

/// A synthetic key action that the dispatcher rejected
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchFailure {
    /// Zero-based iteration
    pub iteration: u64,
    /// Index of the event within the log
    pub index: usize,
    /// Press or release
    pub action: KeyAction,
    /// Key token
    pub key: String,
    /// Error message from the dispatcher
    pub message: String,
}

/// Summary of one playback invocation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaybackReport {
    /// How playback ended
    pub outcome: PlaybackOutcome,
    /// Iterations that ran to the end
    pub iterations_completed: u64,
    /// Synthetic actions the dispatcher accepted
    pub events_dispatched: u64,
    /// Total rejected actions
    pub failure_count: u64,
    /// First rejected actions (at most [`MAX_REPORTED_FAILURES`])
    pub dispatch_failures: Vec<DispatchFailure>,
}

impl PlaybackReport {
    /// Check if playback was cancelled
    pub fn was_cancelled(&self) -> bool {
        self.outcome == PlaybackOutcome::Cancelled
    }
}

/// Live counters shared between the playback thread and its handle
#[derive(Debug, Default)]
struct PlaybackProgress {
    iterations_completed: AtomicU64,
    events_dispatched: AtomicU64,
}

// ==================== Player ====================

/// Replays event logs through a key dispatcher
pub struct Player {
    /// Synthetic key output
    dispatcher: Arc<dyn KeyDispatcher>,
    /// Pacing granularity
    settings: PlaybackSettings,
}

impl std::fmt::Debug for Player {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Player")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Player {
    /// Create a player dispatching through `dispatcher`
    pub fn new(dispatcher: Arc<dyn KeyDispatcher>, settings: PlaybackSettings) -> Self {
        Self {
            dispatcher,
            settings,
        }
    }

    /// Start replaying `log` on a background thread; returns immediately
    ///
    /// The log is shared read-only, so several players may replay the same
    /// log concurrently.
    pub fn start(&self, log: Arc<EventLog>, repeat: RepeatCount) -> Result<PlaybackHandle> {
        let cancel = CancelToken::new();
        let progress = Arc::new(PlaybackProgress::default());

        let worker_cancel = cancel.clone();
        let worker_progress = Arc::clone(&progress);
        let dispatcher = Arc::clone(&self.dispatcher);
        let settings = self.settings.clone();

        tracing::info!(
            "Playback started: {} events, repeat {}",
            log.len(),
            repeat
        );

        let worker = std::thread::Builder::new()
            .name("keymacro-player".to_string())
            .spawn(move || {
                let player = Player {
                    dispatcher,
                    settings,
                };
                player.run(&log, repeat, &worker_cancel, &worker_progress)
            })
            .map_err(|e| KeyMacroError::Channel(format!("failed to spawn player thread: {}", e)))?;

        Ok(PlaybackHandle {
            cancel,
            progress,
            worker: Some(worker),
        })
    }

    /// Replay `log` on the calling thread until done or cancelled
    pub fn play_blocking(
        &self,
        log: &EventLog,
        repeat: RepeatCount,
        cancel: &CancelToken,
    ) -> PlaybackReport {
        self.run(log, repeat, cancel, &PlaybackProgress::default())
    }

    fn run(
        &self,
        log: &EventLog,
        repeat: RepeatCount,
        cancel: &CancelToken,
        progress: &PlaybackProgress,
    ) -> PlaybackReport {
        let mut report = PlaybackReport::default();

        // Nothing to pace against; an unbounded loop would only spin
        if log.is_empty() && repeat.is_unbounded() {
            tracing::info!("Playback finished: log is empty");
            return report;
        }

        let poll = self.settings.poll_interval();
        let mut iteration = 0u64;

        while repeat.allows(iteration) {
            if cancel.is_cancelled() {
                report.outcome = PlaybackOutcome::Cancelled;
                break;
            }

            if !self.run_iteration(log, iteration, poll, cancel, progress, &mut report) {
                report.outcome = PlaybackOutcome::Cancelled;
                break;
            }

            iteration += 1;
            report.iterations_completed = iteration;
            progress.iterations_completed.store(iteration, Ordering::SeqCst);
            tracing::debug!("Iteration {} complete", iteration);
        }

        tracing::info!(
            "Playback {}: {} iterations, {} events dispatched, {} failures",
            match report.outcome {
                PlaybackOutcome::Completed => "completed",
                PlaybackOutcome::Cancelled => "cancelled",
            },
            report.iterations_completed,
            report.events_dispatched,
            report.failure_count
        );
        report
    }

    /// Run one iteration; returns `false` if it was cancelled
    fn run_iteration(
        &self,
        log: &EventLog,
        iteration: u64,
        poll: Duration,
        cancel: &CancelToken,
        progress: &PlaybackProgress,
        report: &mut PlaybackReport,
    ) -> bool {
        let iteration_start = Instant::now();

        for (index, event) in log.iter().enumerate() {
            if !wait_until(iteration_start, event.offset_duration(), poll, cancel) {
                return false;
            }

            match self.dispatcher.dispatch(event.kind, &event.key) {
                Ok(()) => {
                    report.events_dispatched += 1;
                    progress.events_dispatched.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    tracing::warn!(
                        "Dispatch failed (iteration {}, event {}): {}",
                        iteration,
                        index,
                        e
                    );
                    report.failure_count += 1;
                    if report.dispatch_failures.len() < MAX_REPORTED_FAILURES {
                        report.dispatch_failures.push(DispatchFailure {
                            iteration,
                            index,
                            action: event.kind,
                            key: event.key.clone(),
                            message: e.to_string(),
                        });
                    }
                }
            }
        }
        true
    }
}

/// Wait until `due` has elapsed since `start`
///
/// Returns `false` if cancelled first (including right at the deadline).
fn wait_until(start: Instant, due: Duration, poll: Duration, cancel: &CancelToken) -> bool {
    loop {
        let elapsed = start.elapsed();
        if elapsed >= due {
            return !cancel.is_cancelled();
        }
        if cancel.wait((due - elapsed).min(poll)) {
            return false;
        }
    }
}

// ==================== Playback Handle ====================

/// Control handle for a playback running on a background thread
///
/// Dropping the handle cancels the playback and waits for its thread.
#[derive(Debug)]
pub struct PlaybackHandle {
    cancel: CancelToken,
    progress: Arc<PlaybackProgress>,
    worker: Option<JoinHandle<PlaybackReport>>,
}

impl PlaybackHandle {
    /// Ask playback to stop before the next key action
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Token that cancels this playback
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Check if the playback thread has finished
    pub fn is_finished(&self) -> bool {
        self.worker.as_ref().map_or(true, |w| w.is_finished())
    }

    /// Playing while the thread runs, idle afterwards
    pub fn state(&self) -> SessionState {
        if self.is_finished() {
            SessionState::Idle
        } else {
            SessionState::Playing
        }
    }

    /// Iterations completed so far
    pub fn iterations_completed(&self) -> u64 {
        self.progress.iterations_completed.load(Ordering::SeqCst)
    }

    /// Actions dispatched so far
    pub fn events_dispatched(&self) -> u64 {
        self.progress.events_dispatched.load(Ordering::Relaxed)
    }

    /// Block until playback ends and return its report
    pub fn wait(mut self) -> Result<PlaybackReport> {
        match self.worker.take() {
            Some(worker) => worker
                .join()
                .map_err(|_| KeyMacroError::Channel("player thread panicked".to_string())),
            None => Ok(PlaybackReport::default()),
        }
    }
}

impl Drop for PlaybackHandle {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            self.cancel.cancel();
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::mock::RecordingDispatcher;
    use crate::input::MockKeyDispatcher;
    use crate::types::KeyEvent;
    use mockall::predicate::eq;
    use mockall::Sequence;

    fn settings() -> PlaybackSettings {
        PlaybackSettings {
            poll_interval_ms: 1,
            ..Default::default()
        }
    }

    fn tap_log(key: &str) -> EventLog {
        EventLog::from_events(vec![KeyEvent::press(key, 0.0), KeyEvent::release(key, 0.01)])
            .unwrap()
    }

    #[test]
    fn test_cancel_token_wakes_waiter() {
        let token = CancelToken::new();
        let waiter = token.clone();
        let handle = std::thread::spawn(move || {
            let start = Instant::now();
            let cancelled = waiter.wait(Duration::from_secs(10));
            (cancelled, start.elapsed())
        });

        std::thread::sleep(Duration::from_millis(20));
        token.cancel();
        let (cancelled, elapsed) = handle.join().unwrap();
        assert!(cancelled);
        assert!(elapsed < Duration::from_secs(1));
        assert!(token.wait(Duration::from_secs(10)));
    }

    #[test]
    fn test_cancel_token_timeout() {
        let token = CancelToken::new();
        assert!(!token.wait(Duration::from_millis(5)));
        assert!(!token.is_cancelled());
    }

    #[test]
    fn test_dispatches_in_order() {
        let mut mock = MockKeyDispatcher::new();
        let mut seq = Sequence::new();
        mock.expect_dispatch()
            .with(eq(KeyAction::Press), eq("q"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        mock.expect_dispatch()
            .with(eq(KeyAction::Release), eq("q"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));

        let player = Player::new(Arc::new(mock), settings());
        let report = player.play_blocking(&tap_log("q"), RepeatCount::ONCE, &CancelToken::new());
        assert_eq!(report.outcome, PlaybackOutcome::Completed);
        assert_eq!(report.events_dispatched, 2);
    }

    #[test]
    fn test_dispatch_failure_does_not_abort() {
        let mut mock = MockKeyDispatcher::new();
        mock.expect_dispatch()
            .with(eq(KeyAction::Press), eq("bad"))
            .times(2)
            .returning(|action, key| {
                Err(KeyMacroError::Dispatch {
                    action: action.verb(),
                    key: key.to_string(),
                    message: "rejected".to_string(),
                })
            });
        mock.expect_dispatch()
            .with(eq(KeyAction::Release), eq("bad"))
            .times(2)
            .returning(|_, _| Ok(()));

        let player = Player::new(Arc::new(mock), settings());
        let repeat = RepeatCount::finite(2).unwrap();
        let report = player.play_blocking(&tap_log("bad"), repeat, &CancelToken::new());

        assert_eq!(report.iterations_completed, 2);
        assert_eq!(report.events_dispatched, 2);
        assert_eq!(report.failure_count, 2);
        assert_eq!(report.dispatch_failures[1].iteration, 1);
        assert_eq!(report.dispatch_failures[0].index, 0);
    }

    #[test]
    fn test_precancelled_dispatches_nothing() {
        let mut mock = MockKeyDispatcher::new();
        mock.expect_dispatch().never();

        let token = CancelToken::new();
        token.cancel();
        let player = Player::new(Arc::new(mock), settings());
        let report = player.play_blocking(&tap_log("a"), RepeatCount::Unbounded, &token);
        assert!(report.was_cancelled());
        assert_eq!(report.iterations_completed, 0);
    }

    #[test]
    fn test_empty_log_unbounded_finishes() {
        let dispatcher = Arc::new(RecordingDispatcher::new());
        let player = Player::new(dispatcher.clone(), settings());
        let handle = player
            .start(Arc::new(EventLog::new()), RepeatCount::Unbounded)
            .unwrap();
        let report = handle.wait().unwrap();
        assert_eq!(report.outcome, PlaybackOutcome::Completed);
        assert_eq!(dispatcher.count(), 0);
    }

    #[test]
    fn test_handle_reports_progress() {
        let dispatcher = Arc::new(RecordingDispatcher::new());
        let player = Player::new(dispatcher.clone(), settings());
        let handle = player
            .start(Arc::new(tap_log("a")), RepeatCount::finite(3).unwrap())
            .unwrap();

        let report = handle.wait().unwrap();
        assert_eq!(report.iterations_completed, 3);
        assert_eq!(dispatcher.count(), 6);
    }

    #[test]
    fn test_drop_handle_cancels() {
        let dispatcher = Arc::new(RecordingDispatcher::new());
        let player = Player::new(dispatcher.clone(), settings());
        let log = EventLog::from_events(vec![KeyEvent::press("a", 30.0)]).unwrap();

        let started = Instant::now();
        let handle = player.start(Arc::new(log), RepeatCount::Unbounded).unwrap();
        assert_eq!(handle.state(), SessionState::Playing);
        drop(handle);

        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(dispatcher.count(), 0);
    }
}
