//! Integration tests for playback pacing and cancellation
//!
//! These tests measure wall-clock behaviour, so they run serially:
//! - Relative timing is reproduced
//! - Each repeat restarts its clock after the previous one ends
//! - Cancellation is prompt and final

mod common;

use common::builders::EventLogBuilder;
use common::mock_helpers::{create_test_devices, SlowDispatcher};
use keymacro_rs::config::PlaybackSettings;
use keymacro_rs::session::{CancelToken, PlaybackOutcome, Player};
use keymacro_rs::{EventLog, KeyAction, RepeatCount, SessionState};
use serial_test::serial;
use std::sync::Arc;
use std::time::{Duration, Instant};

const TOLERANCE: Duration = Duration::from_millis(25);

fn fast_settings() -> PlaybackSettings {
    PlaybackSettings {
        poll_interval_ms: 1,
        ..Default::default()
    }
}

#[test]
#[serial]
fn test_relative_timing_reproduced() {
    let log = EventLogBuilder::new()
        .press("a", 0.0)
        .release("a", 0.5)
        .press("b", 1.0)
        .build();
    let (_, dispatcher) = create_test_devices();

    let report = Player::new(dispatcher.clone(), fast_settings())
        .start(Arc::new(log), RepeatCount::ONCE)
        .unwrap()
        .wait()
        .unwrap();
    assert_eq!(report.outcome, PlaybackOutcome::Completed);

    let records = dispatcher.records();
    assert_eq!(records.len(), 3);
    assert_eq!(records[0].action, KeyAction::Press);
    assert_eq!(records[1].action, KeyAction::Release);
    assert_eq!(records[2].key, "b");

    let first = records[0].at;
    common::assert_duration_near(records[1].at - first, Duration::from_millis(500), TOLERANCE);
    common::assert_duration_near(records[2].at - first, Duration::from_millis(1000), TOLERANCE);
}

#[test]
#[serial]
fn test_each_repeat_starts_after_previous_ends() {
    // Slow dispatch makes an iteration last longer than the log itself
    let log = EventLogBuilder::new().press("x", 0.0).release("x", 0.1).build();
    let dispatcher = Arc::new(SlowDispatcher::new(Duration::from_millis(50)));

    let report = Player::new(dispatcher.clone(), fast_settings())
        .start(Arc::new(log), RepeatCount::finite(2).unwrap())
        .unwrap()
        .wait()
        .unwrap();
    assert_eq!(report.iterations_completed, 2);

    let records = dispatcher.inner.records();
    assert_eq!(records.len(), 4);
    // Second iteration: immediate press (50ms), release due 100ms after it began
    common::assert_duration_near(
        records[3].at - records[1].at,
        Duration::from_millis(150),
        TOLERANCE,
    );
    assert!(records[2].at >= records[1].at);
}

#[test]
#[serial]
fn test_cancel_is_prompt() {
    let log = EventLogBuilder::new().press("a", 0.0).release("a", 5.0).build();
    let (_, dispatcher) = create_test_devices();

    let handle = Player::new(dispatcher.clone(), PlaybackSettings::default())
        .start(Arc::new(log), RepeatCount::ONCE)
        .unwrap();
    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(handle.state(), SessionState::Playing);

    let cancelled_at = Instant::now();
    handle.cancel();
    let report = handle.wait().unwrap();

    assert!(
        cancelled_at.elapsed() < Duration::from_millis(50),
        "cancellation took {:?}",
        cancelled_at.elapsed()
    );
    assert_eq!(report.outcome, PlaybackOutcome::Cancelled);
    assert_eq!(dispatcher.count(), 1);
}

#[test]
#[serial]
fn test_unbounded_runs_until_cancelled() {
    let log = EventLogBuilder::new().tap("r", 0.0, 0.01).build();
    let (_, dispatcher) = create_test_devices();

    let handle = Player::new(dispatcher.clone(), fast_settings())
        .start(Arc::new(log), RepeatCount::Unbounded)
        .unwrap();
    std::thread::sleep(Duration::from_millis(200));
    assert!(handle.iterations_completed() >= 2);

    handle.cancel();
    let report = handle.wait().unwrap();
    let after_stop = dispatcher.count();

    assert!(report.was_cancelled());
    assert!(report.iterations_completed >= 2);
    assert_eq!(after_stop as u64, report.events_dispatched);

    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(dispatcher.count(), after_stop);
}

#[test]
#[serial]
fn test_dropping_handle_stops_playback() {
    let log = EventLogBuilder::new().tap("d", 0.0, 0.005).build();
    let (_, dispatcher) = create_test_devices();

    let handle = Player::new(dispatcher.clone(), fast_settings())
        .start(Arc::new(log), RepeatCount::Unbounded)
        .unwrap();
    std::thread::sleep(Duration::from_millis(50));
    drop(handle);

    let count = dispatcher.count();
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(dispatcher.count(), count);
}

#[test]
#[serial]
fn test_dispatch_failures_do_not_stop_playback() {
    let log = EventLogBuilder::new()
        .tap("a", 0.0, 0.01)
        .tap("b", 0.02, 0.01)
        .tap("c", 0.04, 0.01)
        .build();
    let (_, dispatcher) = create_test_devices();
    dispatcher.reject_key("b");

    let report = Player::new(dispatcher.clone(), fast_settings())
        .start(Arc::new(log), RepeatCount::ONCE)
        .unwrap()
        .wait()
        .unwrap();

    assert_eq!(report.outcome, PlaybackOutcome::Completed);
    assert_eq!(report.events_dispatched, 4);
    assert_eq!(report.failure_count, 2);
    assert_eq!(report.dispatch_failures[0].key, "b");
    assert_eq!(report.dispatch_failures[0].index, 2);
    assert_eq!(dispatcher.records().len(), 6);
    assert_eq!(dispatcher.delivered().len(), 4);
}

#[test]
#[serial]
fn test_event_after_failure_keeps_schedule() {
    // Every action, rejected or not, takes 30ms to come back
    let log = EventLogBuilder::new()
        .press("a", 0.0)
        .press("b", 0.2)
        .press("c", 0.4)
        .build();
    let dispatcher = Arc::new(SlowDispatcher::new(Duration::from_millis(30)));
    dispatcher.inner.reject_key("b");

    let report = Player::new(dispatcher.clone(), fast_settings())
        .start(Arc::new(log), RepeatCount::ONCE)
        .unwrap()
        .wait()
        .unwrap();
    assert_eq!(report.failure_count, 1);

    let records = dispatcher.inner.records();
    assert_eq!(records.len(), 3);
    assert!(records[1].failed);
    assert!(!records[2].failed);

    let first = records[0].at;
    common::assert_duration_near(records[1].at - first, Duration::from_millis(200), TOLERANCE);
    common::assert_duration_near(records[2].at - first, Duration::from_millis(400), TOLERANCE);
}

#[test]
#[serial]
fn test_empty_log_completes() {
    let (_, dispatcher) = create_test_devices();
    let player = Player::new(dispatcher.clone(), fast_settings());

    let started = Instant::now();
    let report = player
        .start(Arc::new(EventLog::new()), RepeatCount::Unbounded)
        .unwrap()
        .wait()
        .unwrap();
    assert!(started.elapsed() < Duration::from_millis(100));
    assert_eq!(report.outcome, PlaybackOutcome::Completed);

    let report = player.play_blocking(&EventLog::new(), RepeatCount::finite(3).unwrap(), &CancelToken::new());
    assert_eq!(report.iterations_completed, 3);
    assert_eq!(dispatcher.count(), 0);
}

#[test]
#[serial]
fn test_shared_log_plays_concurrently() {
    let log = Arc::new(EventLogBuilder::new().typed("hey", 0.0, 0.02).build());
    let (_, first) = create_test_devices();
    let (_, second) = create_test_devices();

    let a = Player::new(first.clone(), fast_settings())
        .start(Arc::clone(&log), RepeatCount::ONCE)
        .unwrap();
    let b = Player::new(second.clone(), fast_settings())
        .start(Arc::clone(&log), RepeatCount::ONCE)
        .unwrap();

    assert_eq!(a.wait().unwrap().events_dispatched, 6);
    assert_eq!(b.wait().unwrap().events_dispatched, 6);
    assert_eq!(first.records(), first.delivered());
    assert_eq!(second.count(), 6);
}
