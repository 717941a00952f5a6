//! In-process keyboard hook and dispatcher for testing without OS access
//!
//! [`ScriptedHook`] lets a test (or a demo) inject transitions as if a user
//! had typed them. [`RecordingDispatcher`] captures every synthetic action with
//! the instant it was dispatched and can be told to reject specific keys.

use super::{
    KeyDispatcher, KeyboardHook, RawKeyEvent, RawTransition, SubscriberRegistry, Subscription,
    FLAG_INJECTED,
};
use crate::error::{KeyMacroError, Result};
use crate::types::KeyAction;
use crossbeam_channel::Sender;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Keyboard hook driven by explicit calls
#[derive(Debug)]
pub struct ScriptedHook {
    registry: Arc<SubscriberRegistry>,
    refuse_install: AtomicBool,
}

impl Default for ScriptedHook {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedHook {
    /// Create a hook that accepts subscriptions
    pub fn new() -> Self {
        Self {
            registry: SubscriberRegistry::new(),
            refuse_install: AtomicBool::new(false),
        }
    }

    /// Create a hook whose installation always fails
    pub fn refusing() -> Self {
        let hook = Self::new();
        hook.set_refuse_install(true);
        hook
    }

    /// Make subsequent `subscribe` calls fail (e.g. simulate missing privileges)
    pub fn set_refuse_install(&self, refuse: bool) {
        self.refuse_install.store(refuse, Ordering::SeqCst);
    }

    /// Deliver a transition observed now
    pub fn emit(&self, transition: RawTransition, key: &str) {
        self.emit_event(RawKeyEvent::new(transition, key));
    }

    /// Deliver a prepared event
    pub fn emit_event(&self, event: RawKeyEvent) {
        self.registry.publish(event);
    }

    /// Deliver a transition marked as synthetic input
    pub fn emit_injected(&self, transition: RawTransition, key: &str) {
        self.emit_event(RawKeyEvent::new(transition, key).with_flags(FLAG_INJECTED));
    }

    /// Deliver a key-down
    pub fn press(&self, key: &str) {
        self.emit(RawTransition::Down, key);
    }

    /// Deliver a key-up
    pub fn release(&self, key: &str) {
        self.emit(RawTransition::Up, key);
    }

    /// Deliver a key-down followed by a key-up
    pub fn tap(&self, key: &str) {
        self.press(key);
        self.release(key);
    }

    /// Number of attached subscribers
    pub fn subscriber_count(&self) -> usize {
        self.registry.len()
    }
}

impl KeyboardHook for ScriptedHook {
    fn subscribe(&self, sink: Sender<RawKeyEvent>) -> Result<Subscription> {
        if self.refuse_install.load(Ordering::SeqCst) {
            return Err(KeyMacroError::HookInstall(
                "scripted hook refused installation".to_string(),
            ));
        }
        Ok(self.registry.add(sink))
    }

    fn unsubscribe_all(&self) {
        self.registry.clear();
    }
}

/// One synthetic action captured by [`RecordingDispatcher`]
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchRecord {
    /// Press or release
    pub action: KeyAction,
    /// Key token
    pub key: String,
    /// When it was dispatched, relative to the dispatcher's creation
    pub at: Duration,
    /// Whether the dispatch was rejected
    pub failed: bool,
}

/// Dispatcher that records every action instead of touching the OS
#[derive(Debug)]
pub struct RecordingDispatcher {
    created: Instant,
    records: Mutex<Vec<DispatchRecord>>,
    rejected_keys: Mutex<HashSet<String>>,
}

impl Default for RecordingDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingDispatcher {
    /// Create an empty dispatcher
    pub fn new() -> Self {
        Self {
            created: Instant::now(),
            records: Mutex::new(Vec::new()),
            rejected_keys: Mutex::new(HashSet::new()),
        }
    }

    /// Reject every action on `key` with a dispatch error
    pub fn reject_key(&self, key: impl Into<String>) {
        lock(&self.rejected_keys).insert(key.into());
    }

    /// Instant the dispatcher was created (time origin of `DispatchRecord::at`)
    pub fn created(&self) -> Instant {
        self.created
    }

    /// All captured actions, in dispatch order
    pub fn records(&self) -> Vec<DispatchRecord> {
        lock(&self.records).clone()
    }

    /// Actions that were accepted
    pub fn delivered(&self) -> Vec<DispatchRecord> {
        lock(&self.records)
            .iter()
            .filter(|r| !r.failed)
            .cloned()
            .collect()
    }

    /// Number of captured actions, accepted or not
    pub fn count(&self) -> usize {
        lock(&self.records).len()
    }

    fn record(&self, action: KeyAction, key: &str) -> Result<()> {
        let failed = lock(&self.rejected_keys).contains(key);
        lock(&self.records).push(DispatchRecord {
            action,
            key: key.to_string(),
            at: self.created.elapsed(),
            failed,
        });

        if failed {
            Err(KeyMacroError::Dispatch {
                action: action.verb(),
                key: key.to_string(),
                message: "rejected by recording dispatcher".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

impl KeyDispatcher for RecordingDispatcher {
    fn press(&self, key: &str) -> Result<()> {
        self.record(KeyAction::Press, key)
    }

    fn release(&self, key: &str) -> Result<()> {
        self.record(KeyAction::Release, key)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;

    #[test]
    fn test_scripted_hook_delivers() {
        let hook = ScriptedHook::new();
        let (tx, rx) = unbounded();
        let _sub = hook.subscribe(tx).unwrap();

        hook.tap("a");
        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].transition, RawTransition::Down);
        assert_eq!(events[1].transition, RawTransition::Up);
    }

    #[test]
    fn test_refusing_hook() {
        let hook = ScriptedHook::refusing();
        let (tx, _rx) = unbounded();
        assert!(matches!(hook.subscribe(tx), Err(KeyMacroError::HookInstall(_))));
    }

    #[test]
    fn test_unsubscribe_all() {
        let hook = ScriptedHook::new();
        let (tx, _rx) = unbounded();
        let _sub = hook.subscribe(tx).unwrap();
        assert_eq!(hook.subscriber_count(), 1);
        hook.unsubscribe_all();
        assert_eq!(hook.subscriber_count(), 0);
    }

    #[test]
    fn test_wait_for_key() {
        let hook = Arc::new(ScriptedHook::new());
        let typist = Arc::clone(&hook);
        let handle = std::thread::spawn(move || {
            while typist.subscriber_count() == 0 {
                std::thread::sleep(Duration::from_millis(1));
            }
            typist.tap("x");
            typist.press("Escape");
        });

        assert!(hook.wait_for_key("esc", Some(Duration::from_secs(5))).unwrap());
        handle.join().unwrap();
        assert_eq!(hook.subscriber_count(), 0);
    }

    #[test]
    fn test_wait_for_key_timeout() {
        let hook = ScriptedHook::new();
        assert!(!hook.wait_for_key("esc", Some(Duration::from_millis(10))).unwrap());
    }

    #[test]
    fn test_recording_dispatcher_rejects() {
        let dispatcher = RecordingDispatcher::new();
        dispatcher.reject_key("bad");

        assert!(dispatcher.press("a").is_ok());
        assert!(dispatcher.dispatch(KeyAction::Release, "bad").is_err());
        assert_eq!(dispatcher.count(), 2);
        assert_eq!(dispatcher.delivered().len(), 1);
        assert!(dispatcher.records()[1].failed);
    }
}
