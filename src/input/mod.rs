//! Keyboard input collaborators
//!
//! The recorder and player never talk to the operating system directly. They
//! go through two traits so that real hooks and scripted test doubles are
//! interchangeable:
//!
//! - [`KeyboardHook`] - Global key transition source. Subscribers receive
//!   [`RawKeyEvent`]s on a crossbeam channel; dropping the returned
//!   [`Subscription`] detaches them.
//! - [`KeyDispatcher`] - Synthetic key output (press / release by token).
//!
//! # Implementations
//!
//! - [`mock::ScriptedHook`] / [`mock::RecordingDispatcher`] - In-process test doubles
//! - `native::RdevHook` / `native::RdevDispatcher` - OS-level hook and
//!   synthetic input via `rdev` (feature `native`)

pub mod keys;
pub mod mock;
#[cfg(feature = "native")]
pub mod native;

use crate::error::{KeyMacroError, Result};
use crate::types::KeyAction;
use crossbeam_channel::{bounded, RecvTimeoutError, Sender, TrySendError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Kind of raw transition reported by a keyboard hook
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawTransition {
    /// Key went down
    Down,
    /// Key came up
    Up,
    /// Anything else the source reports (auto-repeat, non-key input, ...)
    Other,
}

impl RawTransition {
    /// The key action this transition records as, if any
    pub fn action(&self) -> Option<KeyAction> {
        match self {
            RawTransition::Down => Some(KeyAction::Press),
            RawTransition::Up => Some(KeyAction::Release),
            RawTransition::Other => None,
        }
    }
}

/// One transition observed by a keyboard hook
#[derive(Debug, Clone)]
pub struct RawKeyEvent {
    /// Transition kind
    pub transition: RawTransition,
    /// Key token as named by the source
    pub key: String,
    /// When the hook observed the transition
    pub observed_at: Instant,
    /// Source flags (`FLAG_*` bits)
    pub flags: u32,
}

/// The transition was generated by synthetic input rather than a person
///
/// Set by backends that can tell; the recorder leaves such transitions out.
pub const FLAG_INJECTED: u32 = 0x1;

impl RawKeyEvent {
    /// Create an event observed now
    pub fn new(transition: RawTransition, key: impl Into<String>) -> Self {
        Self {
            transition,
            key: key.into(),
            observed_at: Instant::now(),
            flags: 0,
        }
    }

    /// Mark the event with source flags
    pub fn with_flags(mut self, flags: u32) -> Self {
        self.flags |= flags;
        self
    }

    /// Check if the transition came from synthetic input
    pub fn is_injected(&self) -> bool {
        self.flags & FLAG_INJECTED != 0
    }
}

/// Source of global keyboard transitions
pub trait KeyboardHook: Send + Sync {
    /// Start delivering transitions to `sink` until the subscription is dropped
    ///
    /// Fails with [`KeyMacroError::HookInstall`] if the hook cannot be installed.
    fn subscribe(&self, sink: Sender<RawKeyEvent>) -> Result<Subscription>;

    /// Detach every subscriber
    fn unsubscribe_all(&self);

    /// Block until `key` is pressed or the timeout elapses
    ///
    /// Returns `Ok(true)` if the key was seen, `Ok(false)` on timeout.
    fn wait_for_key(&self, key: &str, timeout: Option<Duration>) -> Result<bool> {
        let wanted = keys::normalize(key);
        let (tx, rx) = bounded(256);
        let _subscription = self.subscribe(tx)?;
        let deadline = timeout.map(|t| Instant::now() + t);

        loop {
            let event = match deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    match rx.recv_timeout(remaining) {
                        Ok(event) => event,
                        Err(RecvTimeoutError::Timeout) => return Ok(false),
                        Err(RecvTimeoutError::Disconnected) => {
                            return Err(KeyMacroError::Channel(
                                "keyboard hook closed while waiting for key".to_string(),
                            ))
                        }
                    }
                }
                None => rx.recv().map_err(|_| {
                    KeyMacroError::Channel("keyboard hook closed while waiting for key".to_string())
                })?,
            };

            if event.transition == RawTransition::Down && keys::normalize(&event.key) == wanted {
                return Ok(true);
            }
        }
    }
}

/// Synthetic keyboard output
#[cfg_attr(test, mockall::automock)]
pub trait KeyDispatcher: Send + Sync {
    /// Press a key
    fn press(&self, key: &str) -> Result<()>;

    /// Release a key
    fn release(&self, key: &str) -> Result<()>;

    /// Press or release depending on `action`
    fn dispatch(&self, action: KeyAction, key: &str) -> Result<()> {
        match action {
            KeyAction::Press => self.press(key),
            KeyAction::Release => self.release(key),
        }
    }
}

// ==================== Subscriber Registry ====================

/// Fan-out of raw events to every live subscriber
///
/// Shared by hook implementations. Publishing never blocks: a subscriber whose
/// queue is full loses the event, counted in [`Subscription::dropped`], and a
/// subscriber whose receiver is gone is removed.
#[derive(Debug, Default)]
pub struct SubscriberRegistry {
    subscribers: Mutex<Vec<Subscriber>>,
    next_id: AtomicU64,
}

#[derive(Debug)]
struct Subscriber {
    id: u64,
    sink: Sender<RawKeyEvent>,
    dropped: Arc<AtomicU64>,
}

impl SubscriberRegistry {
    /// Create an empty registry
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register a sink, returning the guard that detaches it
    pub fn add(self: &Arc<Self>, sink: Sender<RawKeyEvent>) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let dropped = Arc::new(AtomicU64::new(0));
        self.lock().push(Subscriber {
            id,
            sink,
            dropped: Arc::clone(&dropped),
        });
        Subscription {
            id,
            dropped,
            registry: Arc::clone(self),
        }
    }

    /// Detach one subscriber
    pub fn remove(&self, id: u64) {
        self.lock().retain(|sub| sub.id != id);
    }

    /// Detach every subscriber
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Number of attached subscribers
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Check if no subscriber is attached
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver an event to every subscriber
    pub fn publish(&self, event: RawKeyEvent) {
        self.lock().retain(|sub| match sub.sink.try_send(event.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                // First drop only; the total is reported by the subscriber
                if sub.dropped.fetch_add(1, Ordering::Relaxed) == 0 {
                    tracing::warn!("Subscriber {} queue full, dropping '{}'", sub.id, event.key);
                }
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        });
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Subscriber>> {
        // A panic while holding the lock cannot leave the Vec half-updated
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Guard for an active hook subscription; dropping it unsubscribes
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    dropped: Arc<AtomicU64>,
    registry: Arc<SubscriberRegistry>,
}

impl Subscription {
    /// Registry-unique subscription id
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Transitions lost so far because the sink was full
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.registry.remove(self.id);
    }
}

// ==================== Native Backends ====================

/// The OS keyboard hook
#[cfg(feature = "native")]
pub fn native_hook() -> Result<Arc<dyn KeyboardHook>> {
    Ok(Arc::new(native::RdevHook::new()))
}

/// The OS keyboard hook (unavailable in this build)
#[cfg(not(feature = "native"))]
pub fn native_hook() -> Result<Arc<dyn KeyboardHook>> {
    Err(KeyMacroError::HookInstall(
        "built without the `native` feature".to_string(),
    ))
}

/// The OS synthetic input dispatcher
#[cfg(feature = "native")]
pub fn native_dispatcher() -> Result<Arc<dyn KeyDispatcher>> {
    Ok(Arc::new(native::RdevDispatcher::new()))
}

/// The OS synthetic input dispatcher (unavailable in this build)
#[cfg(not(feature = "native"))]
pub fn native_dispatcher() -> Result<Arc<dyn KeyDispatcher>> {
    Err(KeyMacroError::Dispatch {
        action: "initialize",
        key: String::new(),
        message: "built without the `native` feature".to_string(),
    })
}
