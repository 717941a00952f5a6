//! OS keyboard hook and synthetic input via `rdev`
//!
//! `rdev::listen` installs a process-wide hook and never returns while it is
//! active, so a single listener thread is started on first subscription and
//! fans events out through a shared [`SubscriberRegistry`]. Unsubscribing
//! detaches the channel; the listener itself stays installed for the life of
//! the process.

use super::{KeyDispatcher, KeyboardHook, RawKeyEvent, RawTransition, SubscriberRegistry, Subscription};
use crate::error::{KeyMacroError, Result};
use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use rdev::{EventType, Key};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// How long to wait for `rdev::listen` to report an installation failure
const INSTALL_GRACE: Duration = Duration::from_millis(200);

static LISTENER: Mutex<Option<Arc<SubscriberRegistry>>> = Mutex::new(None);

/// Token table between rdev keys and recorded key names
const KEY_TABLE: &[(Key, &str)] = &[
    (Key::KeyA, "a"),
    (Key::KeyB, "b"),
    (Key::KeyC, "c"),
    (Key::KeyD, "d"),
    (Key::KeyE, "e"),
    (Key::KeyF, "f"),
    (Key::KeyG, "g"),
    (Key::KeyH, "h"),
    (Key::KeyI, "i"),
    (Key::KeyJ, "j"),
    (Key::KeyK, "k"),
    (Key::KeyL, "l"),
    (Key::KeyM, "m"),
    (Key::KeyN, "n"),
    (Key::KeyO, "o"),
    (Key::KeyP, "p"),
    (Key::KeyQ, "q"),
    (Key::KeyR, "r"),
    (Key::KeyS, "s"),
    (Key::KeyT, "t"),
    (Key::KeyU, "u"),
    (Key::KeyV, "v"),
    (Key::KeyW, "w"),
    (Key::KeyX, "x"),
    (Key::KeyY, "y"),
    (Key::KeyZ, "z"),
    (Key::Num0, "0"),
    (Key::Num1, "1"),
    (Key::Num2, "2"),
    (Key::Num3, "3"),
    (Key::Num4, "4"),
    (Key::Num5, "5"),
    (Key::Num6, "6"),
    (Key::Num7, "7"),
    (Key::Num8, "8"),
    (Key::Num9, "9"),
    (Key::F1, "f1"),
    (Key::F2, "f2"),
    (Key::F3, "f3"),
    (Key::F4, "f4"),
    (Key::F5, "f5"),
    (Key::F6, "f6"),
    (Key::F7, "f7"),
    (Key::F8, "f8"),
    (Key::F9, "f9"),
    (Key::F10, "f10"),
    (Key::F11, "f11"),
    (Key::F12, "f12"),
    (Key::Escape, "esc"),
    (Key::Return, "enter"),
    (Key::Space, "space"),
    (Key::Tab, "tab"),
    (Key::Backspace, "backspace"),
    (Key::CapsLock, "caps lock"),
    (Key::ShiftLeft, "shift"),
    (Key::ShiftRight, "right shift"),
    (Key::ControlLeft, "ctrl"),
    (Key::ControlRight, "right ctrl"),
    (Key::Alt, "alt"),
    (Key::AltGr, "alt gr"),
    (Key::MetaLeft, "left windows"),
    (Key::MetaRight, "right windows"),
    (Key::UpArrow, "up"),
    (Key::DownArrow, "down"),
    (Key::LeftArrow, "left"),
    (Key::RightArrow, "right"),
    (Key::Home, "home"),
    (Key::End, "end"),
    (Key::PageUp, "page up"),
    (Key::PageDown, "page down"),
    (Key::Insert, "insert"),
    (Key::Delete, "delete"),
    (Key::PrintScreen, "print screen"),
    (Key::ScrollLock, "scroll lock"),
    (Key::Pause, "pause"),
    (Key::NumLock, "num lock"),
    (Key::BackQuote, "`"),
    (Key::Minus, "-"),
    (Key::Equal, "="),
    (Key::LeftBracket, "["),
    (Key::RightBracket, "]"),
    (Key::SemiColon, ";"),
    (Key::Quote, "'"),
    (Key::BackSlash, "\\"),
    (Key::IntlBackslash, "<"),
    (Key::Comma, ","),
    (Key::Dot, "."),
    (Key::Slash, "/"),
    (Key::KpReturn, "keypad enter"),
    (Key::KpMinus, "keypad -"),
    (Key::KpPlus, "keypad +"),
    (Key::KpMultiply, "keypad *"),
    (Key::KpDivide, "keypad /"),
    (Key::KpDelete, "keypad ."),
    (Key::Kp0, "keypad 0"),
    (Key::Kp1, "keypad 1"),
    (Key::Kp2, "keypad 2"),
    (Key::Kp3, "keypad 3"),
    (Key::Kp4, "keypad 4"),
    (Key::Kp5, "keypad 5"),
    (Key::Kp6, "keypad 6"),
    (Key::Kp7, "keypad 7"),
    (Key::Kp8, "keypad 8"),
    (Key::Kp9, "keypad 9"),
    (Key::Function, "fn"),
];

const UNKNOWN_PREFIX: &str = "unknown:";

/// Token for an rdev key
pub fn key_to_token(key: Key) -> String {
    if let Key::Unknown(code) = key {
        return format!("{}{}", UNKNOWN_PREFIX, code);
    }
    KEY_TABLE
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, token)| (*token).to_string())
        .unwrap_or_else(|| format!("{:?}", key).to_lowercase())
}

/// rdev key for a token, accepting any alias [`super::keys::normalize`] knows
pub fn token_to_key(token: &str) -> Option<Key> {
    let normalized = super::keys::normalize(token);
    if let Some(code) = normalized.strip_prefix(UNKNOWN_PREFIX) {
        return code.parse().ok().map(Key::Unknown);
    }
    KEY_TABLE
        .iter()
        .find(|(_, t)| *t == normalized)
        .map(|(k, _)| *k)
}

fn to_raw_event(event: &rdev::Event) -> Option<RawKeyEvent> {
    let (transition, key) = match event.event_type {
        EventType::KeyPress(key) => (RawTransition::Down, key),
        EventType::KeyRelease(key) => (RawTransition::Up, key),
        _ => return None,
    };
    Some(RawKeyEvent {
        transition,
        key: key_to_token(key),
        observed_at: Instant::now(),
        // rdev does not say whether input was synthetic
        flags: 0,
    })
}

/// Start the process-wide listener if it is not running yet
fn listener() -> Result<Arc<SubscriberRegistry>> {
    let mut slot = LISTENER
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    if let Some(registry) = slot.as_ref() {
        return Ok(Arc::clone(registry));
    }

    let registry = SubscriberRegistry::new();
    let publisher = Arc::clone(&registry);
    let (failure_tx, failure_rx) = bounded::<String>(1);

    std::thread::Builder::new()
        .name("keymacro-hook".to_string())
        .spawn(move || {
            let result = rdev::listen(move |event| {
                if let Some(raw) = to_raw_event(&event) {
                    publisher.publish(raw);
                }
            });
            if let Err(e) = result {
                let _ = failure_tx.send(format!("{:?}", e));
            }
        })
        .map_err(|e| KeyMacroError::HookInstall(format!("failed to spawn hook thread: {}", e)))?;

    match failure_rx.recv_timeout(INSTALL_GRACE) {
        Ok(message) => Err(KeyMacroError::HookInstall(message)),
        // listen() returned without an error: nothing will ever be delivered
        Err(RecvTimeoutError::Disconnected) => Err(KeyMacroError::HookInstall(
            "keyboard listener exited immediately".to_string(),
        )),
        Err(RecvTimeoutError::Timeout) => {
            tracing::info!("Installed global keyboard hook");
            *slot = Some(Arc::clone(&registry));
            Ok(registry)
        }
    }
}

/// Global keyboard hook backed by `rdev::listen`
#[derive(Debug, Default)]
pub struct RdevHook;

impl RdevHook {
    /// Create a hook handle; installation happens on first subscription
    pub fn new() -> Self {
        Self
    }
}

impl KeyboardHook for RdevHook {
    fn subscribe(&self, sink: Sender<RawKeyEvent>) -> Result<Subscription> {
        Ok(listener()?.add(sink))
    }

    fn unsubscribe_all(&self) {
        let slot = LISTENER
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(registry) = slot.as_ref() {
            registry.clear();
        }
    }
}

/// Synthetic key output backed by `rdev::simulate`
#[derive(Debug, Default)]
pub struct RdevDispatcher;

impl RdevDispatcher {
    /// Create a dispatcher
    pub fn new() -> Self {
        Self
    }

    fn simulate(&self, verb: &'static str, key: &str, make: fn(Key) -> EventType) -> Result<()> {
        let physical = token_to_key(key).ok_or_else(|| KeyMacroError::Dispatch {
            action: verb,
            key: key.to_string(),
            message: "no such key".to_string(),
        })?;

        rdev::simulate(&make(physical)).map_err(|e| KeyMacroError::Dispatch {
            action: verb,
            key: key.to_string(),
            message: format!("{:?}", e),
        })
    }
}

impl KeyDispatcher for RdevDispatcher {
    fn press(&self, key: &str) -> Result<()> {
        self.simulate("press", key, EventType::KeyPress)
    }

    fn release(&self, key: &str) -> Result<()> {
        self.simulate("release", key, EventType::KeyRelease)
    }
}
