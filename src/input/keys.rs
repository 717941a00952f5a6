//! Key token vocabulary
//!
//! Recorded logs name keys with lowercase tokens such as `"a"`, `"shift"`,
//! `"page up"` or `"f5"`. The engine treats tokens as opaque; this table only
//! matters where two spellings must compare equal (the stop hotkey) and where
//! a backend has to translate tokens to physical keys.

/// Canonical key tokens
pub const CANONICAL_KEYS: &[&str] = &[
    "a", "b", "c", "d", "e", "f", "g", "h", "i", "j", "k", "l", "m", "n", "o", "p", "q", "r",
    "s", "t", "u", "v", "w", "x", "y", "z", "0", "1", "2", "3", "4", "5", "6", "7", "8", "9",
    "f1", "f2", "f3", "f4", "f5", "f6", "f7", "f8", "f9", "f10", "f11", "f12", "esc", "enter",
    "space", "tab", "backspace", "caps lock", "shift", "right shift", "ctrl", "right ctrl",
    "alt", "alt gr", "left windows", "right windows", "up", "down", "left", "right", "home",
    "end", "page up", "page down", "insert", "delete", "print screen", "scroll lock", "pause",
    "num lock", "`", "-", "=", "[", "]", ";", "'", "\\", "<", ",", ".", "/", "keypad enter",
    "keypad -", "keypad +", "keypad *", "keypad /", "keypad .", "keypad 0", "keypad 1",
    "keypad 2", "keypad 3", "keypad 4", "keypad 5", "keypad 6", "keypad 7", "keypad 8",
    "keypad 9", "fn",
];

/// Alternate spellings and their canonical token
const ALIASES: &[(&str, &str)] = &[
    ("escape", "esc"),
    ("return", "enter"),
    ("spacebar", "space"),
    ("left shift", "shift"),
    ("lshift", "shift"),
    ("rshift", "right shift"),
    ("control", "ctrl"),
    ("left ctrl", "ctrl"),
    ("left control", "ctrl"),
    ("right control", "right ctrl"),
    ("left alt", "alt"),
    ("right alt", "alt gr"),
    ("altgr", "alt gr"),
    ("windows", "left windows"),
    ("win", "left windows"),
    ("super", "left windows"),
    ("meta", "left windows"),
    ("cmd", "left windows"),
    ("command", "left windows"),
    ("capslock", "caps lock"),
    ("pageup", "page up"),
    ("pgup", "page up"),
    ("pagedown", "page down"),
    ("pgdn", "page down"),
    ("del", "delete"),
    ("ins", "insert"),
    ("up arrow", "up"),
    ("down arrow", "down"),
    ("left arrow", "left"),
    ("right arrow", "right"),
    ("prtsc", "print screen"),
    ("numlock", "num lock"),
    ("scrolllock", "scroll lock"),
];

/// Normalize a key token to its canonical spelling
///
/// Case and runs of whitespace are folded; aliases map to their canonical
/// token. Unknown tokens come back folded but otherwise unchanged.
pub fn normalize(token: &str) -> String {
    let folded = token
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();

    // A lone space character names the space bar
    if folded.is_empty() && token.contains(' ') {
        return "space".to_string();
    }

    ALIASES
        .iter()
        .find(|(alias, _)| *alias == folded)
        .map(|(_, canonical)| (*canonical).to_string())
        .unwrap_or(folded)
}

/// Whether two tokens name the same key
pub fn same_key(a: &str, b: &str) -> bool {
    normalize(a) == normalize(b)
}

/// Whether a token (after normalization) is in the canonical vocabulary
pub fn is_known(token: &str) -> bool {
    let normalized = normalize(token);
    CANONICAL_KEYS.contains(&normalized.as_str())
}
