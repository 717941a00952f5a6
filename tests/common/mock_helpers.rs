//! Mock construction helpers

use keymacro_rs::input::mock::{RecordingDispatcher, ScriptedHook};
use keymacro_rs::input::KeyDispatcher;
use keymacro_rs::session::serializer;
use keymacro_rs::{EventLog, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Create a scripted hook and recording dispatcher pair
pub fn create_test_devices() -> (Arc<ScriptedHook>, Arc<RecordingDispatcher>) {
    (
        Arc::new(ScriptedHook::new()),
        Arc::new(RecordingDispatcher::new()),
    )
}

/// Save `log` into a fresh temporary directory
pub fn write_recording(log: &EventLog) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let path = dir.path().join("recording.json");
    serializer::save(log, &path).expect("failed to save recording");
    (dir, path)
}

/// Dispatcher that takes `delay` to deliver every action
#[derive(Debug)]
pub struct SlowDispatcher {
    pub inner: RecordingDispatcher,
    pub delay: Duration,
}

impl SlowDispatcher {
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: RecordingDispatcher::new(),
            delay,
        }
    }
}

impl KeyDispatcher for SlowDispatcher {
    fn press(&self, key: &str) -> Result<()> {
        std::thread::sleep(self.delay);
        self.inner.press(key)
    }

    fn release(&self, key: &str) -> Result<()> {
        std::thread::sleep(self.delay);
        self.inner.release(key)
    }
}
