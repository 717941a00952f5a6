//! Test data builders for creating event logs

use keymacro_rs::{EventLog, KeyAction, KeyEvent};

/// Builder for creating test EventLogs
#[derive(Debug, Default)]
pub struct EventLogBuilder {
    events: Vec<KeyEvent>,
}

impl EventLogBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn press(mut self, key: &str, at: f64) -> Self {
        self.events.push(KeyEvent::new(KeyAction::Press, key, at));
        self
    }

    pub fn release(mut self, key: &str, at: f64) -> Self {
        self.events.push(KeyEvent::new(KeyAction::Release, key, at));
        self
    }

    /// Press at `at`, release `hold` seconds later
    pub fn tap(self, key: &str, at: f64, hold: f64) -> Self {
        self.press(key, at).release(key, at + hold)
    }

    /// Type `text` one character per `spacing` seconds starting at `at`
    pub fn typed(mut self, text: &str, at: f64, spacing: f64) -> Self {
        for (i, c) in text.chars().enumerate() {
            let start = at + spacing * i as f64;
            self = self.tap(&c.to_string(), start, spacing / 2.0);
        }
        self
    }

    pub fn build(self) -> EventLog {
        EventLog::from_events(self.events).expect("builder produced an invalid log")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_log_builder() {
        let log = EventLogBuilder::new().tap("a", 0.0, 0.05).press("b", 0.1).build();

        assert_eq!(log.len(), 3);
        assert_eq!(log.events()[1].kind, KeyAction::Release);
        assert_eq!(log.events()[2].key, "b");
    }
}
