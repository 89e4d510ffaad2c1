//! Completion notifications.

use std::sync::{Arc, Mutex};

pub trait NotificationPort: Send {
    /// Called when a session completes and a completion sound is configured.
    fn play_completion_sound(&self, sound: &str);
}

/// Writes the notification to the log. Used when no audio backend exists.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl NotificationPort for LogNotifier {
    fn play_completion_sound(&self, sound: &str) {
        tracing::info!(sound, "session complete");
    }
}

/// Remembers every sound it was asked to play. Clones share the record.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    played: Arc<Mutex<Vec<String>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn played(&self) -> Vec<String> {
        self.played.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl NotificationPort for RecordingNotifier {
    fn play_completion_sound(&self, sound: &str) {
        self.played
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(sound.to_string());
    }
}
