use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::timer::Mode;

/// Every state change in the system produces an Event.
/// Front ends render them; the CLI prints them as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    TimerStarted {
        mode: Mode,
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    TimerPaused {
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    TimerReset {
        mode: Mode,
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    ModeChanged {
        from: Mode,
        to: Mode,
        at: DateTime<Utc>,
    },
    TimerSkipped {
        from: Mode,
        to: Mode,
        /// Whether the skip advanced the long-break cadence.
        credited: bool,
        at: DateTime<Utc>,
    },
    SessionCompleted {
        mode: Mode,
        next_mode: Mode,
        elapsed_secs: u64,
        completed_sessions: u32,
        /// Task that was current when the session ended.
        task_id: Option<String>,
        at: DateTime<Utc>,
    },
    SettingsUpdated {
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    TaskAdded {
        task_id: String,
        at: DateTime<Utc>,
    },
    TaskUpdated {
        task_id: String,
        at: DateTime<Utc>,
    },
    TaskCompleted {
        task_id: String,
        at: DateTime<Utc>,
    },
    TaskDeleted {
        task_id: String,
        at: DateTime<Utc>,
    },
    TasksImported {
        source: String,
        imported: usize,
        at: DateTime<Utc>,
    },
    CurrentTaskChanged {
        task_id: Option<String>,
        at: DateTime<Utc>,
    },
    /// Snapshot could not be loaded or saved. The engine keeps running
    /// in memory.
    PersistenceFailed {
        message: String,
        at: DateTime<Utc>,
    },
    StateSnapshot {
        mode: Mode,
        is_running: bool,
        remaining_secs: u64,
        elapsed_secs: u64,
        session_length_secs: u64,
        completed_sessions: u32,
        current_task_id: Option<String>,
        at: DateTime<Utc>,
    },
}
