//! Versioned whole-state snapshot.
//!
//! Every snapshot carries a `version`. Older layouts are upgraded on load;
//! a snapshot written by a newer build is refused instead of being
//! half-read.
//!
//! | version | layout |
//! |---------|--------|
//! | 1 | flat: countdown fields, settings, tasks, stats at the top level |
//! | 2 | countdown grouped under `session`; blocked sites added |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PersistenceError;
use crate::stats::Stats;
use crate::task::Task;
use crate::timer::{Mode, SessionState, Settings};

pub const SNAPSHOT_VERSION: u32 = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    pub session: SessionState,
    pub settings: Settings,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub current_task_id: Option<String>,
    #[serde(default)]
    pub stats: Stats,
    #[serde(default)]
    pub blocked_sites: Vec<String>,
}

/// Version 1 layout.
#[derive(Debug, Deserialize)]
struct SnapshotV1 {
    #[serde(default)]
    saved_at: Option<DateTime<Utc>>,
    mode: Mode,
    remaining_secs: u64,
    #[serde(default)]
    elapsed_secs: u64,
    #[serde(default)]
    is_running: bool,
    #[serde(default)]
    completed_sessions: u32,
    #[serde(default)]
    settings: Settings,
    #[serde(default)]
    tasks: Vec<Task>,
    #[serde(default)]
    current_task_id: Option<String>,
    #[serde(default)]
    stats: Stats,
}

impl From<SnapshotV1> for Snapshot {
    fn from(v1: SnapshotV1) -> Self {
        if v1.is_running {
            tracing::debug!("version 1 snapshot was running; restoring it paused");
        }
        Snapshot {
            version: SNAPSHOT_VERSION,
            saved_at: v1.saved_at.unwrap_or_else(Utc::now),
            session: SessionState {
                mode: v1.mode,
                remaining_secs: v1.remaining_secs,
                elapsed_secs: v1.elapsed_secs,
                // v1 never recorded when the last tick happened, so the
                // countdown cannot be caught up; restore it paused.
                is_running: false,
                completed_sessions: v1.completed_sessions,
                session_length_secs: 0,
                last_tick_at: None,
            },
            settings: v1.settings,
            tasks: v1.tasks,
            current_task_id: v1.current_task_id,
            stats: v1.stats,
            blocked_sites: Vec::new(),
        }
    }
}

impl Snapshot {
    pub fn to_json(&self) -> Result<String, PersistenceError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode any supported version, upgrading to the current layout.
    pub fn from_json(json: &str) -> Result<Self, PersistenceError> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        let version = value
            .get("version")
            .and_then(serde_json::Value::as_u64)
            .map_or(1, |v| v.min(u64::from(u32::MAX)) as u32);

        match version {
            v if v > SNAPSHOT_VERSION => Err(PersistenceError::UnsupportedVersion {
                found: v,
                supported: SNAPSHOT_VERSION,
            }),
            1 | 0 => {
                let v1: SnapshotV1 = serde_json::from_value(value)?;
                tracing::info!("upgrading snapshot from version 1");
                Ok(v1.into())
            }
            _ => Ok(serde_json::from_value(value)?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn upgrades_version_one() {
        let v1 = json!({
            "mode": "break",
            "remaining_secs": 120,
            "elapsed_secs": 180,
            "is_running": true,
            "completed_sessions": 3,
            "settings": { "work_duration": 30 },
            "tasks": [],
            "stats": Stats { total_sessions: 3, ..Default::default() },
        });
        let snap = Snapshot::from_json(&v1.to_string()).unwrap();
        assert_eq!(snap.version, SNAPSHOT_VERSION);
        assert_eq!(snap.session.mode, Mode::Break);
        assert_eq!(snap.session.remaining_secs, 120);
        assert!(!snap.session.is_running);
        assert_eq!(snap.session.completed_sessions, 3);
        assert_eq!(snap.settings.work_duration, 30);
        assert_eq!(snap.settings.break_duration, 5);
        assert_eq!(snap.stats.total_sessions, 3);
        assert!(snap.blocked_sites.is_empty());
    }

    #[test]
    fn refuses_newer_version() {
        let err = Snapshot::from_json(r#"{"version": 99}"#).unwrap_err();
        assert!(matches!(
            err,
            PersistenceError::UnsupportedVersion { found: 99, .. }
        ));
    }

    #[test]
    fn current_version_survives_encoding() {
        let snap = Snapshot {
            version: SNAPSHOT_VERSION,
            saved_at: Utc::now(),
            session: crate::timer::TimerEngine::default().state(),
            settings: Settings::default(),
            tasks: Vec::new(),
            current_task_id: None,
            stats: Stats::default(),
            blocked_sites: vec!["youtube.com".into()],
        };
        let decoded = Snapshot::from_json(&snap.to_json().unwrap()).unwrap();
        assert_eq!(decoded, snap);
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(Snapshot::from_json("not json").is_err());
    }
}
