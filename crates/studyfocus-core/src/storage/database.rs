//! SQLite-based snapshot storage.
//!
//! Provides persistent storage for:
//! - The current whole-state snapshot (kv store)
//! - A log of completed sessions for history views

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

use super::data_dir;
use super::gateway::PersistenceGateway;
use super::snapshot::Snapshot;
use crate::error::PersistenceError;
use crate::timer::Mode;

const SNAPSHOT_KEY: &str = "focus_snapshot";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: i64,
    pub mode: Mode,
    pub elapsed_secs: u64,
    pub task_id: Option<String>,
    pub completed_at: DateTime<Utc>,
}

/// SQLite database holding the snapshot and the session log.
pub struct SqliteGateway {
    conn: Connection,
}

impl SqliteGateway {
    /// Open the database at `~/.config/studyfocus/studyfocus.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open_default() -> Result<Self, PersistenceError> {
        let dir = data_dir().map_err(|e| PersistenceError::Query(e.to_string()))?;
        Self::open(&dir.join("studyfocus.db"))
    }

    pub fn open(path: &Path) -> Result<Self, PersistenceError> {
        let conn = Connection::open(path).map_err(|source| PersistenceError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self, PersistenceError> {
        let conn = Connection::open_in_memory().map_err(|source| PersistenceError::Open {
            path: PathBuf::from(":memory:"),
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), rusqlite::Error> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS sessions (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                mode         TEXT NOT NULL,
                elapsed_secs INTEGER NOT NULL,
                task_id      TEXT,
                completed_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_sessions_completed_at ON sessions(completed_at);",
        )?;
        Ok(())
    }

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>, rusqlite::Error> {
        let mut stmt = self.conn.prepare("SELECT value FROM kv WHERE key = ?1")?;
        let result = stmt.query_row(params![key], |row| row.get::<_, String>(0));
        match result {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    /// Append a completed session to the history log.
    pub fn record_session(
        &self,
        mode: Mode,
        elapsed_secs: u64,
        task_id: Option<&str>,
        completed_at: DateTime<Utc>,
    ) -> Result<i64, PersistenceError> {
        let mode = serde_json::to_value(mode)?;
        self.conn.execute(
            "INSERT INTO sessions (mode, elapsed_secs, task_id, completed_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                mode.as_str().unwrap_or("work"),
                elapsed_secs,
                task_id,
                completed_at.to_rfc3339(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Most recent sessions first.
    pub fn recent_sessions(&self, limit: usize) -> Result<Vec<SessionRecord>, PersistenceError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, mode, elapsed_secs, task_id, completed_at
             FROM sessions
             ORDER BY completed_at DESC, id DESC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, u64>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (id, mode, elapsed_secs, task_id, completed_at) = row?;
            let mode: Mode = serde_json::from_value(serde_json::Value::String(mode))?;
            let completed_at = DateTime::parse_from_rfc3339(&completed_at)
                .map_err(|e| PersistenceError::Query(e.to_string()))?
                .with_timezone(&Utc);
            out.push(SessionRecord {
                id,
                mode,
                elapsed_secs,
                task_id,
                completed_at,
            });
        }
        Ok(out)
    }
}

impl PersistenceGateway for SqliteGateway {
    fn load(&self) -> Result<Option<Snapshot>, PersistenceError> {
        self.kv_get(SNAPSHOT_KEY)?
            .as_deref()
            .map(Snapshot::from_json)
            .transpose()
    }

    fn save(&self, snapshot: &Snapshot) -> Result<(), PersistenceError> {
        self.kv_set(SNAPSHOT_KEY, &snapshot.to_json()?)?;
        Ok(())
    }
}
