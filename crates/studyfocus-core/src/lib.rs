//! # StudyFocus Core Library
//!
//! Business logic for the StudyFocus focus timer. Every operation is
//! available through the `studyfocus` CLI; other front ends are thin layers
//! over the same library.
//!
//! ## Architecture
//!
//! - **Timer**: a discrete countdown state machine advanced one tick per
//!   second, plus a tokio ticker that keeps it in step with the wall clock
//! - **Session**: the single coordinator that owns the timer, tasks,
//!   statistics and blocked sites and saves a snapshot after every change
//! - **Storage**: SQLite snapshot and session log, TOML configuration
//!
//! ## Key Components
//!
//! - [`FocusSession`]: the coordinator front ends talk to
//! - [`TimerEngine`]: work / break / long-break countdown
//! - [`TaskRegistry`]: tasks and the current-task pointer
//! - [`StatsAggregator`]: focus totals, streaks and calendar buckets
//! - [`SqliteGateway`]: snapshot persistence
//! - [`Config`]: user configuration

pub mod error;
pub mod events;
pub mod notify;
pub mod session;
pub mod sites;
pub mod stats;
pub mod storage;
pub mod task;
pub mod timer;

pub use error::{ConfigError, CoreError, PersistenceError, ValidationError};
pub use events::Event;
pub use notify::{LogNotifier, NotificationPort, RecordingNotifier};
pub use session::{FocusSession, FocusSessionBuilder};
pub use sites::BlockedSites;
pub use stats::{compute_progress, GoalProgress, Goals, Stats, StatsAggregator};
pub use storage::{
    BackgroundGateway, Config, MemoryGateway, PersistenceGateway, Snapshot, SqliteGateway,
};
pub use task::{ImportedTask, Priority, Task, TaskFilter, TaskOrigin, TaskPatch, TaskRegistry};
pub use timer::{
    Clock, FakeClock, Mode, Settings, SettingsPatch, SystemClock, Tick, Ticker, TickerHandle,
    TimerEngine,
};
