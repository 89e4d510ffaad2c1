//! Focus session coordinator.
//!
//! [`FocusSession`] is the single writer for the timer, the task list, the
//! statistics and the blocked sites. Every command goes through it so that
//! ticks, completions and task credit happen in one order, and so that a
//! snapshot is saved after each change.
//!
//! Front ends that need a background ticker wrap the session in
//! `Arc<tokio::sync::Mutex<_>>` and hand it to [`Ticker`](crate::timer::Ticker).

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Local, Offset, Utc};

use crate::error::ValidationError;
use crate::events::Event;
use crate::notify::NotificationPort;
use crate::sites::BlockedSites;
use crate::stats::{compute_progress, GoalProgress, Goals, Stats, StatsAggregator};
use crate::storage::{MemoryGateway, PersistenceGateway, Snapshot, SNAPSHOT_VERSION};
use crate::task::{ImportedTask, Priority, Task, TaskPatch, TaskRegistry};
use crate::timer::{Clock, Completion, Mode, Settings, SettingsPatch, SystemClock, Tick, TimerEngine};

/// Configures and loads a [`FocusSession`].
pub struct FocusSessionBuilder {
    settings: Option<Settings>,
    goals: Goals,
    clock: Arc<dyn Clock>,
    gateway: Box<dyn PersistenceGateway>,
    notifier: Option<Box<dyn NotificationPort>>,
    completion_sound: Option<String>,
    day_offset: Option<FixedOffset>,
}

impl Default for FocusSessionBuilder {
    fn default() -> Self {
        Self {
            settings: None,
            goals: Goals::default(),
            clock: Arc::new(SystemClock),
            gateway: Box::new(MemoryGateway::new()),
            notifier: None,
            completion_sound: None,
            day_offset: None,
        }
    }
}

impl FocusSessionBuilder {
    /// Settings to apply on top of whatever the snapshot holds.
    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = Some(settings);
        self
    }

    pub fn goals(mut self, goals: Goals) -> Self {
        self.goals = goals;
        self
    }

    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn gateway(mut self, gateway: impl PersistenceGateway + 'static) -> Self {
        self.gateway = Box::new(gateway);
        self
    }

    pub fn notifier(mut self, notifier: impl NotificationPort + 'static) -> Self {
        self.notifier = Some(Box::new(notifier));
        self
    }

    /// Sound passed to the notifier on completion. `None` disables it.
    pub fn completion_sound(mut self, sound: Option<String>) -> Self {
        self.completion_sound = sound;
        self
    }

    /// Offset that decides where calendar days begin. Defaults to the
    /// machine's local offset.
    pub fn day_offset(mut self, offset: FixedOffset) -> Self {
        self.day_offset = Some(offset);
        self
    }

    /// Load the last snapshot and bring it up to date.
    ///
    /// A snapshot that cannot be loaded is reported as a
    /// [`Event::PersistenceFailed`] and the session starts from defaults.
    pub fn build(self) -> FocusSession {
        let now = self.clock.now();
        let offset = self
            .day_offset
            .unwrap_or_else(|| Local::now().offset().fix());
        let mut events = Vec::new();

        let snapshot = match self.gateway.load() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!("could not load snapshot, starting fresh: {e}");
                events.push(Event::PersistenceFailed {
                    message: e.to_string(),
                    at: now,
                });
                None
            }
        };

        let (engine, tasks, stats, sites) = match snapshot {
            Some(snap) => {
                tracing::debug!(saved_at = %snap.saved_at, "restoring snapshot");
                (
                    TimerEngine::restore(snap.session, snap.settings),
                    TaskRegistry::from_parts(snap.tasks, snap.current_task_id),
                    snap.stats,
                    BlockedSites::from_stored(&snap.blocked_sites),
                )
            }
            None => (
                TimerEngine::new(self.settings.clone().unwrap_or_default()),
                TaskRegistry::new(),
                Stats::default(),
                BlockedSites::new(),
            ),
        };

        let mut session = FocusSession {
            engine,
            tasks,
            stats: StatsAggregator::new(stats, offset),
            goals: self.goals,
            sites,
            clock: self.clock,
            gateway: self.gateway,
            notifier: self.notifier,
            completion_sound: self.completion_sound,
            events,
            persistence_ok: true,
            ticker_attached: false,
        };

        if let Some(settings) = self.settings {
            if session.engine.settings() != &settings.clamped() {
                session.update_settings(&SettingsPatch::from(&settings));
            }
        }
        session.stats.roll_over(now);
        session.catch_up();
        session
    }
}

/// Owns the whole focus state and serializes every change to it.
pub struct FocusSession {
    engine: TimerEngine,
    tasks: TaskRegistry,
    stats: StatsAggregator,
    goals: Goals,
    sites: BlockedSites,
    clock: Arc<dyn Clock>,
    gateway: Box<dyn PersistenceGateway>,
    notifier: Option<Box<dyn NotificationPort>>,
    completion_sound: Option<String>,
    events: Vec<Event>,
    persistence_ok: bool,
    pub(crate) ticker_attached: bool,
}

impl FocusSession {
    pub fn builder() -> FocusSessionBuilder {
        FocusSessionBuilder::default()
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn engine(&self) -> &TimerEngine {
        &self.engine
    }

    pub fn tasks(&self) -> &TaskRegistry {
        &self.tasks
    }

    pub fn stats(&self) -> &Stats {
        self.stats.stats()
    }

    pub fn goals(&self) -> &Goals {
        &self.goals
    }

    pub fn progress(&self) -> GoalProgress {
        compute_progress(self.stats.stats(), &self.goals)
    }

    pub fn blocked_sites(&self) -> &BlockedSites {
        &self.sites
    }

    /// Current timer state as an event.
    pub fn status(&self) -> Event {
        let current = self.tasks.current_task_id().map(str::to_string);
        self.engine.snapshot(current, self.now())
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            version: SNAPSHOT_VERSION,
            saved_at: self.now(),
            session: self.engine.state(),
            settings: self.engine.settings().clone(),
            tasks: self.tasks.tasks().to_vec(),
            current_task_id: self.tasks.current_task_id().map(str::to_string),
            stats: self.stats.stats().clone(),
            blocked_sites: self.sites.to_vec(),
        }
    }

    /// Events produced since the last call, oldest first.
    pub fn drain_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    // ── Timer ────────────────────────────────────────────────────────

    /// Returns whether the countdown was started.
    pub fn start(&mut self) -> bool {
        let Some(event) = self.engine.start(self.now()) else {
            return false;
        };
        self.events.push(event);
        self.persist();
        true
    }

    /// Returns whether a running countdown was paused.
    pub fn pause(&mut self) -> bool {
        let now = self.now();
        // Account for whole seconds that passed before the pause.
        self.catch_up();
        let Some(event) = self.engine.pause(now) else {
            return false;
        };
        self.events.push(event);
        self.persist();
        true
    }

    pub fn reset(&mut self) {
        let event = self.engine.reset(self.now());
        self.events.push(event);
        self.persist();
    }

    pub fn skip(&mut self) {
        let event = self.engine.skip(self.now());
        self.events.push(event);
        self.persist();
    }

    pub fn change_mode(&mut self, mode: Mode) {
        let event = self.engine.change_mode(mode, self.now());
        self.events.push(event);
        self.persist();
    }

    pub fn update_settings(&mut self, patch: &SettingsPatch) {
        let event = self.engine.update_settings(patch, self.now());
        self.events.push(event);
        self.persist();
    }

    /// Deliver one tick. A counted tick is credited to the current task; the
    /// tick that reaches zero also completes the session.
    pub fn tick(&mut self) -> Tick {
        let tick = self.deliver_tick();
        if tick.counted() {
            self.persist();
        }
        tick
    }

    /// Deliver every tick owed since the last accounted one, as measured by
    /// the clock. Stops at a completion; the next session is not started.
    /// A clock that moved backwards restarts the count from its new time.
    ///
    /// Returns the number of ticks delivered.
    pub fn catch_up(&mut self) -> u64 {
        let now = self.now();
        self.engine.reanchor(now);
        let owed = self.engine.owed_ticks(now);
        let mut delivered = 0;
        for _ in 0..owed {
            match self.deliver_tick() {
                Tick::Dropped => break,
                Tick::Advanced => delivered += 1,
                Tick::Finished => {
                    delivered += 1;
                    break;
                }
            }
        }
        if delivered > 1 {
            tracing::debug!(delivered, "caught up on missed ticks");
        }
        if delivered > 0 {
            self.persist();
        }
        delivered
    }

    /// End the current session now, as if its countdown had reached zero.
    pub fn complete_session(&mut self) -> Completion {
        let completion = self.finish();
        self.persist();
        completion
    }

    // ── Tasks ────────────────────────────────────────────────────────

    /// Returns the new task's id.
    pub fn add_task(
        &mut self,
        title: &str,
        description: &str,
        priority: Priority,
    ) -> Result<String, ValidationError> {
        let now = self.now();
        let id = self.tasks.add_task(title, description, priority, now)?.id.clone();
        self.events.push(Event::TaskAdded {
            task_id: id.clone(),
            at: now,
        });
        self.persist();
        Ok(id)
    }

    /// Returns the updated task, or `None` if there is no such task.
    pub fn edit_task(&mut self, id: &str, patch: &TaskPatch) -> Option<Task> {
        let task = self.tasks.edit_task(id, patch)?.clone();
        self.events.push(Event::TaskUpdated {
            task_id: task.id.clone(),
            at: self.now(),
        });
        self.persist();
        Some(task)
    }

    /// Mark a task completed. Returns whether it was newly completed.
    pub fn complete_task(&mut self, id: &str) -> Result<bool, ValidationError> {
        let now = self.now();
        let newly = self.tasks.complete_task(id, now)?;
        if newly {
            self.stats.record_task_completed(now);
            self.events.push(Event::TaskCompleted {
                task_id: id.to_string(),
                at: now,
            });
            self.persist();
        }
        Ok(newly)
    }

    /// Returns the removed task, or `None` if there was no such task.
    pub fn delete_task(&mut self, id: &str) -> Option<Task> {
        let task = self.tasks.delete_task(id)?;
        self.events.push(Event::TaskDeleted {
            task_id: task.id.clone(),
            at: self.now(),
        });
        self.persist();
        Some(task)
    }

    /// Select a task, or clear the selection. Selecting the current task
    /// again clears it. Returns the new current task id.
    pub fn set_current_task(&mut self, id: Option<&str>) -> Result<Option<String>, ValidationError> {
        let before = self.tasks.current_task_id().map(str::to_string);
        let current = self.tasks.set_current_task(id)?.map(str::to_string);
        if current != before {
            self.events.push(Event::CurrentTaskChanged {
                task_id: current.clone(),
                at: self.now(),
            });
            self.persist();
        }
        Ok(current)
    }

    /// Returns the number of tasks created.
    pub fn import_tasks(&mut self, source: &str, items: &[ImportedTask]) -> usize {
        let now = self.now();
        let imported = self.tasks.import_tasks(source, items, now);
        tracing::info!(source, imported, offered = items.len(), "tasks imported");
        self.events.push(Event::TasksImported {
            source: source.to_string(),
            imported,
            at: now,
        });
        if imported > 0 {
            self.persist();
        }
        imported
    }

    // ── Stats & sites ────────────────────────────────────────────────

    /// Reset period counters whose day, week or month has ended.
    pub fn refresh(&mut self) {
        if self.stats.roll_over(self.now()) {
            self.persist();
        }
    }

    /// Returns the normalized host and whether it was newly added.
    pub fn block_site(&mut self, input: &str) -> Result<(String, bool), ValidationError> {
        let (host, added) = self.sites.add(input)?;
        if added {
            self.persist();
        }
        Ok((host, added))
    }

    pub fn unblock_site(&mut self, input: &str) -> Result<bool, ValidationError> {
        let removed = self.sites.remove(input)?;
        if removed {
            self.persist();
        }
        Ok(removed)
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn deliver_tick(&mut self) -> Tick {
        let tick = self.engine.tick();
        if tick.counted() {
            self.tasks.credit_current(1);
        }
        if tick == Tick::Finished {
            self.finish();
        }
        tick
    }

    fn finish(&mut self) -> Completion {
        let now = self.now();
        let task_id = self.tasks.current_task_id().map(str::to_string);
        let completion = self.engine.complete_session();
        if completion.finished.is_work() {
            self.stats.update_on_session_complete(completion.elapsed_secs, now);
        }
        if let (Some(notifier), Some(sound)) = (&self.notifier, &self.completion_sound) {
            notifier.play_completion_sound(sound);
        }
        self.events.push(Event::SessionCompleted {
            mode: completion.finished,
            next_mode: completion.next,
            elapsed_secs: completion.elapsed_secs,
            completed_sessions: completion.completed_sessions,
            task_id,
            at: now,
        });
        completion
    }

    /// Save a snapshot. Failures are logged and reported once per outage;
    /// the in-memory state stays authoritative.
    fn persist(&mut self) {
        let result = self.gateway.save(&self.snapshot());
        let failure = result.err().or_else(|| self.gateway.take_deferred_error());
        match failure {
            Some(e) => {
                tracing::warn!("failed to save snapshot: {e}");
                if self.persistence_ok {
                    self.events.push(Event::PersistenceFailed {
                        message: e.to_string(),
                        at: self.now(),
                    });
                }
                self.persistence_ok = false;
            }
            None => {
                if !self.persistence_ok {
                    tracing::info!("snapshot saving recovered");
                }
                self.persistence_ok = true;
            }
        }
    }
}
