//! Timer engine implementation.
//!
//! The timer engine is a discrete state machine over
//! `{Work, Break, LongBreak} x {Running, Idle}`. It does not own a thread or
//! a timer: a scheduler calls `tick()` once per elapsed second, and the
//! coordinator calls `complete_session()` when a tick reports that the
//! countdown reached zero.
//!
//! ## Transitions
//!
//! ```text
//! Work --complete--> Break | LongBreak   (cadence: every Nth work session)
//! Break | LongBreak --complete--> Work
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let mut engine = TimerEngine::new(Settings::default());
//! engine.start(now);
//! if engine.tick() == Tick::Finished {
//!     let completion = engine.complete_session();
//! }
//! ```

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::settings::{Mode, Settings, SettingsPatch, MAX_DURATION_MIN};
use crate::events::Event;

/// Persisted view of the engine's countdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    pub mode: Mode,
    pub remaining_secs: u64,
    pub elapsed_secs: u64,
    pub is_running: bool,
    pub completed_sessions: u32,
    /// Length the current countdown started with. Settings changed while
    /// running do not alter it.
    #[serde(default)]
    pub session_length_secs: u64,
    /// Wall-clock instant the last tick was accounted for.
    #[serde(default)]
    pub last_tick_at: Option<DateTime<Utc>>,
}

/// Result of delivering one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Engine was idle (or already at zero); nothing changed.
    Dropped,
    /// One second was counted down.
    Advanced,
    /// One second was counted down and the countdown is now at zero.
    Finished,
}

impl Tick {
    /// Whether the tick consumed a second (and should be credited to a task).
    pub fn counted(self) -> bool {
        !matches!(self, Tick::Dropped)
    }
}

/// Outcome of a natural session completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub finished: Mode,
    pub next: Mode,
    /// Seconds counted in the finished session.
    pub elapsed_secs: u64,
    pub completed_sessions: u32,
}

/// Next mode and session count after leaving `mode`.
///
/// Both natural completion and skip go through here. `credit` decides whether
/// leaving a Work session counts toward the long-break cadence.
pub fn next_mode(mode: Mode, completed: u32, settings: &Settings, credit: bool) -> (Mode, u32) {
    match mode {
        Mode::Work if credit => {
            let count = completed.saturating_add(1);
            let cadence = settings.sessions_before_long_break.max(1);
            if count % cadence == 0 {
                (Mode::LongBreak, count)
            } else {
                (Mode::Break, count)
            }
        }
        Mode::Work => (Mode::Break, completed),
        Mode::Break | Mode::LongBreak => (Mode::Work, completed),
    }
}

/// Core timer engine.
#[derive(Debug, Clone)]
pub struct TimerEngine {
    settings: Settings,
    mode: Mode,
    remaining_secs: u64,
    elapsed_secs: u64,
    session_length_secs: u64,
    is_running: bool,
    completed_sessions: u32,
    last_tick_at: Option<DateTime<Utc>>,
}

impl Default for TimerEngine {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

impl TimerEngine {
    /// Create a new engine, idle at the start of a Work session.
    pub fn new(settings: Settings) -> Self {
        let settings = settings.clamped();
        let length = settings.duration_secs(Mode::Work);
        Self {
            settings,
            mode: Mode::Work,
            remaining_secs: length,
            elapsed_secs: 0,
            session_length_secs: length,
            is_running: false,
            completed_sessions: 0,
            last_tick_at: None,
        }
    }

    /// Rebuild an engine from a persisted state.
    ///
    /// The session length is capped at the longest duration any settings
    /// allow, and the remaining time is clamped into that length, so a
    /// corrupted or hand-edited snapshot cannot break the countdown invariants.
    /// A length above the configured duration survives, since settings may
    /// have been shortened while the countdown ran.
    pub fn restore(state: SessionState, settings: Settings) -> Self {
        let settings = settings.clamped();
        let configured = settings.duration_secs(state.mode);
        let longest = u64::from(MAX_DURATION_MIN) * 60;
        let length = match state.session_length_secs {
            0 => configured,
            n if n > longest => {
                tracing::warn!(stored = n, "session length out of range, using configured duration");
                configured
            }
            n => n,
        };
        let remaining = state.remaining_secs.min(length);
        let is_running = state.is_running && remaining > 0;
        Self {
            settings,
            mode: state.mode,
            remaining_secs: remaining,
            elapsed_secs: state.elapsed_secs.min(length - remaining),
            session_length_secs: length,
            is_running,
            completed_sessions: state.completed_sessions,
            last_tick_at: if is_running { state.last_tick_at } else { None },
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn remaining_secs(&self) -> u64 {
        self.remaining_secs
    }

    pub fn elapsed_secs(&self) -> u64 {
        self.elapsed_secs
    }

    pub fn session_length_secs(&self) -> u64 {
        self.session_length_secs
    }

    pub fn is_running(&self) -> bool {
        self.is_running
    }

    pub fn completed_sessions(&self) -> u32 {
        self.completed_sessions
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn last_tick_at(&self) -> Option<DateTime<Utc>> {
        self.last_tick_at
    }

    /// Configured duration of `mode` under the current settings, in seconds.
    pub fn duration_for(&self, mode: Mode) -> u64 {
        self.settings.duration_secs(mode)
    }

    /// 0.0 .. 1.0 progress within the current session.
    pub fn progress(&self) -> f64 {
        if self.session_length_secs == 0 {
            return 0.0;
        }
        1.0 - (self.remaining_secs as f64 / self.session_length_secs as f64)
    }

    pub fn state(&self) -> SessionState {
        SessionState {
            mode: self.mode,
            remaining_secs: self.remaining_secs,
            elapsed_secs: self.elapsed_secs,
            is_running: self.is_running,
            completed_sessions: self.completed_sessions,
            session_length_secs: self.session_length_secs,
            last_tick_at: self.last_tick_at,
        }
    }

    /// Whole ticks owed between the last accounted tick and `now`.
    ///
    /// Zero while idle. Never more than the remaining countdown.
    pub fn owed_ticks(&self, now: DateTime<Utc>) -> u64 {
        if !self.is_running {
            return 0;
        }
        let Some(last) = self.last_tick_at else {
            return 0;
        };
        let delta = (now - last).num_seconds().max(0) as u64;
        delta.min(self.remaining_secs)
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Move the tick anchor to `now` if the wall clock went backwards past
    /// it, so counting resumes from the new time instead of stalling until
    /// the clock catches up again.
    ///
    /// Returns the size of the backward jump in seconds.
    pub fn reanchor(&mut self, now: DateTime<Utc>) -> u64 {
        match self.last_tick_at {
            Some(last) if self.is_running && now < last => {
                let jump = (last - now).num_seconds().max(0) as u64;
                tracing::warn!(jump_secs = jump, "wall clock moved backwards, re-anchoring timer");
                self.last_tick_at = Some(now);
                jump
            }
            _ => 0,
        }
    }

    pub fn start(&mut self, now: DateTime<Utc>) -> Option<Event> {
        if self.is_running || self.remaining_secs == 0 {
            return None;
        }
        self.is_running = true;
        self.last_tick_at = Some(now);
        tracing::debug!(mode = ?self.mode, remaining = self.remaining_secs, "timer started");
        Some(Event::TimerStarted {
            mode: self.mode,
            remaining_secs: self.remaining_secs,
            at: now,
        })
    }

    pub fn pause(&mut self, now: DateTime<Utc>) -> Option<Event> {
        let was_running = self.is_running;
        self.is_running = false;
        self.last_tick_at = None;
        if !was_running {
            return None;
        }
        tracing::debug!(remaining = self.remaining_secs, "timer paused");
        Some(Event::TimerPaused {
            remaining_secs: self.remaining_secs,
            at: now,
        })
    }

    pub fn reset(&mut self, now: DateTime<Utc>) -> Event {
        self.enter(self.mode);
        Event::TimerReset {
            mode: self.mode,
            remaining_secs: self.remaining_secs,
            at: now,
        }
    }

    /// Count down one second. Checks the running flag at delivery time, so a
    /// tick that was scheduled before a pause is dropped.
    pub fn tick(&mut self) -> Tick {
        if !self.is_running || self.remaining_secs == 0 {
            return Tick::Dropped;
        }
        self.remaining_secs -= 1;
        self.elapsed_secs += 1;
        if let Some(last) = self.last_tick_at {
            self.last_tick_at = Some(last + Duration::seconds(1));
        }
        if self.remaining_secs == 0 {
            Tick::Finished
        } else {
            Tick::Advanced
        }
    }

    /// Apply the natural transition out of the current mode.
    ///
    /// The returned `Completion` carries the elapsed time of the finished
    /// session; the caller credits statistics when `finished` is Work.
    pub fn complete_session(&mut self) -> Completion {
        let finished = self.mode;
        let elapsed = self.elapsed_secs;
        let (next, count) = next_mode(finished, self.completed_sessions, &self.settings, true);
        self.completed_sessions = count;
        self.enter(next);
        tracing::info!(?finished, ?next, elapsed, completed = count, "session completed");
        Completion {
            finished,
            next,
            elapsed_secs: elapsed,
            completed_sessions: count,
        }
    }

    /// Abandon the current session and move on without crediting stats.
    pub fn skip(&mut self, now: DateTime<Utc>) -> Event {
        let from = self.mode;
        let credit = from.is_work() && self.settings.skip_counts_toward_cadence;
        let (next, count) = next_mode(from, self.completed_sessions, &self.settings, credit);
        self.completed_sessions = count;
        self.enter(next);
        tracing::debug!(?from, ?next, credit, "session skipped");
        Event::TimerSkipped {
            from,
            to: next,
            credited: credit,
            at: now,
        }
    }

    /// Manual override. Leaves the session count alone.
    pub fn change_mode(&mut self, target: Mode, now: DateTime<Utc>) -> Event {
        let from = self.mode;
        self.enter(target);
        Event::ModeChanged {
            from,
            to: target,
            at: now,
        }
    }

    /// Merge `patch` into the settings.
    ///
    /// An idle session is restarted from the new duration; a running
    /// countdown keeps going with the length it started with.
    pub fn update_settings(&mut self, patch: &SettingsPatch, now: DateTime<Utc>) -> Event {
        self.settings = self.settings.merge(patch).clamped();
        if !self.is_running {
            self.enter(self.mode);
        }
        Event::SettingsUpdated {
            remaining_secs: self.remaining_secs,
            at: now,
        }
    }

    pub fn snapshot(&self, current_task_id: Option<String>, now: DateTime<Utc>) -> Event {
        Event::StateSnapshot {
            mode: self.mode,
            is_running: self.is_running,
            remaining_secs: self.remaining_secs,
            elapsed_secs: self.elapsed_secs,
            session_length_secs: self.session_length_secs,
            completed_sessions: self.completed_sessions,
            current_task_id,
            at: now,
        }
    }

    // ── Internal ─────────────────────────────────────────────────────

    /// Idle at the beginning of `mode`.
    fn enter(&mut self, mode: Mode) {
        let length = self.settings.duration_secs(mode);
        self.mode = mode;
        self.remaining_secs = length;
        self.session_length_secs = length;
        self.elapsed_secs = 0;
        self.is_running = false;
        self.last_tick_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
    }

    fn settings(work: u32, brk: u32, long: u32, cadence: u32) -> Settings {
        Settings {
            work_duration: work,
            break_duration: brk,
            long_break_duration: long,
            sessions_before_long_break: cadence,
            skip_counts_toward_cadence: false,
        }
    }

    fn run_to_zero(engine: &mut TimerEngine) -> Completion {
        engine.start(t0());
        while engine.tick() != Tick::Finished {}
        engine.complete_session()
    }

    #[test]
    fn starts_idle_in_work() {
        let engine = TimerEngine::default();
        assert_eq!(engine.mode(), Mode::Work);
        assert!(!engine.is_running());
        assert_eq!(engine.remaining_secs(), 25 * 60);
        assert_eq!(engine.elapsed_secs(), 0);
    }

    #[test]
    fn start_is_idempotent() {
        let mut engine = TimerEngine::default();
        assert!(engine.start(t0()).is_some());
        assert!(engine.start(t0()).is_none());
        assert!(engine.is_running());
    }

    #[test]
    fn start_refuses_empty_countdown() {
        let mut engine = TimerEngine::restore(
            SessionState {
                mode: Mode::Break,
                remaining_secs: 0,
                elapsed_secs: 300,
                is_running: false,
                completed_sessions: 1,
                session_length_secs: 300,
                last_tick_at: None,
            },
            Settings::default(),
        );
        assert!(engine.start(t0()).is_none());
        assert!(!engine.is_running());
    }

    #[test]
    fn pause_freezes_countdown() {
        let mut engine = TimerEngine::default();
        engine.start(t0());
        engine.tick();
        engine.tick();
        engine.pause(t0());
        assert!(engine.pause(t0()).is_none());
        for _ in 0..50 {
            assert_eq!(engine.tick(), Tick::Dropped);
        }
        assert_eq!(engine.remaining_secs(), 25 * 60 - 2);
        assert_eq!(engine.elapsed_secs(), 2);
    }

    #[test]
    fn reset_from_running_break() {
        let mut engine = TimerEngine::new(settings(25, 5, 30, 4));
        engine.change_mode(Mode::Break, t0());
        engine.start(t0());
        engine.tick();
        engine.reset(t0());
        assert_eq!(engine.mode(), Mode::Break);
        assert_eq!(engine.remaining_secs(), 5 * 60);
        assert_eq!(engine.elapsed_secs(), 0);
        assert!(!engine.is_running());
    }

    #[test]
    fn work_completion_follows_cadence() {
        let mut engine = TimerEngine::new(settings(1, 1, 2, 3));
        let c = run_to_zero(&mut engine);
        assert_eq!((c.finished, c.next, c.completed_sessions), (Mode::Work, Mode::Break, 1));
        assert_eq!(c.elapsed_secs, 60);
        assert_eq!(engine.elapsed_secs(), 0);
        assert!(!engine.is_running());

        let c = run_to_zero(&mut engine);
        assert_eq!((c.finished, c.next, c.completed_sessions), (Mode::Break, Mode::Work, 1));

        run_to_zero(&mut engine);
        run_to_zero(&mut engine);
        let c = run_to_zero(&mut engine);
        assert_eq!((c.finished, c.next, c.completed_sessions), (Mode::Work, Mode::LongBreak, 3));
        assert_eq!(engine.remaining_secs(), 120);

        let c = run_to_zero(&mut engine);
        assert_eq!((c.finished, c.next), (Mode::LongBreak, Mode::Work));
    }

    #[test]
    fn change_mode_keeps_session_count() {
        let mut engine = TimerEngine::new(settings(1, 1, 1, 2));
        run_to_zero(&mut engine);
        engine.change_mode(Mode::LongBreak, t0());
        assert_eq!(engine.completed_sessions(), 1);
        assert_eq!(engine.mode(), Mode::LongBreak);
        assert_eq!(engine.remaining_secs(), 60);
    }

    #[test]
    fn skip_without_credit_toggles_work_and_break() {
        let mut engine = TimerEngine::new(settings(25, 5, 30, 1));
        engine.skip(t0());
        assert_eq!(engine.mode(), Mode::Break);
        assert_eq!(engine.completed_sessions(), 0);
        engine.skip(t0());
        assert_eq!(engine.mode(), Mode::Work);
    }

    #[test]
    fn skip_with_credit_follows_cadence() {
        let mut s = settings(25, 5, 30, 2);
        s.skip_counts_toward_cadence = true;
        let mut engine = TimerEngine::new(s);
        engine.skip(t0());
        assert_eq!(engine.mode(), Mode::Break);
        engine.skip(t0());
        engine.skip(t0());
        assert_eq!(engine.mode(), Mode::LongBreak);
        assert_eq!(engine.completed_sessions(), 2);
    }

    #[test]
    fn settings_update_while_idle_recomputes_remaining() {
        let mut engine = TimerEngine::default();
        engine.update_settings(
            &SettingsPatch {
                work_duration: Some(50),
                ..Default::default()
            },
            t0(),
        );
        assert_eq!(engine.remaining_secs(), 50 * 60);
    }

    #[test]
    fn settings_update_while_running_keeps_countdown() {
        let mut engine = TimerEngine::default();
        engine.start(t0());
        engine.tick();
        engine.update_settings(
            &SettingsPatch {
                work_duration: Some(10),
                ..Default::default()
            },
            t0(),
        );
        assert_eq!(engine.remaining_secs(), 25 * 60 - 1);
        assert_eq!(engine.session_length_secs(), 25 * 60);
        assert_eq!(engine.settings().work_duration, 10);
    }

    #[test]
    fn zero_work_duration_is_clamped() {
        let mut engine = TimerEngine::default();
        engine.update_settings(
            &SettingsPatch {
                work_duration: Some(0),
                ..Default::default()
            },
            t0(),
        );
        assert!(engine.remaining_secs() > 0);
        assert_eq!(engine.remaining_secs(), 60);
    }

    #[test]
    fn owed_ticks_from_wall_clock() {
        let mut engine = TimerEngine::new(settings(1, 1, 1, 4));
        assert_eq!(engine.owed_ticks(t0() + Duration::seconds(30)), 0);
        engine.start(t0());
        assert_eq!(engine.owed_ticks(t0() + Duration::milliseconds(2500)), 2);
        engine.tick();
        engine.tick();
        assert_eq!(engine.owed_ticks(t0() + Duration::milliseconds(2500)), 0);
        assert_eq!(engine.owed_ticks(t0() + Duration::hours(3)), 58);
    }

    #[test]
    fn reanchor_after_backward_clock_jump() {
        let mut engine = TimerEngine::default();
        engine.start(t0());
        assert_eq!(engine.reanchor(t0() + Duration::seconds(5)), 0);
        assert_eq!(engine.last_tick_at(), Some(t0()));

        let earlier = t0() - Duration::hours(1);
        assert_eq!(engine.reanchor(earlier), 3600);
        assert_eq!(engine.last_tick_at(), Some(earlier));
        assert_eq!(engine.owed_ticks(earlier + Duration::seconds(3)), 3);

        engine.pause(t0());
        assert_eq!(engine.reanchor(earlier - Duration::hours(1)), 0);
    }

    #[test]
    fn restore_clamps_remaining() {
        let engine = TimerEngine::restore(
            SessionState {
                mode: Mode::Work,
                remaining_secs: 99_999,
                elapsed_secs: 0,
                is_running: true,
                completed_sessions: 2,
                session_length_secs: 0,
                last_tick_at: Some(t0()),
            },
            Settings::default(),
        );
        assert_eq!(engine.remaining_secs(), 25 * 60);
        assert!(engine.is_running());
        assert_eq!(engine.completed_sessions(), 2);
    }

    #[test]
    fn restore_rejects_oversized_session_length() {
        let engine = TimerEngine::restore(
            SessionState {
                mode: Mode::Work,
                remaining_secs: 5_000_000,
                elapsed_secs: 0,
                is_running: false,
                completed_sessions: 0,
                session_length_secs: 5_000_000,
                last_tick_at: None,
            },
            Settings::default(),
        );
        assert_eq!(engine.session_length_secs(), 25 * 60);
        assert_eq!(engine.remaining_secs(), engine.duration_for(Mode::Work));
    }

    #[test]
    fn restore_keeps_length_from_before_settings_change() {
        let engine = TimerEngine::restore(
            SessionState {
                mode: Mode::Work,
                remaining_secs: 40 * 60,
                elapsed_secs: 10 * 60,
                is_running: false,
                completed_sessions: 0,
                session_length_secs: 50 * 60,
                last_tick_at: None,
            },
            Settings::default(),
        );
        assert_eq!(engine.session_length_secs(), 50 * 60);
        assert_eq!(engine.remaining_secs(), 40 * 60);
    }

    proptest! {
        #[test]
        fn ticks_count_down_and_saturate(minutes in 1u32..5, n in 0u64..700) {
            let mut engine = TimerEngine::new(settings(minutes, 1, 1, 4));
            let d = u64::from(minutes) * 60;
            engine.start(t0());
            for _ in 0..n {
                engine.tick();
            }
            prop_assert_eq!(engine.remaining_secs(), d.saturating_sub(n));
            prop_assert_eq!(engine.elapsed_secs(), d.min(n));
        }
    }
}
