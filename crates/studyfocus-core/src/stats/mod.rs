//! Focus statistics.
//!
//! Totals only grow. The "today", weekly and monthly views are reset when
//! the calendar day, week (Sunday start) or month changes; the rollover runs
//! lazily at the start of every stats-mutating event.

mod goals;

pub use goals::{compute_progress, GoalProgress, Goals};

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, Offset, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Stats {
    /// Seconds of completed Work sessions, all time.
    pub total_focus_secs: u64,
    pub today_focus_secs: u64,
    pub completed_tasks: u64,
    pub total_sessions: u64,
    pub today_sessions: u64,
    /// Work sessions completed in the current week.
    pub week_sessions: u64,
    pub streak_days: u32,
    /// Focus seconds per weekday of the current week, Sunday first.
    pub weekly_buckets: [u64; 7],
    /// Focus seconds per (week of month, weekday) of the current month.
    /// Days 22 onward share the last row.
    pub monthly_buckets: [[u64; 7]; 4],
    /// Last day with a completed Work session.
    pub last_active_date: Option<NaiveDate>,
    /// Day the "today" counters belong to.
    pub today: Option<NaiveDate>,
    pub week_start: Option<NaiveDate>,
    pub month_start: Option<NaiveDate>,
}

/// Owns [`Stats`] and the only code paths that mutate it.
#[derive(Debug, Clone)]
pub struct StatsAggregator {
    stats: Stats,
    offset: FixedOffset,
}

impl StatsAggregator {
    /// `offset` decides where calendar days begin.
    pub fn new(stats: Stats, offset: FixedOffset) -> Self {
        Self { stats, offset }
    }

    pub fn utc(stats: Stats) -> Self {
        Self::new(stats, Utc.fix())
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn into_stats(self) -> Stats {
        self.stats
    }

    pub fn local_date(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.offset).date_naive()
    }

    /// Credit a completed Work session.
    pub fn update_on_session_complete(&mut self, elapsed_secs: u64, now: DateTime<Utc>) {
        self.roll_over(now);
        let date = self.local_date(now);
        let stats = &mut self.stats;

        stats.total_focus_secs = stats.total_focus_secs.saturating_add(elapsed_secs);
        stats.today_focus_secs = stats.today_focus_secs.saturating_add(elapsed_secs);
        stats.total_sessions += 1;
        stats.today_sessions += 1;
        stats.week_sessions += 1;

        let weekday = date.weekday().num_days_from_sunday() as usize;
        stats.weekly_buckets[weekday] = stats.weekly_buckets[weekday].saturating_add(elapsed_secs);
        let week_of_month = ((date.day0() / 7) as usize).min(3);
        let cell = &mut stats.monthly_buckets[week_of_month][weekday];
        *cell = cell.saturating_add(elapsed_secs);

        self.record_activity(date);
        tracing::debug!(
            elapsed_secs,
            total_sessions = self.stats.total_sessions,
            streak = self.stats.streak_days,
            "stats updated"
        );
    }

    pub fn record_task_completed(&mut self, now: DateTime<Utc>) {
        self.roll_over(now);
        self.stats.completed_tasks += 1;
    }

    /// Reset the period views whose period has ended. Returns whether
    /// anything was reset.
    ///
    /// A streak whose last active day is more than one day back is broken
    /// and drops to zero here; the next completion starts it again at one.
    pub fn roll_over(&mut self, now: DateTime<Utc>) -> bool {
        let date = self.local_date(now);
        let stats = &mut self.stats;
        let mut changed = false;

        if stats.today != Some(date) {
            if stats.today.map_or(false, |prev| prev > date) {
                // Clock moved backwards; keep counting into the newer day.
                return false;
            }
            stats.today = Some(date);
            stats.today_focus_secs = 0;
            stats.today_sessions = 0;
            changed = true;
        }

        let week_start = date - Duration::days(i64::from(date.weekday().num_days_from_sunday()));
        if stats.week_start != Some(week_start) {
            stats.week_start = Some(week_start);
            stats.weekly_buckets = [0; 7];
            stats.week_sessions = 0;
            changed = true;
        }

        let month_start = date.with_day(1).unwrap_or(date);
        if stats.month_start != Some(month_start) {
            stats.month_start = Some(month_start);
            stats.monthly_buckets = [[0; 7]; 4];
            changed = true;
        }

        if let Some(last) = stats.last_active_date {
            if (date - last).num_days() > 1 && stats.streak_days != 0 {
                stats.streak_days = 0;
                changed = true;
            }
        }

        if changed {
            tracing::debug!(%date, "stats rolled over");
        }
        changed
    }

    fn record_activity(&mut self, date: NaiveDate) {
        let stats = &mut self.stats;
        stats.streak_days = match stats.last_active_date {
            None => 1,
            Some(last) => match (date - last).num_days() {
                0 => stats.streak_days.max(1),
                1 => stats.streak_days + 1,
                gap if gap > 1 => 1,
                _ => stats.streak_days,
            },
        };
        if stats.last_active_date.map_or(true, |last| date > last) {
            stats.last_active_date = Some(date);
        }
    }
}
