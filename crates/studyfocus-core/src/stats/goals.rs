use serde::{Deserialize, Serialize};

use super::Stats;

/// User goals. Read-only input to [`compute_progress`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Goals {
    #[serde(default = "default_daily_sessions")]
    pub daily_sessions: u32,
    #[serde(default = "default_weekly_sessions")]
    pub weekly_sessions: u32,
    #[serde(default = "default_daily_focus_time_min")]
    pub daily_focus_time_min: u32,
}

fn default_daily_sessions() -> u32 {
    4
}
fn default_weekly_sessions() -> u32 {
    20
}
fn default_daily_focus_time_min() -> u32 {
    120
}

impl Default for Goals {
    fn default() -> Self {
        Self {
            daily_sessions: default_daily_sessions(),
            weekly_sessions: default_weekly_sessions(),
            daily_focus_time_min: default_daily_focus_time_min(),
        }
    }
}

/// Percentages in `0.0 ..= 100.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GoalProgress {
    pub daily_time_pct: f64,
    pub daily_sessions_pct: f64,
    pub weekly_sessions_pct: f64,
}

/// Derived view; holds no state.
pub fn compute_progress(stats: &Stats, goals: &Goals) -> GoalProgress {
    GoalProgress {
        daily_time_pct: pct(
            stats.today_focus_secs as f64,
            f64::from(goals.daily_focus_time_min) * 60.0,
        ),
        daily_sessions_pct: pct(stats.today_sessions as f64, f64::from(goals.daily_sessions)),
        weekly_sessions_pct: pct(stats.week_sessions as f64, f64::from(goals.weekly_sessions)),
    }
}

fn pct(value: f64, goal: f64) -> f64 {
    if goal <= 0.0 {
        // A zero goal is met by any progress at all.
        return if value > 0.0 { 100.0 } else { 0.0 };
    }
    (value / goal * 100.0).min(100.0)
}
