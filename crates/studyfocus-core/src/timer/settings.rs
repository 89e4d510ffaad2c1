use serde::{Deserialize, Serialize};

/// Shortest duration any mode may have after clamping, in minutes.
pub const MIN_DURATION_MIN: u32 = 1;
/// Longest duration any mode may have after clamping, in minutes.
pub const MAX_DURATION_MIN: u32 = 24 * 60;
/// Upper bound for the long-break cadence after clamping.
pub const MAX_SESSIONS_BEFORE_LONG_BREAK: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Work,
    Break,
    LongBreak,
}

impl Mode {
    pub fn is_work(self) -> bool {
        self == Mode::Work
    }

    pub fn label(self) -> &'static str {
        match self {
            Mode::Work => "Work",
            Mode::Break => "Break",
            Mode::LongBreak => "Long Break",
        }
    }
}

impl std::str::FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "work" | "focus" => Ok(Mode::Work),
            "break" | "shortbreak" => Ok(Mode::Break),
            "longbreak" => Ok(Mode::LongBreak),
            other => Err(format!("unknown mode: {other}")),
        }
    }
}

/// Timer durations and cadence.
///
/// Durations are in minutes. Values are clamped by [`Settings::clamped`]
/// before the engine uses them, so a zero duration never reaches the
/// countdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_work_duration")]
    pub work_duration: u32,
    #[serde(default = "default_break_duration")]
    pub break_duration: u32,
    #[serde(default = "default_long_break_duration")]
    pub long_break_duration: u32,
    #[serde(default = "default_sessions_before_long_break")]
    pub sessions_before_long_break: u32,
    /// When set, skipping a Work session advances the long-break cadence
    /// the same way a natural completion does.
    #[serde(default)]
    pub skip_counts_toward_cadence: bool,
}

fn default_work_duration() -> u32 {
    25
}
fn default_break_duration() -> u32 {
    5
}
fn default_long_break_duration() -> u32 {
    15
}
fn default_sessions_before_long_break() -> u32 {
    4
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            work_duration: default_work_duration(),
            break_duration: default_break_duration(),
            long_break_duration: default_long_break_duration(),
            sessions_before_long_break: default_sessions_before_long_break(),
            skip_counts_toward_cadence: false,
        }
    }
}

/// Partial update for [`Settings`]. `None` fields are left as they are.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsPatch {
    pub work_duration: Option<u32>,
    pub break_duration: Option<u32>,
    pub long_break_duration: Option<u32>,
    pub sessions_before_long_break: Option<u32>,
    pub skip_counts_toward_cadence: Option<bool>,
}

impl From<&Settings> for SettingsPatch {
    /// Patch that replaces every field.
    fn from(s: &Settings) -> Self {
        Self {
            work_duration: Some(s.work_duration),
            break_duration: Some(s.break_duration),
            long_break_duration: Some(s.long_break_duration),
            sessions_before_long_break: Some(s.sessions_before_long_break),
            skip_counts_toward_cadence: Some(s.skip_counts_toward_cadence),
        }
    }
}

impl Settings {
    /// Configured duration for `mode`, in minutes.
    pub fn duration_min(&self, mode: Mode) -> u32 {
        match mode {
            Mode::Work => self.work_duration,
            Mode::Break => self.break_duration,
            Mode::LongBreak => self.long_break_duration,
        }
    }

    /// Configured duration for `mode`, in seconds.
    pub fn duration_secs(&self, mode: Mode) -> u64 {
        u64::from(self.duration_min(mode)).saturating_mul(60)
    }

    pub fn merge(&self, patch: &SettingsPatch) -> Self {
        Self {
            work_duration: patch.work_duration.unwrap_or(self.work_duration),
            break_duration: patch.break_duration.unwrap_or(self.break_duration),
            long_break_duration: patch.long_break_duration.unwrap_or(self.long_break_duration),
            sessions_before_long_break: patch
                .sessions_before_long_break
                .unwrap_or(self.sessions_before_long_break),
            skip_counts_toward_cadence: patch
                .skip_counts_toward_cadence
                .unwrap_or(self.skip_counts_toward_cadence),
        }
    }

    /// Copy with every value forced into its safe range.
    ///
    /// Emits a warning for each value that had to be changed.
    pub fn clamped(&self) -> Self {
        Self {
            work_duration: clamp_field("work_duration", self.work_duration, MIN_DURATION_MIN, MAX_DURATION_MIN),
            break_duration: clamp_field("break_duration", self.break_duration, MIN_DURATION_MIN, MAX_DURATION_MIN),
            long_break_duration: clamp_field(
                "long_break_duration",
                self.long_break_duration,
                MIN_DURATION_MIN,
                MAX_DURATION_MIN,
            ),
            sessions_before_long_break: clamp_field(
                "sessions_before_long_break",
                self.sessions_before_long_break,
                1,
                MAX_SESSIONS_BEFORE_LONG_BREAK,
            ),
            skip_counts_toward_cadence: self.skip_counts_toward_cadence,
        }
    }
}

fn clamp_field(name: &str, value: u32, min: u32, max: u32) -> u32 {
    let clamped = value.clamp(min, max);
    if clamped != value {
        tracing::warn!(field = name, value, clamped, "timer setting out of range, clamping");
    }
    clamped
}
