//! TOML-based application configuration.
//!
//! This is the configuration surface for the timer: durations, cadence,
//! goals and the completion sound. Editable ranges are validated here; the
//! engine still clamps anything pathological that slips through.
//!
//! Configuration is stored at `~/.config/studyfocus/config.toml`.

use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::error::ConfigError;
use crate::stats::Goals;
use crate::timer::Settings;

/// Ranges enforced by [`Config::validate`], keyed by dot path.
pub const EDITABLE_RANGES: &[(&str, RangeInclusive<u32>)] = &[
    ("timer.work_duration", 5..=60),
    ("timer.break_duration", 1..=20),
    ("timer.long_break_duration", 10..=60),
    ("timer.sessions_before_long_break", 2..=8),
    ("goals.daily_sessions", 1..=12),
    ("goals.weekly_sessions", 5..=50),
    ("goals.daily_focus_time_min", 15..=480),
];

/// Notification configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Sound reference handed to the notification port when a session
    /// completes. No sound is played when unset.
    #[serde(default)]
    pub completion_sound: Option<String>,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/studyfocus/config.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Minutes east of UTC where calendar days begin. Uses the system
    /// offset when unset.
    #[serde(default)]
    pub utc_offset_min: Option<i32>,
    #[serde(default)]
    pub timer: Settings,
    #[serde(default)]
    pub goals: Goals,
    #[serde(default)]
    pub notifications: NotificationsConfig,
}

fn default_true() -> bool {
    true
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            completion_sound: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            utc_offset_min: None,
            timer: Settings::default(),
            goals: Goals::default(),
            notifications: NotificationsConfig::default(),
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if parts.peek().map_or(true, |p| p.is_empty()) {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            let is_leaf = parts.peek().is_none();
            if is_leaf {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value
                            .parse::<bool>()
                            .map_err(|_| invalid(format!("cannot parse '{value}' as bool")))?,
                    ),
                    serde_json::Value::Number(_) => {
                        if let Ok(n) = value.parse::<u64>() {
                            serde_json::Value::Number(n.into())
                        } else if let Ok(n) = value.parse::<i64>() {
                            serde_json::Value::Number(n.into())
                        } else {
                            return Err(invalid(format!("cannot parse '{value}' as number")));
                        }
                    }
                    // Optional fields serialize as null; accept numbers or strings.
                    serde_json::Value::Null => {
                        if value.is_empty() || value == "none" {
                            serde_json::Value::Null
                        } else if let Ok(n) = value.parse::<i64>() {
                            serde_json::Value::Number(n.into())
                        } else {
                            serde_json::Value::String(value.into())
                        }
                    }
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                    }
                    serde_json::Value::String(_) => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    fn path() -> Result<PathBuf, ConfigError> {
        data_dir()
            .map(|dir| dir.join("config.toml"))
            .map_err(|e| ConfigError::LoadFailed {
                path: PathBuf::from("config.toml"),
                message: e.to_string(),
            })
    }

    /// Load from disk or return default.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    /// Persist to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a value by dot-separated key without saving.
    ///
    /// The change is rejected (and `self` left untouched) if the key is
    /// unknown, the value does not parse, or the result fails validation.
    pub fn apply(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json = serde_json::to_value(&*self).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Set a config value by key and save.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown, the value cannot be parsed
    /// or is out of range, or the config cannot be saved.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        self.apply(key, value)?;
        self.save()
    }

    /// Check every editable value against [`EDITABLE_RANGES`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, range) in EDITABLE_RANGES {
            let value = self.range_value(key);
            if !range.contains(&value) {
                return Err(ConfigError::InvalidValue {
                    key: (*key).to_string(),
                    message: format!(
                        "{value} is outside {}..={}",
                        range.start(),
                        range.end()
                    ),
                });
            }
        }
        if let Some(offset) = self.utc_offset_min {
            if self.day_offset_from(offset).is_none() {
                return Err(ConfigError::InvalidValue {
                    key: "utc_offset_min".into(),
                    message: format!("{offset} is not a valid UTC offset"),
                });
            }
        }
        Ok(())
    }

    /// Where calendar days begin for statistics.
    pub fn day_offset(&self) -> FixedOffset {
        self.utc_offset_min
            .and_then(|min| self.day_offset_from(min))
            .unwrap_or_else(|| *chrono::Local::now().offset())
    }

    fn day_offset_from(&self, minutes: i32) -> Option<FixedOffset> {
        FixedOffset::east_opt(minutes.checked_mul(60)?)
    }

    fn range_value(&self, key: &str) -> u32 {
        match key {
            "timer.work_duration" => self.timer.work_duration,
            "timer.break_duration" => self.timer.break_duration,
            "timer.long_break_duration" => self.timer.long_break_duration,
            "timer.sessions_before_long_break" => self.timer.sessions_before_long_break,
            "goals.daily_sessions" => self.goals.daily_sessions,
            "goals.weekly_sessions" => self.goals.weekly_sessions,
            "goals.daily_focus_time_min" => self.goals.daily_focus_time_min,
            _ => 0,
        }
    }
}
