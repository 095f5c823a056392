//! Typed settings document and watch tuning models.
//!
//! # Design
//! - Pure data carriers shared by the store, the watch controller, and the CLI.
//! - On-disk JSON uses camelCase keys and also accepts the PascalCase keys
//!   written by older settings files.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::defaults::{
    DEFAULT_AUTO_CLEAR_CHANGE_COUNT, DEFAULT_AUTO_CLEAR_INTERVAL, DEFAULT_CHUNK_SIZE,
    DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY,
};
use crate::error::{ConfigError, ConfigResult};
use crate::validate::{parse_bool, parse_minimum, validate_settings, validate_tuning};

/// User preferences persisted between runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
#[allow(clippy::struct_excessive_bools)]
pub struct Settings {
    /// Render a progress bar while copying.
    #[serde(alias = "ShowProgressBar")]
    pub show_progress_bar: bool,
    /// Start watching the first saved path when no paths are given.
    #[serde(alias = "AutoStart")]
    pub auto_start: bool,
    /// Periodically clear the console while watching.
    #[serde(alias = "AutoClearConsole")]
    pub auto_clear_console: bool,
    /// Seconds between periodic console clears.
    #[serde(alias = "AutoClearInterval")]
    pub auto_clear_interval: u32,
    /// Clear the console after a number of change events.
    #[serde(alias = "AutoClearOnChange")]
    pub auto_clear_on_change: bool,
    /// Change events between console clears.
    #[serde(alias = "AutoClearChangeCount")]
    pub auto_clear_change_count: u32,
    /// Named input/output pairs for quick starts.
    #[serde(alias = "SavedPaths")]
    pub saved_paths: Vec<WatchedPath>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            show_progress_bar: true,
            auto_start: false,
            auto_clear_console: false,
            auto_clear_interval: DEFAULT_AUTO_CLEAR_INTERVAL,
            auto_clear_on_change: false,
            auto_clear_change_count: DEFAULT_AUTO_CLEAR_CHANGE_COUNT,
            saved_paths: Vec::new(),
        }
    }
}

impl Settings {
    /// Look up a saved watch path by name.
    #[must_use]
    pub fn find_watched_path(&self, name: &str) -> Option<&WatchedPath> {
        self.saved_paths.iter().find(|entry| entry.name == name)
    }

    /// Check field minimums and saved path uniqueness.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidField`] or [`ConfigError::DuplicatePathName`]
    /// describing the first violation found.
    pub fn validate(&self) -> ConfigResult<()> {
        validate_settings(self)
    }

    /// Parse `value` and assign it to `field`.
    ///
    /// The document is left untouched when parsing fails.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidField`] when the value does not parse or
    /// violates the field's minimum.
    pub fn set_field(&mut self, field: SettingField, value: &str) -> ConfigResult<()> {
        let name = field.as_str();
        match field {
            SettingField::ShowProgressBar => self.show_progress_bar = parse_bool(name, value)?,
            SettingField::AutoStart => self.auto_start = parse_bool(name, value)?,
            SettingField::AutoClearConsole => self.auto_clear_console = parse_bool(name, value)?,
            SettingField::AutoClearInterval => {
                self.auto_clear_interval = parse_minimum(name, value, 1)?;
            }
            SettingField::AutoClearOnChange => {
                self.auto_clear_on_change = parse_bool(name, value)?;
            }
            SettingField::AutoClearChangeCount => {
                self.auto_clear_change_count = parse_minimum(name, value, 1)?;
            }
        }
        Ok(())
    }

    /// Render the current value of `field` for display.
    #[must_use]
    pub fn field_value(&self, field: SettingField) -> String {
        match field {
            SettingField::ShowProgressBar => self.show_progress_bar.to_string(),
            SettingField::AutoStart => self.auto_start.to_string(),
            SettingField::AutoClearConsole => self.auto_clear_console.to_string(),
            SettingField::AutoClearInterval => self.auto_clear_interval.to_string(),
            SettingField::AutoClearOnChange => self.auto_clear_on_change.to_string(),
            SettingField::AutoClearChangeCount => self.auto_clear_change_count.to_string(),
        }
    }
}

/// A named input file and output directory pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct WatchedPath {
    /// Display name, unique within the settings document.
    #[serde(alias = "Name")]
    pub name: String,
    /// File to watch.
    #[serde(alias = "InputPath")]
    pub input_path: String,
    /// Directory receiving the mirrored copy.
    #[serde(alias = "OutputPath")]
    pub output_path: String,
}

impl WatchedPath {
    /// Build a saved path entry.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        input_path: impl Into<String>,
        output_path: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            input_path: input_path.into(),
            output_path: output_path.into(),
        }
    }
}

/// Editable scalar settings addressed by name from the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingField {
    /// `show_progress_bar`
    ShowProgressBar,
    /// `auto_start`
    AutoStart,
    /// `auto_clear_console`
    AutoClearConsole,
    /// `auto_clear_interval`
    AutoClearInterval,
    /// `auto_clear_on_change`
    AutoClearOnChange,
    /// `auto_clear_change_count`
    AutoClearChangeCount,
}

impl SettingField {
    /// Every editable field, in display order.
    pub const ALL: [Self; 6] = [
        Self::ShowProgressBar,
        Self::AutoStart,
        Self::AutoClearConsole,
        Self::AutoClearInterval,
        Self::AutoClearOnChange,
        Self::AutoClearChangeCount,
    ];

    /// Snake-case name of the field.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ShowProgressBar => "show_progress_bar",
            Self::AutoStart => "auto_start",
            Self::AutoClearConsole => "auto_clear_console",
            Self::AutoClearInterval => "auto_clear_interval",
            Self::AutoClearOnChange => "auto_clear_on_change",
            Self::AutoClearChangeCount => "auto_clear_change_count",
        }
    }
}

impl fmt::Display for SettingField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SettingField {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized: String = value
            .chars()
            .filter(|ch| *ch != '_' && *ch != '-')
            .map(|ch| ch.to_ascii_lowercase())
            .collect();
        Self::ALL
            .into_iter()
            .find(|field| field.as_str().replace('_', "") == normalized)
            .ok_or_else(|| ConfigError::UnknownField {
                field: value.to_string(),
            })
    }
}

/// Timing and buffer knobs for the readiness gate and copy engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchTuning {
    /// Readiness probes before giving up on a change.
    pub max_attempts: u32,
    /// Sleep between readiness probes.
    pub retry_delay: Duration,
    /// Read/write chunk size for progress-reporting copies.
    pub chunk_size: usize,
}

impl Default for WatchTuning {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay: DEFAULT_RETRY_DELAY,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl WatchTuning {
    /// Build validated tuning values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidField`] when attempts are zero, the delay
    /// is zero, or the chunk size is zero.
    pub fn new(max_attempts: u32, retry_delay: Duration, chunk_size: usize) -> ConfigResult<Self> {
        let tuning = Self {
            max_attempts,
            retry_delay,
            chunk_size,
        };
        validate_tuning(&tuning)?;
        Ok(tuning)
    }

    /// Worst-case time the gate may spend on a single change.
    #[must_use]
    pub fn max_wait(&self) -> Duration {
        self.retry_delay.saturating_mul(self.max_attempts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_match_documented_values() {
        let settings = Settings::default();
        assert!(settings.show_progress_bar);
        assert!(!settings.auto_start);
        assert_eq!(settings.auto_clear_interval, 30);
        assert_eq!(settings.auto_clear_change_count, 10);
        assert!(settings.saved_paths.is_empty());

        let tuning = WatchTuning::default();
        assert_eq!(tuning.max_attempts, 20);
        assert_eq!(tuning.retry_delay, Duration::from_millis(500));
        assert_eq!(tuning.chunk_size, 81_920);
        assert_eq!(tuning.max_wait(), Duration::from_secs(10));
    }

    #[test]
    fn deserializes_pascal_case_documents() -> anyhow::Result<()> {
        let settings: Settings = serde_json::from_value(json!({
            "ShowProgressBar": false,
            "AutoStart": true,
            "AutoClearInterval": 5,
            "SavedPaths": [
                { "Name": "logs", "InputPath": "/tmp/a.log", "OutputPath": "/tmp/out" }
            ]
        }))?;
        assert!(!settings.show_progress_bar);
        assert!(settings.auto_start);
        assert_eq!(settings.auto_clear_interval, 5);
        assert_eq!(settings.auto_clear_change_count, 10);
        assert_eq!(
            settings.find_watched_path("logs"),
            Some(&WatchedPath::new("logs", "/tmp/a.log", "/tmp/out"))
        );
        Ok(())
    }

    #[test]
    fn serializes_camel_case_keys() -> anyhow::Result<()> {
        let value = serde_json::to_value(Settings::default())?;
        assert_eq!(value["showProgressBar"], json!(true));
        assert_eq!(value["autoClearChangeCount"], json!(10));
        assert!(value.get("show_progress_bar").is_none());
        Ok(())
    }

    #[test]
    fn setting_field_parses_snake_and_camel_case() -> anyhow::Result<()> {
        assert_eq!(
            "auto_clear_interval".parse::<SettingField>()?,
            SettingField::AutoClearInterval
        );
        assert_eq!(
            "showProgressBar".parse::<SettingField>()?,
            SettingField::ShowProgressBar
        );
        assert!(matches!(
            "colour".parse::<SettingField>(),
            Err(ConfigError::UnknownField { .. })
        ));
        Ok(())
    }

    #[test]
    fn set_field_applies_and_rejects() -> anyhow::Result<()> {
        let mut settings = Settings::default();
        settings.set_field(SettingField::AutoStart, "yes")?;
        settings.set_field(SettingField::AutoClearChangeCount, "3")?;
        assert!(settings.auto_start);
        assert_eq!(settings.field_value(SettingField::AutoClearChangeCount), "3");

        let err = settings.set_field(SettingField::AutoClearInterval, "0");
        assert!(matches!(err, Err(ConfigError::InvalidField { .. })));
        assert_eq!(settings.auto_clear_interval, 30);
        Ok(())
    }

    #[test]
    fn tuning_rejects_zero_values() {
        assert!(WatchTuning::new(0, Duration::from_millis(1), 1).is_err());
        assert!(WatchTuning::new(1, Duration::ZERO, 1).is_err());
        assert!(WatchTuning::new(1, Duration::from_millis(1), 0).is_err());
        assert!(WatchTuning::new(3, Duration::from_millis(10), 4).is_ok());
    }
}
