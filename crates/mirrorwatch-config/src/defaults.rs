//! Default values for settings and watch tuning.
//!
//! # Design
//! - Centralize defaults so serde, validation, and the CLI agree on them.
//! - Keep timing defaults explicit; the gate's worst case is attempts x delay.

use std::time::Duration;

/// Number of readiness probes before a change is skipped.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 20;
/// Delay between readiness probes.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(500);
/// Chunk size used for progress-reporting copies.
pub const DEFAULT_CHUNK_SIZE: usize = 80 * 1024;

/// Seconds between automatic console clears.
pub(crate) const DEFAULT_AUTO_CLEAR_INTERVAL: u32 = 30;
/// Change events between automatic console clears.
pub(crate) const DEFAULT_AUTO_CLEAR_CHANGE_COUNT: u32 = 10;

/// File name of the persisted settings document.
pub(crate) const SETTINGS_FILE_NAME: &str = "settings.json";
/// File name of the append-only error log.
pub(crate) const ERROR_LOG_FILE_NAME: &str = "errors.log";

/// Overrides the directory holding `settings.json`.
pub const CONFIG_DIR_ENV: &str = "MIRRORWATCH_CONFIG_DIR";
/// Overrides the full path of the error log.
pub const ERROR_LOG_ENV: &str = "MIRRORWATCH_ERROR_LOG";
