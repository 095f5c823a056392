//! Validation helpers and parsing utilities for the settings document.

use std::collections::HashSet;

use crate::error::{ConfigError, ConfigResult};
use crate::model::{Settings, WatchTuning, WatchedPath};

#[allow(clippy::redundant_pub_crate)]
pub(crate) fn validate_settings(settings: &Settings) -> ConfigResult<()> {
    ensure_minimum("auto_clear_interval", settings.auto_clear_interval, 1)?;
    ensure_minimum(
        "auto_clear_change_count",
        settings.auto_clear_change_count,
        1,
    )?;

    let mut seen = HashSet::new();
    for entry in &settings.saved_paths {
        validate_watched_path(entry)?;
        if !seen.insert(entry.name.as_str()) {
            return Err(ConfigError::DuplicatePathName {
                name: entry.name.clone(),
            });
        }
    }
    Ok(())
}

#[allow(clippy::redundant_pub_crate)]
pub(crate) fn validate_watched_path(entry: &WatchedPath) -> ConfigResult<()> {
    if entry.name.trim().is_empty() {
        return Err(ConfigError::invalid(
            "saved_paths.name",
            None,
            "must not be empty",
        ));
    }
    if entry.input_path.trim().is_empty() {
        return Err(ConfigError::invalid(
            "saved_paths.input_path",
            Some(entry.name.clone()),
            "must not be empty",
        ));
    }
    if entry.output_path.trim().is_empty() {
        return Err(ConfigError::invalid(
            "saved_paths.output_path",
            Some(entry.name.clone()),
            "must not be empty",
        ));
    }
    Ok(())
}

#[allow(clippy::redundant_pub_crate)]
pub(crate) fn validate_tuning(tuning: &WatchTuning) -> ConfigResult<()> {
    ensure_minimum("max_attempts", tuning.max_attempts, 1)?;
    if tuning.retry_delay.is_zero() {
        return Err(ConfigError::invalid(
            "retry_delay",
            Some("0".to_string()),
            "must be greater than zero",
        ));
    }
    if tuning.chunk_size == 0 {
        return Err(ConfigError::invalid(
            "chunk_size",
            Some("0".to_string()),
            "must be greater than zero",
        ));
    }
    Ok(())
}

#[allow(clippy::redundant_pub_crate)]
pub(crate) fn parse_bool(field: &str, value: &str) -> ConfigResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(ConfigError::invalid(
            field,
            Some(value.to_string()),
            "must be a boolean",
        )),
    }
}

#[allow(clippy::redundant_pub_crate)]
pub(crate) fn parse_minimum(field: &str, value: &str, minimum: u32) -> ConfigResult<u32> {
    let parsed = value
        .trim()
        .parse::<u32>()
        .map_err(|_| ConfigError::invalid(field, Some(value.to_string()), "must be an integer"))?;
    ensure_minimum(field, parsed, minimum)?;
    Ok(parsed)
}

fn ensure_minimum(field: &str, value: u32, minimum: u32) -> ConfigResult<()> {
    if value < minimum {
        return Err(ConfigError::invalid(
            field,
            Some(value.to_string()),
            "below minimum",
        ));
    }
    Ok(())
}
