//! Error types for configuration operations.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Primary error type for configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Field contained an invalid value.
    #[error("invalid configuration field")]
    InvalidField {
        /// Field that failed validation.
        field: String,
        /// Offending value when available.
        value: Option<String>,
        /// Machine-readable reason for the failure.
        reason: &'static str,
    },
    /// Field did not exist in the settings document.
    #[error("unknown configuration field")]
    UnknownField {
        /// Name of the unexpected field.
        field: String,
    },
    /// A saved watch path with the same name already exists.
    #[error("duplicate watched path name")]
    DuplicatePathName {
        /// Name that collided.
        name: String,
    },
    /// The platform did not expose a usable configuration directory.
    #[error("configuration directory unavailable")]
    MissingDirectory {
        /// Directory kind that could not be resolved.
        kind: &'static str,
    },
    /// Settings file contents were not valid JSON for the settings document.
    #[error("failed to parse settings file")]
    Parse {
        /// File that failed to parse.
        path: PathBuf,
        /// Source JSON error.
        source: serde_json::Error,
    },
    /// Settings could not be serialized.
    #[error("failed to serialize settings")]
    Serialize {
        /// Source JSON error.
        source: serde_json::Error,
    },
    /// File system operation failed.
    #[error("filesystem operation failed")]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// Path involved in the failure.
        path: PathBuf,
        /// Source IO error.
        source: io::Error,
    },
}

impl ConfigError {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn invalid(
        field: impl Into<String>,
        value: Option<String>,
        reason: &'static str,
    ) -> Self {
        Self::InvalidField {
            field: field.into(),
            value,
            reason,
        }
    }
}

/// Convenience alias for configuration results.
pub type ConfigResult<T> = Result<T, ConfigError>;
