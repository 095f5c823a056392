//! # Design
//!
//! - Centralize application-level errors for setup, watching, and wiring.
//! - Keep error messages constant while carrying context fields for debugging.
//! - Preserve source errors without re-logging at call sites.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias for application operations.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level error type.
///
/// Only the setup variants abort a watch session; failures while a session is
/// running are reported as events instead.
#[derive(Debug, Error)]
pub enum AppError {
    /// The watched input file does not exist.
    #[error("input file missing")]
    InputMissing {
        /// Path that was expected to exist.
        path: PathBuf,
    },
    /// The watched input path exists but is not a regular file.
    #[error("input is not a regular file")]
    InputNotFile {
        /// Offending path.
        path: PathBuf,
    },
    /// The output directory is the input's own directory, so the mirror would
    /// overwrite the watched file.
    #[error("output directory holds the input file")]
    OutputIsInput {
        /// Watched file that would be overwritten.
        path: PathBuf,
    },
    /// Preparing the watch target failed (directory creation or write probe).
    #[error("watch setup failed")]
    Setup {
        /// Operation identifier.
        operation: &'static str,
        /// Path involved in the failure.
        path: PathBuf,
        /// Source IO error.
        source: io::Error,
    },
    /// Subscribing to change notifications failed.
    #[error("change notification subscription failed")]
    Subscribe {
        /// Directory that could not be watched.
        path: PathBuf,
        /// Source notify error.
        source: notify::Error,
    },
    /// Configuration operations failed.
    #[error("configuration operation failed")]
    Config {
        /// Operation identifier.
        operation: &'static str,
        /// Source configuration error.
        source: mirrorwatch_config::ConfigError,
    },
    /// Telemetry operations failed.
    #[error("telemetry operation failed")]
    Telemetry {
        /// Operation identifier.
        operation: &'static str,
        /// Source telemetry error.
        source: mirrorwatch_telemetry::TelemetryError,
    },
    /// Filesystem helpers failed.
    #[error("filesystem operation failed")]
    FsOps {
        /// Operation identifier.
        operation: &'static str,
        /// Source fsops error.
        source: mirrorwatch_fsops::FsOpsError,
    },
}

impl AppError {
    /// Whether the error belongs to the setup class that prevents a session
    /// from starting because of the target paths.
    #[must_use]
    pub const fn is_setup(&self) -> bool {
        matches!(
            self,
            Self::InputMissing { .. }
                | Self::InputNotFile { .. }
                | Self::OutputIsInput { .. }
                | Self::Setup { .. }
        )
    }

    pub(crate) fn setup(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Setup {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) const fn config(
        operation: &'static str,
        source: mirrorwatch_config::ConfigError,
    ) -> Self {
        Self::Config { operation, source }
    }

    pub(crate) const fn telemetry(
        operation: &'static str,
        source: mirrorwatch_telemetry::TelemetryError,
    ) -> Self {
        Self::Telemetry { operation, source }
    }

    pub(crate) const fn fsops(
        operation: &'static str,
        source: mirrorwatch_fsops::FsOpsError,
    ) -> Self {
        Self::FsOps { operation, source }
    }
}
