//! CLI error type and exit-code mapping.

use std::fmt::{self, Display, Formatter};

use mirrorwatch_app::AppError;
use mirrorwatch_config::{ConfigError, SettingField};

/// CLI-level error type to distinguish validation from operational failures.
#[derive(Debug)]
pub(crate) enum CliError {
    Validation(String),
    Failure(anyhow::Error),
}

/// Convenience alias for functions returning a `CliError`.
pub(crate) type CliResult<T> = Result<T, CliError>;

impl CliError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn failure(error: impl Into<anyhow::Error>) -> Self {
        Self::Failure(error.into())
    }

    pub(crate) const fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) => 2,
            Self::Failure(_) => 3,
        }
    }

    pub(crate) fn display_message(&self) -> String {
        match self {
            Self::Validation(message) => message.clone(),
            Self::Failure(error) => format!("{error:#}"),
        }
    }
}

impl Display for CliError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str("cli error")
    }
}

impl std::error::Error for CliError {}

impl From<AppError> for CliError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::InputMissing { path } => {
                Self::validation(format!("input file {} does not exist", path.display()))
            }
            AppError::InputNotFile { path } => {
                Self::validation(format!("{} is not a regular file", path.display()))
            }
            AppError::OutputIsInput { path } => Self::validation(format!(
                "output directory already holds {}; choose a different directory",
                path.display()
            )),
            AppError::Config { source, operation } => match config_validation_message(&source) {
                Some(message) => Self::validation(message),
                None => Self::failure(AppError::Config { operation, source }),
            },
            other => Self::failure(other),
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        config_validation_message(&err).map_or_else(|| Self::failure(err), Self::validation)
    }
}

/// User-facing message for configuration errors caused by bad input.
fn config_validation_message(err: &ConfigError) -> Option<String> {
    match err {
        ConfigError::InvalidField {
            field,
            value,
            reason,
        } => Some(match value {
            Some(value) => format!("invalid value '{value}' for {field}: {reason}"),
            None => format!("invalid {field}: {reason}"),
        }),
        ConfigError::UnknownField { field } => {
            let known: Vec<&str> = SettingField::ALL.iter().map(|f| f.as_str()).collect();
            Some(format!(
                "unknown setting '{field}' (expected one of: {})",
                known.join(", ")
            ))
        }
        ConfigError::DuplicatePathName { name } => {
            Some(format!("a saved path named '{name}' already exists"))
        }
        _ => None,
    }
}
