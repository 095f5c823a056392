//! JSON-file persistence for [`Settings`].
//!
//! # Design
//! - The store owns a path, never a cached document; callers load, mutate, save.
//! - Saves go through a sibling temp file and a rename so readers never see a
//!   half-written document.
//! - Path discovery honours `MIRRORWATCH_CONFIG_DIR` before the platform default.

use std::env;
use std::ffi::OsString;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use tracing::{debug, warn};

use crate::defaults::{CONFIG_DIR_ENV, ERROR_LOG_ENV, ERROR_LOG_FILE_NAME, SETTINGS_FILE_NAME};
use crate::error::{ConfigError, ConfigResult};
use crate::model::{Settings, WatchedPath};
use crate::validate::validate_watched_path;

const QUALIFIER: &str = "dev";
const ORGANIZATION: &str = "mirrorwatch";
const APPLICATION: &str = "mirrorwatch";

/// Loads and saves the settings document at a fixed path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    /// Use an explicit settings file path.
    #[must_use]
    pub const fn at(path: PathBuf) -> Self {
        Self { path }
    }

    /// Resolve the settings file from the environment or platform directories.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingDirectory`] when no override is set and the
    /// platform has no home directory.
    pub fn discover() -> ConfigResult<Self> {
        Self::discover_with(env::var_os(CONFIG_DIR_ENV))
    }

    fn discover_with(config_dir: Option<OsString>) -> ConfigResult<Self> {
        if let Some(dir) = config_dir.filter(|value| !value.is_empty()) {
            return Ok(Self::at(PathBuf::from(dir).join(SETTINGS_FILE_NAME)));
        }
        let dirs = project_dirs("config")?;
        Ok(Self::at(dirs.config_dir().join(SETTINGS_FILE_NAME)))
    }

    /// Path of the settings document.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the settings document; a missing file yields defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] for read failures other than not-found and
    /// [`ConfigError::Parse`] for malformed JSON.
    pub fn load(&self) -> ConfigResult<Settings> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "settings file absent; using defaults");
                return Ok(Settings::default());
            }
            Err(err) => return Err(ConfigError::io("settings.read", &self.path, err)),
        };
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    /// Read the settings document, falling back to defaults on any failure.
    #[must_use]
    pub fn load_or_default(&self) -> Settings {
        match self.load() {
            Ok(settings) => settings,
            Err(err) => {
                warn!(
                    error = %err,
                    detail = ?err,
                    path = %self.path.display(),
                    "failed to load settings; using defaults"
                );
                Settings::default()
            }
        }
    }

    /// Validate and persist the settings document.
    ///
    /// # Errors
    ///
    /// Returns validation errors, [`ConfigError::Serialize`], or
    /// [`ConfigError::Io`] when the directory, temp file, or rename fails.
    pub fn save(&self, settings: &Settings) -> ConfigResult<()> {
        settings.validate()?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|source| ConfigError::io("settings.create_dir", parent, source))?;
        }
        let body = serde_json::to_string_pretty(settings)
            .map_err(|source| ConfigError::Serialize { source })?;

        let temp = self.path.with_extension("json.tmp");
        fs::write(&temp, body).map_err(|source| ConfigError::io("settings.write", &temp, source))?;
        fs::rename(&temp, &self.path)
            .map_err(|source| ConfigError::io("settings.rename", &self.path, source))?;
        debug!(path = %self.path.display(), "settings saved");
        Ok(())
    }

    /// Append a saved path and persist the document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::DuplicatePathName`] when the name is taken,
    /// [`ConfigError::InvalidField`] for empty fields, or any save error. The
    /// in-memory document is unchanged when an error is returned.
    pub fn add_watched_path(&self, settings: &mut Settings, entry: WatchedPath) -> ConfigResult<()> {
        validate_watched_path(&entry)?;
        if settings.find_watched_path(&entry.name).is_some() {
            return Err(ConfigError::DuplicatePathName { name: entry.name });
        }
        settings.saved_paths.push(entry);
        if let Err(err) = self.save(settings) {
            settings.saved_paths.pop();
            return Err(err);
        }
        Ok(())
    }

    /// Remove the saved path at `index` and persist the document.
    ///
    /// Out-of-range indices leave the document untouched and return `None`.
    ///
    /// # Errors
    ///
    /// Returns any save error; the entry is restored in memory when saving fails.
    pub fn remove_watched_path(
        &self,
        settings: &mut Settings,
        index: usize,
    ) -> ConfigResult<Option<WatchedPath>> {
        if index >= settings.saved_paths.len() {
            return Ok(None);
        }
        let removed = settings.saved_paths.remove(index);
        if let Err(err) = self.save(settings) {
            settings.saved_paths.insert(index, removed);
            return Err(err);
        }
        Ok(Some(removed))
    }
}

/// Resolve the append-only error log location.
///
/// # Errors
///
/// Returns [`ConfigError::MissingDirectory`] when no override is set and the
/// platform has no data directory.
pub fn resolve_error_log_path() -> ConfigResult<PathBuf> {
    error_log_path_with(env::var_os(ERROR_LOG_ENV))
}

fn error_log_path_with(override_path: Option<OsString>) -> ConfigResult<PathBuf> {
    if let Some(path) = override_path.filter(|value| !value.is_empty()) {
        return Ok(PathBuf::from(path));
    }
    let dirs = project_dirs("data")?;
    Ok(dirs.data_dir().join(ERROR_LOG_FILE_NAME))
}

fn project_dirs(kind: &'static str) -> ConfigResult<ProjectDirs> {
    ProjectDirs::from(QUALIFIER, ORGANIZATION, APPLICATION)
        .ok_or(ConfigError::MissingDirectory { kind })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_in(temp: &TempDir) -> SettingsStore {
        SettingsStore::at(temp.path().join("nested").join("settings.json"))
    }

    #[test]
    fn missing_file_loads_defaults() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let store = store_in(&temp);
        assert_eq!(store.load()?, Settings::default());
        Ok(())
    }

    #[test]
    fn save_then_load_preserves_document() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let store = store_in(&temp);
        let settings = Settings {
            auto_start: true,
            auto_clear_interval: 12,
            saved_paths: vec![WatchedPath::new("logs", "/var/log/a.log", "/srv/mirror")],
            ..Settings::default()
        };
        store.save(&settings)?;
        assert_eq!(store.load()?, settings);
        assert!(!store.path().with_extension("json.tmp").exists());
        Ok(())
    }

    #[test]
    fn malformed_file_is_a_parse_error_and_falls_back() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let store = SettingsStore::at(temp.path().join("settings.json"));
        fs::write(store.path(), "{ not json")?;
        assert!(matches!(store.load(), Err(ConfigError::Parse { .. })));
        assert_eq!(store.load_or_default(), Settings::default());
        Ok(())
    }

    #[test]
    fn add_and_remove_watched_paths() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let store = store_in(&temp);
        let mut settings = Settings::default();

        store.add_watched_path(&mut settings, WatchedPath::new("a", "/in/a", "/out"))?;
        store.add_watched_path(&mut settings, WatchedPath::new("b", "/in/b", "/out"))?;
        let duplicate = store.add_watched_path(&mut settings, WatchedPath::new("a", "/x", "/y"));
        assert!(matches!(duplicate, Err(ConfigError::DuplicatePathName { .. })));
        assert_eq!(settings.saved_paths.len(), 2);

        assert_eq!(store.remove_watched_path(&mut settings, 5)?, None);
        let removed = store.remove_watched_path(&mut settings, 0)?;
        assert_eq!(removed.map(|entry| entry.name), Some("a".to_string()));

        let reloaded = store.load()?;
        assert_eq!(reloaded.saved_paths, vec![WatchedPath::new("b", "/in/b", "/out")]);
        Ok(())
    }

    #[test]
    fn discover_honours_config_dir_override() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let store = SettingsStore::discover_with(Some(temp.path().as_os_str().to_owned()))?;
        assert_eq!(store.path(), temp.path().join("settings.json"));
        Ok(())
    }

    #[test]
    fn empty_override_is_ignored() {
        if let Ok(store) = SettingsStore::discover_with(Some(OsString::new())) {
            assert!(store.path().ends_with("settings.json"));
            assert_ne!(store.path(), Path::new("settings.json"));
        }
    }

    #[test]
    fn error_log_path_honours_override() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let target = temp.path().join("custom.log");
        assert_eq!(error_log_path_with(Some(target.clone().into_os_string()))?, target);
        Ok(())
    }
}
