//! Process wiring: shared services and the session run loop.
//!
//! # Design
//! - Build the event bus, metrics, settings store, and error log once per process.
//! - Settings edits publish `SettingsChanged` only after the document is saved.
//! - `run_until` is the single place a session is stopped on shutdown.

use std::future::Future;
use std::path::Path;

use mirrorwatch_config::{
    SettingField, Settings, SettingsStore, WatchTuning, WatchedPath, resolve_error_log_path,
};
use mirrorwatch_events::{Event, EventBus};
use mirrorwatch_fsops::ErrorLog;
use mirrorwatch_telemetry::Metrics;
use tracing::{debug, info};

use crate::controller::{WatchController, WatchSession};
use crate::error::{AppError, AppResult};

/// Shared services for one process: event bus, metrics, settings and error log.
#[derive(Debug, Clone)]
pub struct AppContext {
    events: EventBus,
    metrics: Metrics,
    store: SettingsStore,
    error_log: ErrorLog,
}

impl AppContext {
    /// Resolve the settings file and error log from the environment and platform directories.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Config`] when no location can be resolved or
    /// [`AppError::Telemetry`] when the metrics registry cannot be built.
    pub fn from_env() -> AppResult<Self> {
        let store = SettingsStore::discover()
            .map_err(|err| AppError::config("settings_store.discover", err))?;
        let error_log = resolve_error_log_path()
            .map_err(|err| AppError::config("error_log.resolve", err))?;
        Self::new(store, ErrorLog::new(error_log))
    }

    /// Build a context from explicit locations.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Telemetry`] when the metrics registry cannot be built.
    pub fn new(store: SettingsStore, error_log: ErrorLog) -> AppResult<Self> {
        let metrics = Metrics::new().map_err(|err| AppError::telemetry("metrics.new", err))?;
        debug!(
            settings = %store.path().display(),
            error_log = %error_log.path().display(),
            "application context ready"
        );
        Ok(Self {
            events: EventBus::new(),
            metrics,
            store,
            error_log,
        })
    }

    /// Shared event bus.
    #[must_use]
    pub const fn events(&self) -> &EventBus {
        &self.events
    }

    /// Shared metrics registry.
    #[must_use]
    pub const fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Location of the settings document.
    #[must_use]
    pub fn settings_path(&self) -> &Path {
        self.store.path()
    }

    /// Location of the failure log.
    #[must_use]
    pub fn error_log_path(&self) -> &Path {
        self.error_log.path()
    }

    /// Load settings, falling back to defaults when the document is missing or malformed.
    #[must_use]
    pub fn load_settings(&self) -> Settings {
        self.store.load_or_default()
    }

    /// Assign `value` to `field` and persist the document.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Config`] when the value is invalid or saving fails.
    /// `settings` is unchanged on error.
    pub fn set_setting(
        &self,
        settings: &mut Settings,
        field: SettingField,
        value: &str,
    ) -> AppResult<()> {
        let mut updated = settings.clone();
        updated
            .set_field(field, value)
            .map_err(|err| AppError::config("settings.set_field", err))?;
        self.store
            .save(&updated)
            .map_err(|err| AppError::config("settings.save", err))?;
        *settings = updated;
        self.settings_changed(format!("{field} = {}", settings.field_value(field)));
        Ok(())
    }

    /// Save a new named watch path.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Config`] for duplicate names, empty fields, or save failures.
    pub fn add_watched_path(&self, settings: &mut Settings, entry: WatchedPath) -> AppResult<()> {
        let name = entry.name.clone();
        self.store
            .add_watched_path(settings, entry)
            .map_err(|err| AppError::config("settings.add_watched_path", err))?;
        self.settings_changed(format!("saved path '{name}' added"));
        Ok(())
    }

    /// Remove the saved path at `index`; out-of-range indices return `None`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Config`] when saving fails.
    pub fn remove_watched_path(
        &self,
        settings: &mut Settings,
        index: usize,
    ) -> AppResult<Option<WatchedPath>> {
        let removed = self
            .store
            .remove_watched_path(settings, index)
            .map_err(|err| AppError::config("settings.remove_watched_path", err))?;
        if let Some(entry) = &removed {
            self.settings_changed(format!("saved path '{}' removed", entry.name));
        }
        Ok(removed)
    }

    /// Controller wired to this context's bus, metrics and error log.
    #[must_use]
    pub fn controller(&self, tuning: WatchTuning, report_progress: bool) -> WatchController {
        WatchController::new(self.events.clone(), self.metrics.clone(), tuning)
            .with_progress(report_progress)
            .with_error_log(self.error_log.clone())
    }

    fn settings_changed(&self, description: String) {
        info!(%description, "settings changed");
        let event = Event::SettingsChanged { description };
        self.metrics.inc_event(event.kind());
        self.events.publish(event);
    }
}

/// Keep `session` running until `shutdown` resolves, then stop it.
pub async fn run_until<F>(session: &mut WatchSession, shutdown: F)
where
    F: Future<Output = ()>,
{
    shutdown.await;
    info!(session_id = %session.id(), "shutdown requested");
    session.stop().await;
}
