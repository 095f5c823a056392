//! Output renderers and formatting helpers for CLI commands.

use std::io::{self, Write};

use mirrorwatch_config::{SettingField, Settings};
use mirrorwatch_events::{Event, EventEnvelope};

const BAR_CELLS: usize = 30;
const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

/// Renders watch session events as plain text lines.
#[derive(Debug)]
pub(crate) struct EventRenderer {
    show_progress: bool,
    clear_after_changes: Option<u32>,
    changes_since_clear: u32,
    progress_open: bool,
}

impl EventRenderer {
    pub(crate) const fn new(show_progress: bool, clear_after_changes: Option<u32>) -> Self {
        Self {
            show_progress,
            clear_after_changes,
            changes_since_clear: 0,
            progress_open: false,
        }
    }

    pub(crate) fn from_settings(settings: &Settings, show_progress: bool) -> Self {
        let clear_after = settings
            .auto_clear_on_change
            .then_some(settings.auto_clear_change_count);
        Self::new(show_progress, clear_after)
    }

    pub(crate) fn render(&mut self, envelope: &EventEnvelope, out: &mut impl Write) -> io::Result<()> {
        let time = envelope.timestamp.format("%H:%M:%S");
        match &envelope.event {
            Event::WatchingStarted {
                input_path,
                output_dir,
                ..
            } => {
                writeln!(out, "[{time}] watching {input_path} -> {output_dir}")?;
            }
            Event::ChangeDetected { path, .. } => {
                self.maybe_clear_on_change(out)?;
                self.close_progress(out)?;
                writeln!(out, "[{time}] change detected: {path}")?;
            }
            Event::CopyProgress { fraction, .. } => {
                if self.show_progress {
                    write!(out, "\r{}", progress_bar(*fraction))?;
                    self.progress_open = true;
                }
            }
            Event::CopySucceeded { destination, .. } => {
                self.close_progress(out)?;
                writeln!(out, "[{time}] copied to {destination}")?;
            }
            Event::CopyFailed { reason, .. } => {
                self.close_progress(out)?;
                writeln!(out, "[{time}] copy failed: {reason}")?;
            }
            Event::ReadyTimeout { path, attempts, .. } => {
                self.close_progress(out)?;
                writeln!(
                    out,
                    "[{time}] skipped change: {path} not ready after {attempts} attempts"
                )?;
            }
            Event::WatchingStopped { .. } => {
                self.close_progress(out)?;
                writeln!(out, "[{time}] watching stopped")?;
            }
            Event::SettingsChanged { description } => {
                writeln!(out, "[{time}] settings: {description}")?;
            }
        }
        out.flush()
    }

    pub(crate) fn clear(&mut self, out: &mut impl Write) -> io::Result<()> {
        self.changes_since_clear = 0;
        self.progress_open = false;
        write!(out, "{CLEAR_SCREEN}")?;
        out.flush()
    }

    fn maybe_clear_on_change(&mut self, out: &mut impl Write) -> io::Result<()> {
        let Some(limit) = self.clear_after_changes else {
            return Ok(());
        };
        if self.changes_since_clear >= limit {
            self.clear(out)?;
        }
        self.changes_since_clear = self.changes_since_clear.saturating_add(1);
        Ok(())
    }

    fn close_progress(&mut self, out: &mut impl Write) -> io::Result<()> {
        if self.progress_open {
            self.progress_open = false;
            writeln!(out)?;
        }
        Ok(())
    }
}

/// Text progress bar such as `[█████░░░░░] 50%`.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub(crate) fn progress_bar(fraction: f64) -> String {
    let fraction = if fraction.is_nan() {
        0.0
    } else {
        fraction.clamp(0.0, 1.0)
    };
    let filled = (fraction * BAR_CELLS as f64).round() as usize;
    let percent = (fraction * 100.0).round() as u32;
    format!(
        "[{}{}] {percent}%",
        "█".repeat(filled),
        "░".repeat(BAR_CELLS - filled)
    )
}

pub(crate) fn render_settings(
    settings: &Settings,
    location: &str,
    out: &mut impl Write,
) -> io::Result<()> {
    for field in SettingField::ALL {
        writeln!(out, "{:<24} {}", field.as_str(), settings.field_value(field))?;
    }
    writeln!(out, "{:<24} {}", "saved_paths", settings.saved_paths.len())?;
    writeln!(out, "settings file: {location}")
}

pub(crate) fn render_saved_paths(settings: &Settings, out: &mut impl Write) -> io::Result<()> {
    if settings.saved_paths.is_empty() {
        return writeln!(out, "no saved paths");
    }
    writeln!(out, "{:>5} {:<20} {:<40} OUTPUT", "INDEX", "NAME", "INPUT")?;
    for (index, entry) in settings.saved_paths.iter().enumerate() {
        writeln!(
            out,
            "{:>5} {:<20} {:<40} {}",
            index, entry.name, entry.input_path, entry.output_path
        )?;
    }
    Ok(())
}
