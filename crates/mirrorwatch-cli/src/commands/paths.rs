use std::io::Write;

use anyhow::Context;
use mirrorwatch_app::AppContext;
use mirrorwatch_config::WatchedPath;

use crate::cli::{PathAddArgs, PathRemoveArgs};
use crate::error::{CliError, CliResult};
use crate::output::render_saved_paths;

pub(crate) fn handle_paths_list(ctx: &AppContext, out: &mut impl Write) -> CliResult<()> {
    let settings = ctx.load_settings();
    render_saved_paths(&settings, out)
        .context("failed to write saved paths")
        .map_err(CliError::failure)
}

pub(crate) fn handle_paths_add(
    ctx: &AppContext,
    args: PathAddArgs,
    out: &mut impl Write,
) -> CliResult<()> {
    let mut settings = ctx.load_settings();
    let entry = WatchedPath::new(
        args.name,
        args.input.display().to_string(),
        args.output.display().to_string(),
    );
    let name = entry.name.clone();
    ctx.add_watched_path(&mut settings, entry)?;
    writeln!(out, "Saved path '{name}' added.")
        .context("failed to write confirmation")
        .map_err(CliError::failure)
}

pub(crate) fn handle_paths_remove(
    ctx: &AppContext,
    args: PathRemoveArgs,
    out: &mut impl Write,
) -> CliResult<()> {
    let mut settings = ctx.load_settings();
    let count = settings.saved_paths.len();
    let removed = ctx
        .remove_watched_path(&mut settings, args.index)?
        .ok_or_else(|| {
            CliError::validation(format!(
                "no saved path at index {} ({count} saved)",
                args.index
            ))
        })?;
    writeln!(out, "Saved path '{}' removed.", removed.name)
        .context("failed to write confirmation")
        .map_err(CliError::failure)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use mirrorwatch_config::SettingsStore;
    use mirrorwatch_fsops::ErrorLog;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn context(temp: &TempDir) -> Result<AppContext> {
        Ok(AppContext::new(
            SettingsStore::at(temp.path().join("settings.json")),
            ErrorLog::new(temp.path().join("errors.log")),
        )?)
    }

    fn add_args(name: &str) -> PathAddArgs {
        PathAddArgs {
            name: name.to_string(),
            input: PathBuf::from("/data/report.csv"),
            output: PathBuf::from("/backup"),
        }
    }

    #[test]
    fn add_list_remove_round_trip() -> Result<()> {
        let temp = TempDir::new()?;
        let ctx = context(&temp)?;
        let mut out = Vec::new();

        handle_paths_add(&ctx, add_args("reports"), &mut out)?;
        handle_paths_list(&ctx, &mut out)?;
        handle_paths_remove(&ctx, PathRemoveArgs { index: 0 }, &mut out)?;

        let text = String::from_utf8(out)?;
        assert!(text.contains("Saved path 'reports' added."));
        assert!(text.contains("/data/report.csv"));
        assert!(text.contains("Saved path 'reports' removed."));
        assert!(ctx.load_settings().saved_paths.is_empty());
        Ok(())
    }

    #[test]
    fn duplicate_name_is_validation_error() -> Result<()> {
        let temp = TempDir::new()?;
        let ctx = context(&temp)?;
        let mut out = Vec::new();
        assert!(handle_paths_add(&ctx, add_args("dup"), &mut out).is_ok());

        let err = handle_paths_add(&ctx, add_args("dup"), &mut out).err();
        assert_eq!(err.map(|e| e.exit_code()), Some(2));
        assert_eq!(ctx.load_settings().saved_paths.len(), 1);
        Ok(())
    }

    #[test]
    fn out_of_range_remove_is_validation_error() -> Result<()> {
        let temp = TempDir::new()?;
        let ctx = context(&temp)?;
        let mut out = Vec::new();
        let err = handle_paths_remove(&ctx, PathRemoveArgs { index: 3 }, &mut out).err();
        assert_eq!(
            err.map(|e| e.display_message()),
            Some("no saved path at index 3 (0 saved)".to_string())
        );
        Ok(())
    }
}
