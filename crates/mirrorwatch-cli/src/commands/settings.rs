use std::io::Write;

use anyhow::Context;
use mirrorwatch_app::AppContext;
use mirrorwatch_config::SettingField;

use crate::cli::SettingSetArgs;
use crate::error::{CliError, CliResult};
use crate::output::render_settings;

pub(crate) fn handle_settings_show(ctx: &AppContext, out: &mut impl Write) -> CliResult<()> {
    let settings = ctx.load_settings();
    let location = ctx.settings_path().display().to_string();
    render_settings(&settings, &location, out)
        .context("failed to write settings")
        .map_err(CliError::failure)
}

pub(crate) fn handle_settings_set(
    ctx: &AppContext,
    args: SettingSetArgs,
    out: &mut impl Write,
) -> CliResult<()> {
    let field: SettingField = args.key.parse()?;
    let mut settings = ctx.load_settings();
    ctx.set_setting(&mut settings, field, &args.value)?;
    writeln!(out, "{field} = {}", settings.field_value(field))
        .context("failed to write confirmation")
        .map_err(CliError::failure)
}
