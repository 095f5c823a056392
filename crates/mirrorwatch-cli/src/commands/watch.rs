use std::io::{self, Write};
use std::time::Duration;

use anyhow::{Context, anyhow};
use mirrorwatch_app::{AppContext, WatchTarget, run_until};
use mirrorwatch_config::{Settings, WatchTuning, WatchedPath};
use mirrorwatch_events::{Event, EventStream};
use mirrorwatch_telemetry::Metrics;
use tokio::signal;
use tracing::warn;

use crate::cli::WatchArgs;
use crate::error::{CliError, CliResult};
use crate::output::EventRenderer;

pub(crate) async fn handle_watch(ctx: &AppContext, args: WatchArgs) -> CliResult<()> {
    let mut settings = ctx.load_settings();
    let target = resolve_target(&args, &settings)?;
    let tuning = WatchTuning::new(
        args.max_attempts,
        Duration::from_millis(args.retry_delay_ms),
        args.chunk_size,
    )?;
    let show_progress = settings.show_progress_bar && !args.no_progress;
    let print_metrics = args.metrics;

    let stream = ctx.events().subscribe(None);
    let mut session = ctx.controller(tuning, show_progress).start(&target)?;

    if let Some(name) = args.save_as {
        let prepared = session.target();
        let entry = WatchedPath::new(
            name,
            prepared.input_file().display().to_string(),
            prepared.output_dir().display().to_string(),
        );
        if let Err(err) = ctx.add_watched_path(&mut settings, entry) {
            eprintln!(
                "warning: path not saved: {}",
                CliError::from(err).display_message()
            );
        }
    }

    let renderer = EventRenderer::from_settings(&settings, show_progress);
    let clear_interval = settings
        .auto_clear_console
        .then(|| Duration::from_secs(u64::from(settings.auto_clear_interval)));
    let printer = tokio::spawn(print_events(stream, renderer, clear_interval));

    run_until(&mut session, async {
        if let Err(err) = signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for Ctrl-C; stopping");
        }
    })
    .await;

    printer
        .await
        .map_err(|err| CliError::failure(anyhow!("event printer failed: {err}")))??;

    if print_metrics {
        write_metrics(ctx.metrics(), &mut io::stdout().lock())?;
    }
    Ok(())
}

/// Write the Prometheus text exposition of `metrics`.
fn write_metrics(metrics: &Metrics, out: &mut impl Write) -> CliResult<()> {
    let rendered = metrics.render().map_err(CliError::failure)?;
    out.write_all(rendered.as_bytes())
        .context("failed to write metrics")
        .map_err(CliError::failure)
}

/// Pick the watch target from explicit paths, a saved name, or the auto-start entry.
pub(crate) fn resolve_target(args: &WatchArgs, settings: &Settings) -> CliResult<WatchTarget> {
    if let Some(name) = &args.saved {
        let entry = settings
            .find_watched_path(name)
            .ok_or_else(|| CliError::validation(format!("no saved path named '{name}'")))?;
        return Ok(WatchTarget::new(&entry.input_path, &entry.output_path));
    }

    match (&args.input, &args.output) {
        (Some(input), Some(output)) => Ok(WatchTarget::new(input, output)),
        (Some(_), None) => Err(CliError::validation(
            "an OUTPUT directory is required when INPUT is given",
        )),
        (None, _) if settings.auto_start => settings
            .saved_paths
            .first()
            .map(|entry| WatchTarget::new(&entry.input_path, &entry.output_path))
            .ok_or_else(|| {
                CliError::validation("auto_start is enabled but no saved paths exist")
            }),
        (None, _) => Err(CliError::validation(
            "pass INPUT and OUTPUT, use --saved NAME, or enable auto_start",
        )),
    }
}

async fn print_events(
    mut stream: EventStream,
    mut renderer: EventRenderer,
    clear_interval: Option<Duration>,
) -> CliResult<()> {
    let mut ticker = tokio::time::interval(clear_interval.unwrap_or(Duration::from_secs(3600)));
    // The first tick fires immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            envelope = stream.next() => {
                let Some(envelope) = envelope else {
                    return Ok(());
                };
                let stopped = matches!(envelope.event, Event::WatchingStopped { .. });
                renderer
                    .render(&envelope, &mut io::stdout().lock())
                    .context("failed to write event")
                    .map_err(CliError::failure)?;
                if stopped {
                    return Ok(());
                }
            }
            _ = ticker.tick(), if clear_interval.is_some() => {
                renderer
                    .clear(&mut io::stdout().lock())
                    .context("failed to clear console")
                    .map_err(CliError::failure)?;
            }
        }
    }
}
