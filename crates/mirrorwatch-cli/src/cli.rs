//! Argument parsing and command dispatch for the `mirrorwatch` binary.

use std::io;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use mirrorwatch_app::AppContext;
use mirrorwatch_config::{DEFAULT_CHUNK_SIZE, DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY};
use mirrorwatch_telemetry::{GlobalContextGuard, LogFormat, LoggingConfig, build_sha, init_logging};
use tracing::debug;

use crate::commands::paths::{handle_paths_add, handle_paths_list, handle_paths_remove};
use crate::commands::settings::{handle_settings_set, handle_settings_show};
use crate::commands::watch::handle_watch;
use crate::error::{CliError, CliResult};

const DEFAULT_CLI_LOG_LEVEL: &str = "warn";

/// Parses CLI arguments, executes the requested command, and returns the
/// process exit code.
pub async fn run() -> i32 {
    let cli = Cli::parse();
    if let Err(err) = install_logging(&cli) {
        eprintln!("error: {}", err.display_message());
        return err.exit_code();
    }
    let _context = GlobalContextGuard::new(command_label(&cli.command));

    match dispatch(cli).await {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("error: {}", err.display_message());
            err.exit_code()
        }
    }
}

async fn dispatch(cli: Cli) -> CliResult<()> {
    let ctx = AppContext::from_env()?;
    debug!(
        settings = %ctx.settings_path().display(),
        error_log = %ctx.error_log_path().display(),
        "resolved application paths"
    );
    let mut stdout = io::stdout();

    match cli.command {
        Command::Watch(args) => handle_watch(&ctx, args).await,
        Command::Paths(paths) => match paths {
            PathsCommand::List => handle_paths_list(&ctx, &mut stdout),
            PathsCommand::Add(args) => handle_paths_add(&ctx, args, &mut stdout),
            PathsCommand::Remove(args) => handle_paths_remove(&ctx, args, &mut stdout),
        },
        Command::Settings(settings) => match settings {
            SettingsCommand::Show => handle_settings_show(&ctx, &mut stdout),
            SettingsCommand::Set(args) => handle_settings_set(&ctx, args, &mut stdout),
        },
    }
}

fn install_logging(cli: &Cli) -> CliResult<()> {
    let format = match &cli.log_format {
        Some(value) => value.parse::<LogFormat>().map_err(|_| {
            CliError::validation(format!(
                "unknown log format '{value}' (expected json or pretty)"
            ))
        })?,
        None => LogFormat::infer(),
    };
    let config = LoggingConfig {
        level: &cli.log_level,
        format,
        build_sha: build_sha(),
    };
    init_logging(&config).map_err(CliError::failure)
}

#[derive(Parser)]
#[command(
    name = "mirrorwatch",
    version,
    about = "Mirror a file into an output directory whenever it changes"
)]
pub(crate) struct Cli {
    #[arg(
        long,
        global = true,
        env = "MIRRORWATCH_LOG_LEVEL",
        default_value = DEFAULT_CLI_LOG_LEVEL
    )]
    log_level: String,
    #[arg(
        long,
        global = true,
        env = "MIRRORWATCH_LOG_FORMAT",
        help = "Log output format: json or pretty (default depends on the build profile)"
    )]
    log_format: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Watch a file and mirror it into an output directory until Ctrl-C.
    Watch(WatchArgs),
    /// Manage saved watch paths.
    #[command(subcommand)]
    Paths(PathsCommand),
    /// Show or edit persisted settings.
    #[command(subcommand)]
    Settings(SettingsCommand),
}

#[derive(Subcommand)]
pub(crate) enum PathsCommand {
    /// List saved watch paths with their indices.
    List,
    /// Save a named input/output pair.
    Add(PathAddArgs),
    /// Remove the saved path at an index.
    Remove(PathRemoveArgs),
}

#[derive(Subcommand)]
pub(crate) enum SettingsCommand {
    /// Print every setting.
    Show,
    /// Set one setting.
    Set(SettingSetArgs),
}

#[derive(Args, Debug)]
pub(crate) struct WatchArgs {
    /// File to watch.
    #[arg(requires = "output")]
    pub(crate) input: Option<PathBuf>,
    /// Directory receiving the mirrored copy.
    pub(crate) output: Option<PathBuf>,
    /// Use a saved path by name instead of INPUT and OUTPUT.
    #[arg(long, conflicts_with_all = ["input", "output"])]
    pub(crate) saved: Option<String>,
    /// Disable the progress bar for this session.
    #[arg(long)]
    pub(crate) no_progress: bool,
    /// Save the paths under this name once watching starts.
    #[arg(long, conflicts_with = "saved")]
    pub(crate) save_as: Option<String>,
    /// Print the session counters in Prometheus text format when watching stops.
    #[arg(long)]
    pub(crate) metrics: bool,
    /// Readiness probes before a change is skipped.
    #[arg(long, env = "MIRRORWATCH_MAX_ATTEMPTS", default_value_t = DEFAULT_MAX_ATTEMPTS)]
    pub(crate) max_attempts: u32,
    /// Milliseconds between readiness probes.
    #[arg(long, env = "MIRRORWATCH_RETRY_DELAY_MS", default_value_t = default_retry_delay_ms())]
    pub(crate) retry_delay_ms: u64,
    /// Bytes per chunk when copying with progress.
    #[arg(long, env = "MIRRORWATCH_CHUNK_SIZE", default_value_t = DEFAULT_CHUNK_SIZE)]
    pub(crate) chunk_size: usize,
}

#[derive(Args, Debug)]
pub(crate) struct PathAddArgs {
    /// Unique name for the entry.
    pub(crate) name: String,
    /// File to watch.
    pub(crate) input: PathBuf,
    /// Directory receiving the mirrored copy.
    pub(crate) output: PathBuf,
}

#[derive(Args, Debug)]
pub(crate) struct PathRemoveArgs {
    /// Index shown by `paths list`.
    pub(crate) index: usize,
}

#[derive(Args, Debug)]
pub(crate) struct SettingSetArgs {
    /// Setting name, e.g. `show_progress_bar`.
    pub(crate) key: String,
    /// New value.
    pub(crate) value: String,
}

fn default_retry_delay_ms() -> u64 {
    u64::try_from(DEFAULT_RETRY_DELAY.as_millis()).unwrap_or(u64::MAX)
}

const fn command_label(command: &Command) -> &'static str {
    match command {
        Command::Watch(_) => "watch",
        Command::Paths(PathsCommand::List) => "paths_list",
        Command::Paths(PathsCommand::Add(_)) => "paths_add",
        Command::Paths(PathsCommand::Remove(_)) => "paths_remove",
        Command::Settings(SettingsCommand::Show) => "settings_show",
        Command::Settings(SettingsCommand::Set(_)) => "settings_set",
    }
}
