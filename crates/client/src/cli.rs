use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use reqwest::Url;

use nlsub_client_core::settings::Speed;

pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:8000";

fn parse_log_level(input: &str) -> Result<log::LevelFilter, String> {
    input
        .trim()
        .parse()
        .map_err(|_| format!("invalid log level {input:?} (expected off|error|warn|info|debug|trace)"))
}

fn parse_poll_interval_ms(input: &str) -> Result<u64, String> {
    let value: u64 = input
        .trim()
        .parse()
        .map_err(|_| format!("invalid poll interval: {input:?}"))?;
    if value == 0 {
        return Err("poll interval must be >= 1 ms".to_string());
    }
    Ok(value)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SpeedArg {
    /// One worker with long delays between sites.
    Slow,
    /// Several workers with short delays.
    Fast,
}

impl From<SpeedArg> for Speed {
    fn from(value: SpeedArg) -> Self {
        match value {
            SpeedArg::Slow => Speed::Slow,
            SpeedArg::Fast => Speed::Fast,
        }
    }
}

#[derive(Debug, Clone, Parser)]
#[command(name = "nlsub", version, about = "Drive and follow newsletter subscription runs")]
pub struct Cli {
    /// Job service base URL (defaults to the settings file, then http://127.0.0.1:8000).
    #[arg(long, env = "NLSUB_BACKEND_URL", global = true)]
    pub backend_url: Option<Url>,

    /// Poll cadence in milliseconds while a run is active.
    #[arg(long, env = "NLSUB_POLL_INTERVAL_MS", global = true, value_parser = parse_poll_interval_ms)]
    pub poll_interval_ms: Option<u64>,

    #[arg(long, env = "NLSUB_NO_TUI", default_value_t = false, global = true)]
    pub no_tui: bool,

    #[arg(
        long,
        env = "NLSUB_LOG",
        default_value = "warn",
        global = true,
        value_parser = parse_log_level
    )]
    pub log_level: log::LevelFilter,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Start a run and follow it until the service reports it finished.
    Run(RunArgs),
    /// Follow a run that is already active on the service.
    Watch,
    /// Ask the service to cancel the current run.
    Stop,
    /// Reset the service's run state.
    Reset,
    /// Show whether the service is reachable and running.
    Status,
    /// Inspect or edit the newsletter registry.
    #[command(subcommand)]
    Urls(UrlsCommand),
    /// Show or update the saved client settings.
    Config(ConfigArgs),
}

#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    /// Email address to subscribe (repeatable).
    #[arg(short = 'e', long = "email")]
    pub emails: Vec<String>,

    /// File with email addresses, one per line.
    #[arg(long)]
    pub emails_file: Option<PathBuf>,

    /// Target newsletter URL (repeatable). Defaults to the whole registry.
    #[arg(short = 'u', long = "url")]
    pub urls: Vec<String>,

    #[arg(long, value_enum)]
    pub speed: Option<SpeedArg>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum UrlsCommand {
    /// List the registry.
    List,
    /// Add a URL to the registry.
    Add { url: String },
    /// Remove a URL from the registry.
    Remove { url: String },
}

#[derive(Debug, Clone, Args)]
pub struct ConfigArgs {
    /// Persist the job service base URL.
    #[arg(long = "set-backend-url")]
    pub backend_url: Option<Url>,

    /// Persist the default speed.
    #[arg(long = "set-speed", value_enum)]
    pub speed: Option<SpeedArg>,

    /// Persist the poll cadence in milliseconds.
    #[arg(long = "set-poll-interval-ms", value_parser = parse_poll_interval_ms)]
    pub poll_interval_ms: Option<u64>,
}
