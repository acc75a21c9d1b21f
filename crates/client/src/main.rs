mod cli;
mod constants;
mod format;
mod logging;
mod options;
mod session;
mod shutdown;
mod ui;

use std::io::IsTerminal;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use nlsub_client_core::emails::{dedup_emails, parse_email_list};
use nlsub_client_core::settings::{ClientSettings, load_settings, save_settings, settings_path};
use nlsub_client_core::summary::summarize;
use nlsub_client_engine::{
    ControllerConfig, HttpJobService, JobService, RegistryMirror, StartRequest,
    start_controller_with,
};

use crate::cli::{Cli, Command, ConfigArgs, RunArgs, UrlsCommand};
use crate::constants::{EXIT_INTERRUPTED, HTTP_CONNECT_TIMEOUT_SECS};
use crate::format::{format_entry_line, format_finished_line, format_summary};
use crate::options::Options;
use crate::session::{SessionEnd, follow_run};
use crate::ui::Output;

fn build_service(opts: &Options) -> anyhow::Result<Arc<HttpJobService>> {
    let http = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(HTTP_CONNECT_TIMEOUT_SECS))
        .timeout(ControllerConfig::DEFAULT_REQUEST_TIMEOUT)
        .build()?;
    Ok(Arc::new(HttpJobService::with_client(
        http,
        opts.backend_url.clone(),
    )))
}

fn collect_emails(args: &RunArgs) -> anyhow::Result<Vec<String>> {
    let mut emails = args.emails.clone();
    if let Some(path) = &args.emails_file {
        let text = std::fs::read_to_string(path)
            .map_err(|err| anyhow::anyhow!("failed to read {}: {err}", path.display()))?;
        emails.extend(parse_email_list(&text));
    }
    Ok(dedup_emails(emails))
}

async fn follow(
    service: Arc<HttpJobService>,
    opts: &Options,
    tui: bool,
    run: Option<StartRequest>,
) -> anyhow::Result<()> {
    let handle = start_controller_with(service, opts.controller_config());
    let mut events = Some(handle.subscribe());

    match run {
        Some(request) => {
            let accepted = handle.start(request).await?;
            println!(
                "nlsub {} started {} tasks against {}",
                env!("CARGO_PKG_VERSION"),
                accepted.total_tasks,
                opts.backend_url
            );
        }
        None => {
            if !handle.attach().await? {
                println!("No run is active on {}.", opts.backend_url);
                events = None;
            }
        }
    }

    let Some(events) = events else {
        handle.shutdown().await?;
        return Ok(());
    };

    let out = Output::new(tui);
    let end = follow_run(&handle, events, &out).await;
    out.finish();

    match end {
        SessionEnd::Finished {
            summary,
            stop_requested,
            finished_at,
        } => {
            let started_at = handle.snapshot().started_at;
            println!(
                "{}",
                format_finished_line(&summary, stop_requested, started_at, finished_at)
            );
        }
        SessionEnd::Reset => eprintln!("Run state was reset."),
        SessionEnd::ControllerGone => eprintln!("Controller exited before the run finished."),
        SessionEnd::Interrupted => std::process::exit(EXIT_INTERRUPTED),
    }

    handle.shutdown().await
}

async fn run_command(
    args: RunArgs,
    opts: &Options,
    tui: bool,
    service: Arc<HttpJobService>,
) -> anyhow::Result<()> {
    let emails = collect_emails(&args)?;
    let remote = service.status().await.map_err(|err| {
        anyhow::anyhow!("job service at {} is not reachable: {err}", opts.backend_url)
    })?;
    if remote.is_running {
        anyhow::bail!("a run is already active on the service; use `nlsub watch` or `nlsub stop`");
    }
    let urls = if args.urls.is_empty() {
        let mut mirror = RegistryMirror::new(service.clone());
        mirror.refresh().await?;
        let urls = mirror.urls();
        if urls.is_empty() {
            anyhow::bail!("no --url given and the newsletter registry is empty");
        }
        urls
    } else {
        args.urls
    };
    let request = StartRequest {
        emails,
        urls,
        speed: args.speed.map(Into::into).or(opts.default_speed),
    };
    follow(service, opts, tui, Some(request)).await
}

async fn stop_command(service: Arc<HttpJobService>, opts: &Options) -> anyhow::Result<()> {
    let handle = start_controller_with(service, opts.controller_config());
    if handle.attach().await? {
        handle.stop().await?;
        println!("Cancellation requested; the service finishes in-flight work first.");
    } else {
        println!("No run is active.");
    }
    handle.shutdown().await
}

async fn reset_command(service: Arc<HttpJobService>, opts: &Options) -> anyhow::Result<()> {
    let handle = start_controller_with(service, opts.controller_config());
    handle.reset().await?;
    println!("Run state reset.");
    handle.shutdown().await
}

async fn status_command(service: Arc<HttpJobService>) -> anyhow::Result<()> {
    let snapshot = service.poll_snapshot().await?;
    let summary = summarize(&snapshot.tasks);
    let state = if snapshot.remote_active { "running" } else { "idle" };
    println!("{} is {state}", service.base_url());
    if summary.total > 0 {
        println!("{}", format_summary(&summary));
    }
    Ok(())
}

async fn urls_command(cmd: UrlsCommand, service: Arc<HttpJobService>) -> anyhow::Result<()> {
    let mut mirror = RegistryMirror::new(service);
    mirror.refresh().await?;
    match cmd {
        UrlsCommand::List => {}
        UrlsCommand::Add { url } => mirror.add(&url).await?,
        UrlsCommand::Remove { url } => {
            if !mirror.contains(&url) {
                log::warn!("{url} is not in the registry");
            }
            mirror.remove(&url).await?
        }
    }
    for entry in mirror.entries() {
        println!("{}", format_entry_line(entry));
    }
    println!("{} newsletter(s)", mirror.entries().len());
    Ok(())
}

fn config_command(args: ConfigArgs, mut settings: ClientSettings) -> anyhow::Result<()> {
    let changed =
        args.backend_url.is_some() || args.speed.is_some() || args.poll_interval_ms.is_some();
    if let Some(url) = args.backend_url {
        settings.backend_url = Some(url.to_string());
    }
    if let Some(speed) = args.speed {
        settings.speed = Some(speed.into());
    }
    if let Some(ms) = args.poll_interval_ms {
        settings.poll_interval_ms = Some(ms);
    }
    if changed {
        save_settings(&settings)?;
        println!("Saved {}", settings_path()?.display());
    }
    println!(
        "backend_url: {}",
        settings.backend_url.as_deref().unwrap_or("(default)")
    );
    println!(
        "speed: {}",
        settings
            .speed
            .map(|s| format!("{s:?}").to_lowercase())
            .unwrap_or_else(|| "(service default)".to_string())
    );
    println!(
        "poll_interval_ms: {}",
        settings
            .poll_interval_ms
            .map(|ms| ms.to_string())
            .unwrap_or_else(|| "(default)".to_string())
    );
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::initialize(cli.log_level);

    let settings = match load_settings() {
        Ok(Some(settings)) => settings,
        Ok(None) => ClientSettings::default(),
        Err(err) => {
            log::warn!("failed to read settings: {err:#}");
            ClientSettings::default()
        }
    };

    // Config must stay usable when the saved settings are what is broken.
    if let Command::Config(args) = &cli.command {
        return config_command(args.clone(), settings);
    }

    let opts = Options::resolve(&cli, &settings)?;
    let tui = !cli.no_tui && std::io::stdout().is_terminal();
    log::debug!("backend {} poll every {:?}", opts.backend_url, opts.poll_interval);

    match cli.command {
        Command::Config(_) => Ok(()),
        Command::Run(args) => run_command(args, &opts, tui, build_service(&opts)?).await,
        Command::Watch => follow(build_service(&opts)?, &opts, tui, None).await,
        Command::Stop => stop_command(build_service(&opts)?, &opts).await,
        Command::Reset => reset_command(build_service(&opts)?, &opts).await,
        Command::Status => status_command(build_service(&opts)?).await,
        Command::Urls(cmd) => urls_command(cmd, build_service(&opts)?).await,
    }
}
