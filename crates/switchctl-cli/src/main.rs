//! switchctl — switch application versions across a fleet.
//!
//! ```text
//! switchctl -a foo:1.2.3,bar:4.5.6 -e staging
//! ```
//!
//! Loads every requested application (resolve instances, connect, read
//! the current version, prefetch the new one), prints the plan, asks the
//! operator to confirm, then switches. Exit status is 0 only if at least
//! one application loaded and no switch failed.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use colored::Colorize;
use switchctl_core::{ApplicationRequest, Config};
use switchctl_remote::{SshConfig, SshExecutor};
use switchctl_resolve::{ConfigResolver, SystemResolver};
use switchctl_rollout::{DEFAULT_PORT, DEFAULT_WORKERS, Orchestrator, RolloutContext};
use tracing::instrument::WithSubscriber;
use tracing::{info, warn};

mod logging;
mod progress;
mod report;

use progress::ProgressEvents;

#[derive(Parser, Debug)]
#[command(
    name = "switchctl",
    about = "Switch application versions across a fleet",
    version
)]
struct Cli {
    /// Application to switch, as <name>:<version>. Repeat the flag or
    /// separate pairs with commas.
    #[arg(
        short,
        long = "application",
        value_name = "NAME:VERSION",
        required = true,
        value_delimiter = ','
    )]
    applications: Vec<ApplicationRequest>,

    /// Environment to switch in.
    #[arg(short, long, default_value = "production")]
    environment: String,

    /// Log at debug level.
    #[arg(short, long)]
    debug: bool,

    /// Ask the agents to only report what they would do.
    #[arg(short = 'n', long)]
    dryrun: bool,

    /// Applications processed concurrently.
    #[arg(short, long, default_value_t = DEFAULT_WORKERS, value_parser = parse_workers)]
    workers: usize,

    /// Log file (appended).
    #[arg(short, long, default_value = logging::DEFAULT_LOGFILE)]
    logfile: PathBuf,

    /// Config file. Searched in the working directory and the user config
    /// directory when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Switch without asking for confirmation.
    #[arg(short, long)]
    yes: bool,

    /// Remote user. Defaults to the invoking user.
    #[arg(short, long)]
    user: Option<String>,

    /// Remote ssh port.
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,
}

fn parse_workers(value: &str) -> Result<usize, String> {
    match value.parse::<usize>() {
        Ok(0) => Err("must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

fn current_user() -> Option<String> {
    ["USER", "LOGNAME"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|name| !name.is_empty())
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let dispatch = logging::file_dispatch(&cli.logfile, cli.debug)?;

    let code = run(cli).with_subscriber(dispatch).await?;
    Ok(ExitCode::from(code))
}

async fn run(cli: Cli) -> anyhow::Result<u8> {
    info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = %cli.environment,
        applications = %display_requests(&cli.applications),
        dryrun = cli.dryrun,
        "switchctl starting"
    );

    let config = Config::load(cli.config.as_deref()).context("loading configuration")?;
    let username = cli.user.clone().or_else(current_user).unwrap_or_default();
    if username.is_empty() {
        warn!("no remote user given and none found in the environment, leaving it to ssh");
    }

    let executor = SshExecutor::new(SshConfig::default()).context("preparing ssh transport")?;
    let events = Arc::new(ProgressEvents::new());
    let resolver = ConfigResolver::new(Arc::new(config), Arc::new(SystemResolver));
    let ctx = RolloutContext::new(resolver, Arc::new(executor), cli.environment.clone())
        .with_dryrun(cli.dryrun)
        .with_username(username)
        .with_port(cli.port)
        .with_events(events.clone());
    let mut orchestrator = Orchestrator::new(ctx, cli.workers);

    events.start_loading(cli.applications.len());
    let loaded = orchestrator.load_all(&cli.applications).await;
    events.finish_loading();
    loaded?;

    print!("{}", report::render_plan(&orchestrator));

    if orchestrator.successful_applications().is_empty() {
        println!("All applications failed.");
        orchestrator.close_all().await;
        return Ok(orchestrator.exit_code());
    }

    if !cli.yes && !confirm().await? {
        info!("switch declined by operator");
        println!("Nothing switched.");
        orchestrator.close_all().await;
        return Ok(0);
    }

    let switched = orchestrator.switch_all().await;
    orchestrator.close_all().await;
    switched?;

    print!("{}", report::render_result(&orchestrator));
    let code = orchestrator.exit_code();
    info!(exit_code = code, "switchctl finished");
    Ok(code)
}

fn display_requests(requests: &[ApplicationRequest]) -> String {
    requests
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// Ask the operator to type `ok`.
async fn confirm() -> anyhow::Result<bool> {
    let answer = tokio::task::spawn_blocking(|| {
        dialoguer::Input::<String>::new()
            .with_prompt(
                "please enter 'ok' to proceed (<control>+c or <enter> for exit)"
                    .red()
                    .to_string(),
            )
            .allow_empty(true)
            .interact_text()
    })
    .await??;

    Ok(answer.trim() == "ok")
}
