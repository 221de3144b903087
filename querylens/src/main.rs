//! querylens - live monitor for a single distributed query
//!
//! Polls the coordinator for one query, redraws a text dashboard after each
//! poll and exits once the query reaches its final state.
//!
//! Uses XDG Base Directory specification for file locations:
//! - Logs: $XDG_STATE_HOME/querylens/querylens.log (~/.local/state/querylens/querylens.log)
//! - Config: $XDG_CONFIG_HOME/querylens/config.toml (~/.config/querylens/config.toml)

mod render;

use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{ArgAction, Parser};
use querylens_core::{
    Config, CoordinatorClient, QueryMonitor, QueryPoller, SnapshotSource, TaskFilter,
};
use tokio::sync::mpsc;

use crate::render::{render_dashboard, render_footer};

/// Clears the terminal and homes the cursor
const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

#[derive(Parser)]
#[command(name = "querylens")]
#[command(about = "Live monitor for a query running on a distributed query coordinator")]
#[command(version)]
struct Args {
    /// Query id to monitor
    query_id: String,

    /// Coordinator base URL (overrides coordinator.base_url)
    #[arg(long)]
    server: Option<String>,

    /// Poll interval in milliseconds (overrides monitor.refresh_interval_ms)
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Task table filter: none, all, planned, running, finished, failed
    #[arg(long, default_value = "none")]
    tasks: TaskFilter,

    /// Fetch once, print the dashboard and exit
    #[arg(long)]
    once: bool,

    /// Config file to use instead of the XDG default
    #[arg(long)]
    config: Option<PathBuf>,

    /// Verbose logging (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .context("failed to load configuration")?;

    if let Some(server) = &args.server {
        config.coordinator.base_url = server.clone();
    }
    if let Some(interval_ms) = args.interval_ms {
        config.monitor.refresh_interval_ms = interval_ms;
    }
    match args.verbose {
        0 => {}
        1 => config.logging.level = "debug".to_string(),
        _ => config.logging.level = "trace".to_string(),
    }
    config.validate().context("invalid configuration")?;

    let _log_guard =
        querylens_core::logging::init(&config.logging).context("failed to initialize logging")?;

    tracing::info!(
        query_id = %args.query_id,
        server = %config.coordinator.base_url,
        "querylens starting"
    );

    let client = Arc::new(
        CoordinatorClient::new(&config.coordinator).context("failed to create HTTP client")?,
    );

    if args.once {
        return run_once(&args, &config, client.as_ref()).await;
    }

    run_live(&args, &config, client).await
}

/// Single fetch; any fetch failure is an error exit.
async fn run_once(args: &Args, config: &Config, client: &CoordinatorClient) -> Result<()> {
    let snapshot = client
        .fetch(&args.query_id)
        .await
        .with_context(|| format!("failed to fetch query {}", args.query_id))?;

    let mut monitor = QueryMonitor::new(&args.query_id, &config.monitor);
    monitor.record_snapshot(snapshot, Utc::now());

    print!("{}", render_dashboard(&monitor, args.tasks, Utc::now()));
    std::io::stdout().flush().context("failed to write to stdout")?;
    Ok(())
}

/// Poll until the query finishes, the user quits, or ctrl-c.
async fn run_live(args: &Args, config: &Config, client: Arc<CoordinatorClient>) -> Result<()> {
    let mut poller = QueryPoller::new(&args.query_id, client, &config.monitor);
    let mut updates = poller.subscribe();
    poller.start();

    let mut commands = spawn_stdin_reader();
    let mut stdin_open = true;
    let mut filter = args.tasks;

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                draw(&poller, filter)?;
                if poller.monitor().is_terminated() {
                    break;
                }
            }
            line = commands.recv(), if stdin_open => {
                match line {
                    Some(command) => {
                        if !handle_command(command.trim(), &poller, &mut filter) {
                            break;
                        }
                        draw(&poller, filter)?;
                    }
                    None => stdin_open = false,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
                break;
            }
        }
    }

    poller.stop();
    tracing::info!(query_id = %args.query_id, "querylens exiting");
    Ok(())
}

/// Forward stdin lines from a detached thread.
///
/// The thread stays blocked in `read` after the dashboard exits; it is not
/// joined, so it never holds up process shutdown.
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::debug!(error = %e, "Stopped reading stdin");
                    break;
                }
            }
        }
    });
    rx
}

/// Apply one typed command. Returns false when the user asked to quit.
fn handle_command(command: &str, poller: &QueryPoller, filter: &mut TaskFilter) -> bool {
    match command {
        "q" | "quit" => return false,
        "r" => poller.refresh_now(),
        "s" => {
            let mut monitor = poller.monitor_mut();
            let enabled = !monitor.stage_auto_refresh();
            monitor.set_stage_auto_refresh(enabled);
        }
        "t" => {
            let mut monitor = poller.monitor_mut();
            let enabled = !monitor.task_auto_refresh();
            monitor.set_task_auto_refresh(enabled);
        }
        other => match other.parse::<TaskFilter>() {
            Ok(next) => *filter = next,
            Err(e) => tracing::debug!(error = %e, "Ignoring unknown command"),
        },
    }
    true
}

fn draw(poller: &QueryPoller, filter: TaskFilter) -> Result<()> {
    let monitor = poller.monitor();
    let mut stdout = std::io::stdout().lock();
    write!(
        stdout,
        "{}{}\n{}\n",
        CLEAR_SCREEN,
        render_dashboard(&monitor, filter, Utc::now()),
        render_footer(&monitor)
    )
    .context("failed to write to stdout")?;
    stdout.flush().context("failed to write to stdout")?;
    Ok(())
}
