//! Logwarden Monitor - game-server log tailer.
//!
//! # Commands
//!
//! - `logwarden run`: poll the watched logs until interrupted
//! - `logwarden backfill <file>`: record stats for a whole file once
//! - `logwarden status`: print the persisted state as JSON
//!
//! # Environment Variables
//!
//! See the [`config`](logwarden_monitor::config) module for available
//! configuration options.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use tokio::signal;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use logwarden_monitor::cursor::CursorRecord;
use logwarden_monitor::day_state::DayCounters;
use logwarden_monitor::engine::StatePaths;
use logwarden_monitor::kill_log::KillRecord;
use logwarden_monitor::{
    fixed_offset, statefile, Clock, Config, Engine, EngineDeps, LocalFileAccessor, LogSink,
    NotificationSink, NullStatStore, SystemClock, WebhookSink,
};

/// Logwarden Monitor - game-server log tailer.
///
/// Tails game-server logs, classifies events, attributes kills and posts
/// batched notifications grouped by day.
#[derive(Parser, Debug)]
#[command(name = "logwarden")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "\
ENVIRONMENT VARIABLES:
    LOGWARDEN_LOG_DIR        Directory holding the watched logs (required)
    LOGWARDEN_LOG_FILES      Comma-separated watched files (default: game.log,admin.log)
    LOGWARDEN_STATE_DIR      State directory (default: ~/.logwarden)
    LOGWARDEN_WEBHOOK_URL    Webhook for notifications (default: log only)
    LOGWARDEN_TZ_OFFSET      Offset of log timestamps (default: +00:00)

EXAMPLES:
    # Start tailing
    export LOGWARDEN_LOG_DIR=/srv/game/logs
    logwarden run

    # Record stats from an old log once
    logwarden backfill game.log.1
")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

/// CLI subcommands.
#[derive(Subcommand, Debug)]
enum Command {
    /// Poll the watched logs until Ctrl+C or SIGTERM.
    Run,

    /// Read a file in full and record its stats without notifying.
    ///
    /// The path is relative to LOGWARDEN_LOG_DIR. Cursors and day counters
    /// are left untouched.
    Backfill {
        /// File to read.
        file: String,
    },

    /// Print persisted cursors, day counters and kill log size.
    Status,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging();

    let config = Config::from_env().context("Failed to load configuration")?;

    match cli.command {
        Command::Status => {
            let status = read_status(&config).context("Failed to read state")?;
            println!("{}", serde_json::to_string_pretty(&status)?);
            Ok(())
        }
        command => {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .context("Failed to create tokio runtime")?;

            match command {
                Command::Backfill { file } => runtime.block_on(run_backfill(config, file)),
                _ => runtime.block_on(run_monitor(config)),
            }
        }
    }
}

/// Builds an engine from configuration.
fn build_engine(config: &Config) -> logwarden_monitor::Result<Engine> {
    let sink: Arc<dyn NotificationSink> = match &config.webhook_url {
        Some(url) => Arc::new(WebhookSink::new(url.clone(), config.source_id.clone())?),
        None => Arc::new(LogSink),
    };
    std::fs::create_dir_all(&config.state_dir)?;

    let deps = EngineDeps {
        accessor: Arc::new(LocalFileAccessor::new(config.log_dir.clone())),
        sink,
        stats: Arc::new(NullStatStore),
        clock: Arc::new(SystemClock::new(config.tz_offset)),
        timestamp: fixed_offset(config.tz_offset),
    };
    Ok(Engine::new(config.engine_config(), deps))
}

/// Runs the poll loop.
async fn run_monitor(config: Config) -> Result<()> {
    info!(
        log_dir = %config.log_dir.display(),
        files = ?config.log_files,
        state_dir = %config.state_dir.display(),
        source_id = %config.source_id,
        webhook = config.webhook_url.is_some(),
        "Configuration loaded"
    );

    let clock = SystemClock::new(config.tz_offset);
    let mut engine = build_engine(&config).context("Failed to initialize engine")?;
    engine.start().await;

    let mut ticker = tokio::time::interval(config.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let shutdown = wait_for_shutdown();
    tokio::pin!(shutdown);

    info!("Monitor running. Press Ctrl+C to stop.");

    loop {
        let deadline = engine.next_deadline();
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown signal received");
                break;
            }

            _ = ticker.tick() => {
                engine.poll().await;
                engine.fire_due().await;
            }

            _ = sleep_until(deadline, clock.now()) => {
                engine.fire_due().await;
            }
        }
    }

    info!("Shutting down...");
    let delivery = engine.stop().await;
    if delivery.dropped > 0 {
        error!(dropped = delivery.dropped, "Some notifications could not be delivered");
    }

    info!("Monitor stopped");
    Ok(())
}

/// Runs a one-off backfill of `file`.
async fn run_backfill(config: Config, file: String) -> Result<()> {
    let mut engine = build_engine(&config).context("Failed to initialize engine")?;
    let report = engine
        .backfill(&file)
        .await
        .with_context(|| format!("Failed to backfill {file}"))?;

    println!(
        "{file}: {} lines, {} events, {} attributed kills",
        report.lines, report.events, report.kills
    );
    Ok(())
}

/// Collects the persisted state into one JSON document.
fn read_status(config: &Config) -> logwarden_monitor::Result<serde_json::Value> {
    let paths = StatePaths::in_dir(&config.state_dir);
    let cursors: Option<CursorRecord> = statefile::read(&paths.cursors)?;
    let day: Option<DayCounters> = statefile::read(&paths.day_counters)?;
    let kills: Option<Vec<KillRecord>> = statefile::read(&paths.kill_log)?;

    Ok(serde_json::json!({
        "stateDir": config.state_dir.display().to_string(),
        "cursors": serde_json::to_value(cursors)?,
        "dayCounters": serde_json::to_value(day)?,
        "killLog": {
            "entries": kills.as_ref().map_or(0, Vec::len),
            "latest": serde_json::to_value(kills.as_ref().and_then(|k| k.last()))?,
        },
    }))
}

/// Sleeps until `deadline`, or forever when there is none.
async fn sleep_until(deadline: Option<DateTime<Utc>>, now: DateTime<Utc>) {
    match deadline {
        Some(deadline) => {
            let wait = (deadline - now).to_std().unwrap_or(Duration::ZERO);
            tokio::time::sleep(wait).await;
        }
        None => std::future::pending::<()>().await,
    }
}

/// Initializes the tracing subscriber for logging.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .init();
}

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
