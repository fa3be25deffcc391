//! Hepatica CLI - terminal dashboard for the liver prediction service

mod commands;
mod config;
mod dashboard;
mod logging;
mod routes;
mod state_dir;
mod view;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use commands::Commands;
use config::ClientConfig;
use hepatica_core::{FileSessionStorage, SessionStore};
use hepatica_http::{ApiClient, SessionEvent};
use state_dir::StateDir;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{Level, debug, error, info};

#[derive(Parser)]
#[command(name = "hepatica")]
#[command(about = "Terminal dashboard for the Hepatica liver prediction service")]
#[command(version)]
struct Cli {
    /// Set logging level
    #[arg(short = 'l', long, global = true, default_value = "warn")]
    log_level: LogLevel,

    /// State directory for the session, config and log files
    #[arg(short = 'd', long, global = true, env = "HEPATICA_STATE_DIR")]
    state_dir: Option<PathBuf>,

    /// Configuration file (defaults to <state dir>/config/config.toml)
    #[arg(short = 'c', long, global = true)]
    config: Option<PathBuf>,

    /// Override the API base URL
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Keep the session in memory only
    #[arg(long, global = true)]
    ephemeral: bool,

    /// Disable file logging (only log to stderr)
    #[arg(long, global = true)]
    no_file_log: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let state_dir = StateDir::resolve(cli.state_dir);

    let log_file = (!cli.no_file_log).then(|| state_dir.log_path());
    logging::init_logging(cli.log_level.into(), log_file.as_deref())?;

    let config_path = cli.config.unwrap_or_else(|| state_dir.config_path());
    let mut config = ClientConfig::load(Some(&config_path))?;
    if let Some(base_url) = cli.base_url {
        config.api.base_url = base_url;
    }
    debug!(base_url = %config.api.base_url, "Loaded configuration");

    let session = if cli.ephemeral {
        SessionStore::in_memory()
    } else {
        SessionStore::new(Arc::new(FileSessionStorage::new(state_dir.data_dir())))
    };
    let client = config.api.client_builder().session(Arc::new(session)).build()?;

    // Subscribe before any request so no invalidation is missed
    let mut events = client.subscribe_events();
    let result = cli.command.execute(&client, &mut std::io::stdout()).await;
    report_session_events(&mut events);

    match result {
        Ok(()) => {
            info!("Command completed successfully");
            Ok(())
        }
        Err(e) => {
            error!("Command failed: {e:#}");
            eprintln!("Error: {e:#}");
            std::process::exit(1);
        }
    }
}

/// Tell the user the session is gone; the terminal equivalent of the login redirect
fn report_session_events(events: &mut broadcast::Receiver<SessionEvent>) {
    while let Ok(event) = events.try_recv() {
        match event {
            SessionEvent::Invalidated { reason } => {
                info!(%reason, "Session invalidated");
                eprintln!("Your session has expired ({reason}). Run `hepatica login` to sign in again.");
            }
        }
    }
}

#[derive(Clone, Debug, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for Level {
    fn from(log_level: LogLevel) -> Self {
        match log_level {
            LogLevel::Error => Self::ERROR,
            LogLevel::Warn => Self::WARN,
            LogLevel::Info => Self::INFO,
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Trace => Self::TRACE,
        }
    }
}
