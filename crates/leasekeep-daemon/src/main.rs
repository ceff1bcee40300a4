//! leasekeepd - background lease daemon

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;

use leasekeep_core::daemon::{self, Daemon, Shutdown};
use leasekeep_core::{logging, DaemonConfig, FsRevoker, LogNotifier, SystemClock};

/// Tracks leased secrets and revokes them when they expire
#[derive(Parser, Debug)]
#[command(name = "leasekeepd")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to daemon.yaml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log filter, e.g. `info` or `leasekeep_core=debug`
    #[arg(long)]
    log_level: Option<String>,

    /// Append logs to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Log to stderr instead of the default log file
    #[arg(short, long)]
    foreground: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = args.config.clone().unwrap_or_else(DaemonConfig::default_path);
    let mut config = DaemonConfig::load(&config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;
    if let Some(level) = args.log_level {
        config.log_level = level;
    }
    if args.log_file.is_some() {
        config.log_file = args.log_file;
    }
    if config.log_file.is_none() && !args.foreground {
        config.log_file = Some(logging::default_log_path());
    }

    config.ensure_dirs().context("failed to create daemon directories")?;
    logging::init(&config.log_level, config.log_file.as_deref())
        .context("failed to initialise logging")?;

    tracing::info!(
        config = %config_path.display(),
        state = %config.state_path.display(),
        version = env!("CARGO_PKG_VERSION"),
        "Starting leasekeepd"
    );

    let daemon = Daemon::open(
        &config.state_path,
        Arc::new(SystemClock::new()),
        Arc::new(FsRevoker::new()),
        Arc::new(LogNotifier::new()),
    )
    .context("refusing to start")?;

    let shutdown = Shutdown::new();
    tokio::spawn(wait_for_signal(shutdown.clone()));

    daemon::run(Arc::new(daemon), &config, shutdown).await?;
    Ok(())
}

/// Trigger shutdown on SIGINT or SIGTERM
async fn wait_for_signal(shutdown: Shutdown) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to listen for Ctrl+C");
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
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received SIGINT, shutting down"),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }

    shutdown.trigger();
}
