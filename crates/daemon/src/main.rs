// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Byte-Range Lock Daemon (brld)
//!
//! Hosts one lock coordinator behind a Unix socket.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod lifecycle;
mod server;

use std::path::PathBuf;
use std::sync::Arc;

use brl_adapters::{KernelLockAdapter, NoOpKernelAdapter, TracedKernelAdapter};
use brl_daemon::config::{Config, KernelMode};
use brl_engine::LockCoordinator;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info, warn};

use crate::lifecycle::{DaemonState, LifecycleError};
use crate::server::Server;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse arguments
    let config_path = Config::locate(std::env::args().nth(1).map(PathBuf::from));
    let config = Config::load(&config_path)?;

    // Write startup marker to log (before tracing setup, so the CLI can find it)
    write_startup_marker(&config)?;

    let log_guard = setup_logging(&config)?;

    info!("Starting brld with config {}", config_path.display());

    let daemon = match lifecycle::startup(&config) {
        Ok(d) => d,
        Err(e) => {
            // Write error synchronously (tracing is non-blocking and may not flush in time)
            write_startup_error(&config, &e);
            error!("Failed to start daemon: {}", e);
            drop(log_guard);
            return Err(e.into());
        }
    };

    match config.kernel {
        KernelMode::None => serve(daemon, TracedKernelAdapter::new(NoOpKernelAdapter::new())).await,
        KernelMode::Ofd => serve_ofd(daemon).await,
    }
}

#[cfg(any(target_os = "linux", target_os = "android"))]
async fn serve_ofd(daemon: DaemonState) -> Result<(), Box<dyn std::error::Error>> {
    use brl_adapters::{DirHandleProvider, OfdKernelAdapter};

    let handles = DirHandleProvider::new(daemon.config.export_root.clone());
    serve(daemon, TracedKernelAdapter::new(OfdKernelAdapter::new(handles))).await
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
async fn serve_ofd(daemon: DaemonState) -> Result<(), Box<dyn std::error::Error>> {
    warn!("OFD locks are unavailable on this platform, keeping locks in the daemon only");
    serve(daemon, TracedKernelAdapter::new(NoOpKernelAdapter::new())).await
}

async fn serve<K: KernelLockAdapter>(
    mut daemon: DaemonState,
    kernel: K,
) -> Result<(), Box<dyn std::error::Error>> {
    let server = Arc::new(
        Server::new(LockCoordinator::new(kernel), daemon.config.wait_timeout)
            .with_retention(daemon.config.wait_retention),
    );
    let shutdown = server.shutdown_requested().clone();

    // Set up signal handlers
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    info!(
        "Daemon ready, listening on {}",
        daemon.config.socket_path.display()
    );

    // Signal ready for parent process (e.g., systemd, CLI waiting for startup)
    println!("READY");

    loop {
        tokio::select! {
            result = daemon.listener.accept() => {
                match result {
                    Ok((stream, _)) => {
                        let server = Arc::clone(&server);
                        tokio::spawn(async move {
                            if let Err(e) = server::handle_connection(server, stream).await {
                                error!("Error handling connection: {}", e);
                            }
                        });
                    }
                    Err(e) => {
                        error!("Error accepting connection: {}", e);
                    }
                }
            }

            _ = shutdown.cancelled() => {
                info!("Shutdown requested via IPC, shutting down...");
                break;
            }

            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down...");
                break;
            }

            _ = sigint.recv() => {
                info!("Received SIGINT, shutting down...");
                break;
            }
        }
    }

    let cancelled = server.coordinator().shutdown();
    if cancelled > 0 {
        warn!(cancelled, "cancelled parked requests at shutdown");
    }
    daemon.shutdown();

    info!("Daemon stopped");
    Ok(())
}

/// Startup marker prefix written to log before anything else.
/// The CLI uses this to find where the current startup attempt begins.
/// Full format: "--- brld: starting (pid: 12345) ---"
pub const STARTUP_MARKER_PREFIX: &str = "--- brld: starting (pid: ";

/// Write startup marker to log file (appends to existing log)
fn write_startup_marker(config: &Config) -> Result<(), LifecycleError> {
    use std::io::Write;

    if let Some(parent) = config.log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_path)?;
    writeln!(file, "{}{}) ---", STARTUP_MARKER_PREFIX, std::process::id())?;

    Ok(())
}

/// Write startup error synchronously to log file.
fn write_startup_error(config: &Config, error: &LifecycleError) {
    use std::io::Write;

    let Ok(mut file) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_path)
    else {
        return;
    };
    let _ = writeln!(file, "ERROR Failed to start daemon: {}", error);
}

fn setup_logging(
    config: &Config,
) -> Result<tracing_appender::non_blocking::WorkerGuard, LifecycleError> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let bad_path = || LifecycleError::BadLogPath(config.log_path.clone());
    let dir = config.log_path.parent().ok_or_else(bad_path)?;
    let file_name = config.log_path.file_name().ok_or_else(bad_path)?;
    std::fs::create_dir_all(dir)?;

    let file_appender = tracing_appender::rolling::never(dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // RUST_LOG wins over the configured filter
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking))
        .init();

    Ok(guard)
}
