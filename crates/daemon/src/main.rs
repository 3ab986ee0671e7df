// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Clodputer watcher daemon (clodputer-watchd)
//!
//! Long-lived background process that watches configured directories and
//! enqueues tasks on matching file events. Started and stopped by the
//! `clodputer watch` commands; not meant to be invoked directly.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use clodputer_adapters::pid_alive;
use clodputer_daemon::{watch_fingerprint, WatchService, WatcherError};
use clodputer_engine::{TaskDir, TaskSource};
use clodputer_storage::StateRoot;
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info, warn};

/// How often the supervising loop re-checks the task set.
const RELOAD_INTERVAL: Duration = Duration::from_secs(30);
/// Nap when there is nothing to watch or watches failed to start.
const IDLE_INTERVAL: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Some(arg) = std::env::args().nth(1) {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("clodputer-watchd {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" | "-h" => {
                println!("clodputer-watchd {}", env!("CARGO_PKG_VERSION"));
                println!("Clodputer file-watcher daemon.");
                println!();
                println!("Watches directories configured by file-watch tasks and enqueues");
                println!("them on matching events. Start it with `clodputer watch start`;");
                println!("it is not meant to be invoked directly.");
                return Ok(());
            }
            _ => {
                eprintln!("error: unexpected argument '{arg}'");
                eprintln!("Usage: clodputer-watchd [--help | --version]");
                std::process::exit(1);
            }
        }
    }

    let root = StateRoot::from_env();
    root.ensure()?;

    let _log_guard = setup_logging(&root)?;

    // Defensive: refuse to run next to a live sibling.
    let own_pid = std::process::id();
    if let Ok(content) = std::fs::read_to_string(root.watcher_pid_file()) {
        if let Ok(pid) = content.trim().parse::<u32>() {
            if pid != own_pid && pid_alive(pid) {
                eprintln!("watcher daemon already running (pid {pid})");
                std::process::exit(1);
            }
        }
    }
    std::fs::write(root.watcher_pid_file(), own_pid.to_string())?;

    info!(pid = own_pid, state_dir = %root.dir().display(), "watcher daemon starting");
    run_supervisor(&root).await?;

    // Clean exit: release the pid file if it is still ours.
    if let Ok(content) = std::fs::read_to_string(root.watcher_pid_file()) {
        if content.trim() == own_pid.to_string() {
            let _ = std::fs::remove_file(root.watcher_pid_file());
        }
    }
    info!("watcher daemon stopped");
    Ok(())
}

/// Load tasks, run watches, and restart them when the task set changes.
/// Returns when a termination signal arrives.
async fn run_supervisor(root: &StateRoot) -> Result<(), WatcherError> {
    let mut sigterm = signal(SignalKind::terminate()).map_err(WatcherError::Io)?;
    let mut sigint = signal(SignalKind::interrupt()).map_err(WatcherError::Io)?;
    let source = TaskDir::new(root);

    loop {
        let records = match source.load_all() {
            Ok(records) => records,
            Err(e) => {
                error!(error = %e, "failed to load task records");
                Vec::new()
            }
        };
        let fingerprint = watch_fingerprint(&records);

        let service = match WatchService::start(root, &records) {
            Ok(service) => service,
            Err(WatcherError::NoWatchTasks) => {
                info!("no file-watch tasks configured; napping");
                if nap_or_shutdown(&mut sigterm, &mut sigint, IDLE_INTERVAL).await {
                    return Ok(());
                }
                continue;
            }
            Err(e) => {
                warn!(error = %e, "could not start watches; retrying");
                if nap_or_shutdown(&mut sigterm, &mut sigint, IDLE_INTERVAL).await {
                    return Ok(());
                }
                continue;
            }
        };

        // Watch until shutdown or a configuration change.
        loop {
            tokio::select! {
                _ = sigterm.recv() => {
                    info!("received SIGTERM; stopping watches");
                    drop(service);
                    return Ok(());
                }
                _ = sigint.recv() => {
                    info!("received SIGINT; stopping watches");
                    drop(service);
                    return Ok(());
                }
                _ = tokio::time::sleep(RELOAD_INTERVAL) => {
                    let current = source.load_all().unwrap_or_default();
                    if watch_fingerprint(&current) != fingerprint {
                        info!("file-watch task set changed; restarting watches");
                        break;
                    }
                }
            }
        }
    }
}

/// Sleep, returning true if a termination signal cut the nap short.
async fn nap_or_shutdown(
    sigterm: &mut tokio::signal::unix::Signal,
    sigint: &mut tokio::signal::unix::Signal,
    duration: Duration,
) -> bool {
    tokio::select! {
        _ = sigterm.recv() => true,
        _ = sigint.recv() => true,
        _ = tokio::time::sleep(duration) => false,
    }
}

fn setup_logging(
    root: &StateRoot,
) -> Result<tracing_appender::non_blocking::WorkerGuard, std::io::Error> {
    use tracing_subscriber::EnvFilter;

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(root.watcher_log_file())?;
    let (writer, guard) = tracing_appender::non_blocking(log_file);
    let filter = EnvFilter::try_new(clodputer_adapters::env::log_filter())
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();
    Ok(guard)
}
