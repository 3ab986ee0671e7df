// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle: start, stop, status.
//!
//! `start_daemon` launches the `clodputer-watchd` binary detached and
//! records its pid in `watcher.pid`; `stop_daemon` signals it and polls for
//! exit. The pid file is defensively removed whenever its pid is dead.

use clodputer_adapters::pid_alive;
use clodputer_storage::StateRoot;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid as NixPid;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{info, warn};

const STOP_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum WatcherError {
    #[error("watcher daemon already running (pid {pid})")]
    AlreadyRunning { pid: u32 },
    #[error("failed to start watcher daemon: {0}")]
    StartFailed(std::io::Error),
    #[error("no file-watch tasks configured")]
    NoWatchTasks,
    #[error("no watch directories exist")]
    NoValidWatchPaths,
    #[error("invalid watch pattern '{pattern}': {detail}")]
    InvalidPattern { pattern: String, detail: String },
    #[error("watch backend error: {0}")]
    Notify(notify::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct WatcherStatus {
    pub running: bool,
    pub pid: Option<u32>,
    pub log_file: PathBuf,
}

fn read_pid(root: &StateRoot) -> Option<u32> {
    std::fs::read_to_string(root.watcher_pid_file())
        .ok()
        .and_then(|content| content.trim().parse().ok())
}

pub fn is_daemon_running(root: &StateRoot) -> bool {
    read_pid(root).is_some_and(pid_alive)
}

pub fn watcher_status(root: &StateRoot) -> WatcherStatus {
    WatcherStatus {
        running: is_daemon_running(root),
        pid: read_pid(root),
        log_file: root.watcher_log_file(),
    }
}

/// Start the daemon in the background and record its pid.
///
/// Refuses while the pid file names a live process; a dead pid is removed
/// first.
pub fn start_daemon(root: &StateRoot) -> Result<u32, WatcherError> {
    if let Some(pid) = read_pid(root) {
        if pid_alive(pid) {
            return Err(WatcherError::AlreadyRunning { pid });
        }
        warn!(pid, "removing stale watcher pid file");
        let _ = std::fs::remove_file(root.watcher_pid_file());
    }

    root.ensure()?;
    let binary = find_watchd_binary();
    let child = Command::new(&binary)
        .env("CLODPUTER_STATE_DIR", root.dir())
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(WatcherError::StartFailed)?;

    let pid = child.id();
    std::fs::write(root.watcher_pid_file(), pid.to_string())?;
    info!(pid, binary = %binary.display(), "watcher daemon started");
    Ok(pid)
}

/// Stop the daemon: SIGTERM, poll liveness up to `timeout`, remove the pid
/// file. Returns whether a pid file existed.
pub fn stop_daemon(root: &StateRoot, timeout: Duration) -> Result<bool, WatcherError> {
    let Some(pid) = read_pid(root) else {
        return Ok(false);
    };

    if let Ok(raw) = i32::try_from(pid) {
        // Already-dead daemons are fine; anything else is best-effort.
        let _ = kill(NixPid::from_raw(raw), Signal::SIGTERM);
    }

    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if !pid_alive(pid) {
            break;
        }
        std::thread::sleep(STOP_POLL_INTERVAL);
    }
    if pid_alive(pid) {
        warn!(pid, "watcher daemon did not exit within timeout");
    }

    let _ = std::fs::remove_file(root.watcher_pid_file());
    info!(pid, "watcher daemon stopped");
    Ok(true)
}

/// `CLODPUTER_WATCHD_BINARY` > sibling of the current executable > `$PATH`.
fn find_watchd_binary() -> PathBuf {
    if let Some(path) = clodputer_adapters::env::watchd_binary() {
        return PathBuf::from(path);
    }
    if let Ok(current) = std::env::current_exe() {
        if let Some(dir) = current.parent() {
            let sibling = dir.join("clodputer-watchd");
            if sibling.exists() {
                return sibling;
            }
        }
    }
    PathBuf::from("clodputer-watchd")
}

#[cfg(test)]
#[path = "control_tests.rs"]
mod tests;
