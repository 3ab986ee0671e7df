// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process inspection and tree cleanup.
//!
//! Cleanup is best-effort by contract: failures to signal individual
//! processes (already exited, permission denied) are logged and swallowed.
//! The call itself never fails.

use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid as NixPid;
use std::collections::HashSet;
use std::time::Duration;
use sysinfo::{Pid, ProcessStatus, ProcessesToUpdate, System};
use tracing::{debug, info, warn};

/// Agent CLI helper processes are spawned as siblings with this fragment in
/// their executable name; the final sweep force-kills any left behind.
pub const ORPHAN_NAME_FRAGMENT: &str = "mcp__";

/// How long terminated processes get to exit voluntarily.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(5);

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Disjoint pid sets describing one cleanup pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct CleanupReport {
    /// Exited within the grace period after the termination signal.
    pub terminated: Vec<u32>,
    /// Survived the grace period and were force-killed.
    pub killed: Vec<u32>,
    /// Name-matched orphans swept in the final pass.
    pub orphaned: Vec<u32>,
}

impl CleanupReport {
    pub fn total(&self) -> usize {
        self.terminated.len() + self.killed.len() + self.orphaned.len()
    }
}

/// Whether a pid refers to a live process (zombies count as live; they still
/// hold their pid).
pub fn pid_alive(pid: u32) -> bool {
    if pid == 0 {
        return false;
    }
    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    match kill(NixPid::from_raw(raw), None) {
        Ok(()) => true,
        // Exists but owned by someone else.
        Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}

/// Whether any process on the host matches one of `names` exactly
/// (case-insensitive). Used to detect the host cron daemon.
pub fn process_running_by_name(names: &[&str]) -> bool {
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::All, true);
    let wanted: HashSet<String> = names.iter().map(|n| n.to_lowercase()).collect();
    system
        .processes()
        .values()
        .any(|process| wanted.contains(&process.name().to_string_lossy().to_lowercase()))
}

/// Terminate the process tree rooted at `root_pid`, then sweep orphans whose
/// executable name contains `orphan_fragment`.
pub async fn cleanup_process_tree(
    root_pid: u32,
    grace_period: Duration,
    orphan_fragment: &str,
) -> CleanupReport {
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::All, true);

    let targets = tree_members(&system, root_pid);
    let mut signalled: Vec<u32> = Vec::new();
    for &pid in &targets {
        match send_signal(pid, Signal::SIGTERM) {
            Ok(()) => signalled.push(pid),
            Err(e) => debug!(pid, error = %e, "terminate skipped"),
        }
    }

    if !signalled.is_empty() {
        wait_for_exit(&signalled, grace_period).await;
    }

    // Whatever survived the grace period gets the hard signal.
    let mut killed: Vec<u32> = Vec::new();
    for &pid in &signalled {
        if pid_running_not_zombie(pid) {
            match send_signal(pid, Signal::SIGKILL) {
                Ok(()) => killed.push(pid),
                Err(e) => warn!(pid, error = %e, "force-kill failed"),
            }
        }
    }
    let killed_set: HashSet<u32> = killed.iter().copied().collect();
    let terminated: Vec<u32> = signalled
        .into_iter()
        .filter(|pid| !killed_set.contains(pid))
        .collect();

    let accounted: HashSet<u32> = terminated.iter().chain(killed.iter()).copied().collect();
    let orphaned = sweep_orphans(orphan_fragment, &accounted);

    let report = CleanupReport {
        terminated,
        killed,
        orphaned,
    };
    if report.total() > 0 {
        info!(
            terminated = report.terminated.len(),
            killed = report.killed.len(),
            orphaned = report.orphaned.len(),
            root_pid,
            "process tree cleanup complete"
        );
    } else {
        debug!(root_pid, "no processes required cleanup");
    }
    report
}

/// The root plus its full descendant tree, root first.
fn tree_members(system: &System, root_pid: u32) -> Vec<u32> {
    let root = Pid::from_u32(root_pid);
    if system.process(root).is_none() {
        return Vec::new();
    }

    let mut members = vec![root_pid];
    let mut frontier = vec![root];
    while let Some(parent) = frontier.pop() {
        for (pid, process) in system.processes() {
            if process.parent() == Some(parent) {
                members.push(pid.as_u32());
                frontier.push(*pid);
            }
        }
    }
    members
}

fn send_signal(pid: u32, signal: Signal) -> Result<(), Errno> {
    let raw = i32::try_from(pid).map_err(|_| Errno::ESRCH)?;
    kill(NixPid::from_raw(raw), signal)
}

async fn wait_for_exit(pids: &[u32], grace_period: Duration) {
    let deadline = tokio::time::Instant::now() + grace_period;
    loop {
        if pids.iter().all(|&pid| !pid_running_not_zombie(pid)) {
            return;
        }
        if tokio::time::Instant::now() >= deadline {
            return;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

fn pid_running_not_zombie(pid: u32) -> bool {
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::Some(&[Pid::from_u32(pid)]), true);
    match system.process(Pid::from_u32(pid)) {
        Some(process) => process.status() != ProcessStatus::Zombie,
        None => false,
    }
}

fn sweep_orphans(fragment: &str, accounted: &HashSet<u32>) -> Vec<u32> {
    if fragment.is_empty() {
        return Vec::new();
    }
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::All, true);

    let mut swept = Vec::new();
    for (pid, process) in system.processes() {
        let pid = pid.as_u32();
        if accounted.contains(&pid) {
            continue;
        }
        if process.name().to_string_lossy().contains(fragment) {
            match send_signal(pid, Signal::SIGKILL) {
                Ok(()) => swept.push(pid),
                Err(e) => debug!(pid, error = %e, "orphan sweep skipped"),
            }
        }
    }
    swept
}

#[cfg(test)]
#[path = "process_tests.rs"]
mod tests;
