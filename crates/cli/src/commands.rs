// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Command implementations. Output is plain text; anything richer belongs
//! to the dashboard tooling, not here.

use anyhow::{bail, Context};
use chrono::Utc;
use clodputer_core::Priority;
use clodputer_engine::{
    catch_up_missed, install_cron_jobs, is_cron_daemon_running, uninstall_cron_jobs,
    ExecutionResult, QueueManager, StatusSnapshot, TaskDir, TaskExecutor, TaskSource,
};
use clodputer_storage::{EventLog, StateRoot, TaskStateStore};
use serde_json::Map;
use std::time::Duration;

fn parse_priority(priority: &str) -> anyhow::Result<Priority> {
    match priority {
        "high" => Ok(Priority::High),
        "normal" => Ok(Priority::Normal),
        other => bail!("invalid priority '{other}' (expected 'high' or 'normal')"),
    }
}

pub async fn run(
    root: &StateRoot,
    task_name: &str,
    priority: &str,
    enqueue_only: bool,
) -> anyhow::Result<()> {
    let priority = parse_priority(priority)?;
    let source = TaskDir::new(root);
    // Fail fast on an unknown task before touching the queue.
    source
        .load(task_name)
        .with_context(|| format!("task '{task_name}' is not configured"))?;

    let mut queue = QueueManager::open(root)?;
    let mut metadata = Map::new();
    metadata.insert("manual".to_string(), serde_json::Value::Bool(true));
    let item = queue.enqueue(task_name, priority, Some(metadata), None, 0)?;
    println!(
        "Enqueued {task_name} ({}) with priority {}.",
        item.id,
        priority.as_str()
    );
    if enqueue_only {
        return Ok(());
    }

    let executor = TaskExecutor::new(root, source);
    let results = executor.process_queue(&mut queue).await?;
    match results.iter().find(|result| result.task_id == item.id) {
        Some(result) => print_result(result),
        None => println!("Task did not execute in this session."),
    }
    Ok(())
}

fn print_result(result: &ExecutionResult) {
    println!(
        "{}: {} in {:.2}s (exit {})",
        result.task_name,
        result.status.as_str(),
        result.duration_seconds,
        result
            .return_code
            .map(|code| code.to_string())
            .unwrap_or_else(|| "-".to_string()),
    );
    if let Some(ref error) = result.error {
        println!("  error: {error}");
    }
    if let Some(ref output) = result.output_json {
        println!("  output: {output}");
    }
}

pub fn queue_status(root: &StateRoot) -> anyhow::Result<()> {
    let status = match QueueManager::open(root) {
        Ok(queue) => queue.get_status(),
        // Another producer holds the lock; show the document read-only.
        Err(clodputer_engine::QueueError::LockHeld { pid }) => {
            println!("Queue is locked by pid {pid} (another producer is active).");
            let (doc, _) = clodputer_storage::load_or_archive::<clodputer_core::QueueDocument>(
                &root.queue_file(),
            )?;
            snapshot_of(doc)
        }
        Err(e) => return Err(e.into()),
    };
    match status.running {
        Some(ref running) => println!(
            "Running: {} ({}) pid {} since {}",
            running.name, running.id, running.pid, running.started_at
        ),
        None => println!("Running: none"),
    }
    println!(
        "Queued: {} ({} high priority)",
        status.queued_total, status.queued_high_priority
    );
    for item in &status.queued {
        let delay = item
            .not_before
            .as_deref()
            .map(|at| format!(" not before {at}"))
            .unwrap_or_default();
        println!(
            "  {} {} [{}] attempt {}{}",
            item.id,
            item.name,
            item.priority.as_str(),
            item.attempt,
            delay
        );
    }
    if !status.failed_recent.is_empty() {
        println!("Recent failures:");
        for entry in &status.failed_recent {
            println!("  {} {} at {}", entry.id, entry.name, entry.failed_at);
        }
    }
    Ok(())
}

fn snapshot_of(doc: clodputer_core::QueueDocument) -> StatusSnapshot {
    StatusSnapshot {
        queued_total: doc.queued.len(),
        queued_high_priority: doc
            .queued
            .iter()
            .filter(|item| item.priority == Priority::High)
            .count(),
        running: doc.running,
        queued: doc.queued,
        completed_recent: doc.completed,
        failed_recent: doc.failed,
        metrics: Vec::new(),
    }
}

pub fn queue_clear(root: &StateRoot) -> anyhow::Result<()> {
    let mut queue = QueueManager::open(root)?;
    queue.clear_queue()?;
    println!("Cleared queued tasks.");
    Ok(())
}

pub fn queue_cancel(root: &StateRoot, id: &str) -> anyhow::Result<()> {
    let mut queue = QueueManager::open(root)?;
    if queue.cancel(id)? {
        println!("Cancelled {id}.");
    } else {
        println!("No queued item with id {id}.");
    }
    Ok(())
}

pub async fn cron_install(root: &StateRoot) -> anyhow::Result<()> {
    let tasks = TaskDir::new(root).load_all()?;
    let outcome = install_cron_jobs(&tasks, root).await?;
    if outcome.section_written {
        println!(
            "Installed {} scheduled task(s). Crontab backed up to {}.",
            outcome.installed,
            outcome.backup.display()
        );
    } else {
        println!("No scheduled tasks; removed any existing block.");
    }
    Ok(())
}

pub async fn cron_uninstall(root: &StateRoot) -> anyhow::Result<()> {
    let outcome = uninstall_cron_jobs(root).await?;
    if outcome.removed {
        println!("Removed the Clodputer cron block.");
    } else {
        println!("No Clodputer cron block present.");
    }
    Ok(())
}

pub async fn cron_status(root: &StateRoot) -> anyhow::Result<()> {
    let present = clodputer_engine::cron_section_present().await;
    println!(
        "Cron block: {}",
        if present { "installed" } else { "absent" }
    );
    println!(
        "Cron daemon: {}",
        if is_cron_daemon_running() {
            "running"
        } else {
            "not detected"
        }
    );
    let states = TaskStateStore::new(root).load_all()?;
    for (name, state) in states {
        if let Some(next) = state.next_expected {
            println!("  {name}: next expected {next}");
        }
    }
    Ok(())
}

pub fn watch_start(root: &StateRoot) -> anyhow::Result<()> {
    let pid = clodputer_daemon::start_daemon(root)?;
    println!("Watcher daemon started (pid {pid}).");
    Ok(())
}

pub fn watch_stop(root: &StateRoot) -> anyhow::Result<()> {
    if clodputer_daemon::stop_daemon(root, Duration::from_secs(5))? {
        println!("Watcher daemon stopped.");
    } else {
        println!("Watcher daemon is not running.");
    }
    Ok(())
}

pub fn watch_status(root: &StateRoot) -> anyhow::Result<()> {
    let status = clodputer_daemon::watcher_status(root);
    if status.running {
        println!("Watcher daemon running (pid {}).", status.pid.unwrap_or(0));
    } else {
        println!("Watcher daemon not running.");
    }
    println!("Log file: {}", status.log_file.display());
    Ok(())
}

pub fn catch_up(root: &StateRoot) -> anyhow::Result<()> {
    let tasks = TaskDir::new(root).load_all()?;
    let mut queue = QueueManager::open(root)?;
    let task_states = TaskStateStore::new(root);
    let missed = catch_up_missed(&mut queue, &tasks, &task_states, Utc::now())?;
    if missed.is_empty() {
        println!("No missed scheduled runs.");
    } else {
        for run in &missed {
            println!("Enqueued {} (missed {})", run.task_name, run.missed_at);
        }
    }
    Ok(())
}

pub fn logs(root: &StateRoot, tail: usize) -> anyhow::Result<()> {
    let events = EventLog::new(root).tail(tail)?;
    if events.is_empty() {
        println!("No log entries yet.");
        return Ok(());
    }
    for event in events {
        println!("{event}");
    }
    Ok(())
}

#[cfg(test)]
#[path = "commands_tests.rs"]
mod tests;
