// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single-writer queue manager.
//!
//! One manager instance holds `clodputer.lock` (its own pid) for its entire
//! lifetime; every mutation is re-sorted and persisted atomically before the
//! call returns. Dispatch respects priority, not-before delays, and a
//! CPU/memory gate sampled from a pre-primed probe.

use chrono::Duration as ChronoDuration;
use clodputer_core::time_fmt::format_utc_seconds;
use clodputer_core::{
    Clock, CompletedEntry, FailedEntry, IdGen, LogEvent, Priority, QueueDocument, QueueItem,
    RunningTask, SystemClock, UuidIdGen,
};
use clodputer_storage::{
    load_or_archive, write_atomic, EventLog, MetricsStore, StateRoot, StoreError,
    TaskMetricsSummary,
};
use serde_json::{Map, Value};
use std::fs;
use std::time::{Duration, Instant};
use sysinfo::{MemoryRefreshKind, System};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Resource notices are emitted at most this often.
const RESOURCE_NOTICE_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue already locked by pid {pid}")]
    LockHeld { pid: u32 },
    #[error("task {0} not found in queue")]
    NotQueued(String),
    #[error("task {0} is not the currently running task")]
    NotRunning(String),
    #[error("a task is already running")]
    AlreadyRunning,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Queue tuning knobs supplied by the configuration subsystem.
#[derive(Debug, Clone)]
pub struct QueueSettings {
    pub max_parallel: u32,
    pub cpu_percent: f32,
    pub memory_percent: f32,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            max_parallel: 1,
            cpu_percent: 85.0,
            memory_percent: 85.0,
        }
    }
}

/// Instantaneous host utilisation.
#[derive(Debug, Clone, Copy)]
pub struct ResourceSample {
    pub cpu_percent: f32,
    pub memory_percent: f32,
}

/// Non-blocking utilisation sampler.
pub trait ResourceProbe: Send {
    fn sample(&mut self) -> ResourceSample;
}

/// Probe backed by sysinfo. CPU usage is primed at construction so the first
/// real sample reflects utilisation since then rather than blocking.
pub struct SysinfoProbe {
    system: System,
}

impl SysinfoProbe {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_cpu_usage();
        system.refresh_memory_specifics(MemoryRefreshKind::nothing().with_ram());
        Self { system }
    }
}

impl Default for SysinfoProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceProbe for SysinfoProbe {
    fn sample(&mut self) -> ResourceSample {
        self.system.refresh_cpu_usage();
        self.system
            .refresh_memory_specifics(MemoryRefreshKind::nothing().with_ram());
        let total = self.system.total_memory();
        let memory_percent = if total == 0 {
            0.0
        } else {
            (self.system.used_memory() as f64 / total as f64 * 100.0) as f32
        };
        ResourceSample {
            cpu_percent: self.system.global_cpu_usage(),
            memory_percent,
        }
    }
}

/// Current running item plus the sorted queue and recent outcomes.
#[derive(Debug, Clone, serde::Serialize)]
pub struct StatusSnapshot {
    pub running: Option<RunningTask>,
    pub queued: Vec<QueueItem>,
    pub queued_total: usize,
    pub queued_high_priority: usize,
    pub completed_recent: Vec<CompletedEntry>,
    pub failed_recent: Vec<FailedEntry>,
    pub metrics: Vec<TaskMetricsSummary>,
}

/// Lock-file diagnostics without acquisition.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct LockStatus {
    pub locked: bool,
    pub pid: Option<u32>,
    pub stale: bool,
}

pub struct QueueManager<C: Clock = SystemClock, G: IdGen = UuidIdGen> {
    root: StateRoot,
    doc: QueueDocument,
    event_log: EventLog,
    metrics: MetricsStore,
    clock: C,
    ids: G,
    settings: QueueSettings,
    probe: Box<dyn ResourceProbe>,
    lock_held: bool,
    last_resource_notice: Option<Instant>,
}

impl QueueManager<SystemClock, UuidIdGen> {
    /// Open the queue with production defaults, acquiring the lock.
    pub fn open(root: &StateRoot) -> Result<Self, QueueError> {
        Self::open_with(
            root,
            QueueSettings::default(),
            SystemClock,
            UuidIdGen,
            Box::new(SysinfoProbe::new()),
        )
    }
}

impl<C: Clock, G: IdGen> QueueManager<C, G> {
    pub fn open_with(
        root: &StateRoot,
        settings: QueueSettings,
        clock: C,
        ids: G,
        probe: Box<dyn ResourceProbe>,
    ) -> Result<Self, QueueError> {
        root.ensure()?;
        let event_log = EventLog::new(root);

        acquire_lock(root, &event_log)?;

        // From here on the lock is ours; release it on any startup failure.
        let (doc, archived) = match load_or_archive::<QueueDocument>(&root.queue_file()) {
            Ok(loaded) => loaded,
            Err(e) => {
                let _ = fs::remove_file(root.lock_file());
                return Err(e.into());
            }
        };
        if let Some(archived_to) = archived {
            let _ = event_log.append(&LogEvent::QueueCorruptArchived {
                archived_to: archived_to.display().to_string(),
            });
        }

        if settings.max_parallel > 1 {
            info!(
                max_parallel = settings.max_parallel,
                "max_parallel requested but the executor runs strictly one task at a time"
            );
        }

        let mut manager = Self {
            metrics: MetricsStore::new(root),
            root: root.clone(),
            doc,
            event_log,
            clock,
            ids,
            settings,
            probe,
            lock_held: true,
            last_resource_notice: None,
        };
        manager.doc.sort_queued();
        Ok(manager)
    }

    pub fn event_log(&self) -> &EventLog {
        &self.event_log
    }

    /// Append a new item and persist. `not_before` is RFC3339 UTC.
    pub fn enqueue(
        &mut self,
        task_name: &str,
        priority: Priority,
        metadata: Option<Map<String, Value>>,
        not_before: Option<String>,
        attempt: u32,
    ) -> Result<QueueItem, QueueError> {
        let metadata = metadata.unwrap_or_default();
        // A recorded attempt in metadata wins over the argument, so requeued
        // items keep their count across producers.
        let attempt = metadata
            .get("attempt")
            .and_then(Value::as_u64)
            .map(|n| n as u32)
            .unwrap_or(attempt);

        let item = QueueItem {
            id: self.ids.next(),
            name: task_name.to_string(),
            priority,
            enqueued_at: format_utc_seconds(self.clock.now_utc()),
            not_before,
            attempt,
            metadata,
        };
        self.doc.queued.push(item.clone());
        self.doc.sort_queued();
        self.persist()?;

        let _ = self.event_log.append(&LogEvent::TaskEnqueued {
            task_id: item.id.clone(),
            task_name: item.name.clone(),
            priority: item.priority.as_str().to_string(),
        });
        info!(task = %item.name, id = %item.id, "enqueued task");
        Ok(item)
    }

    /// First ready item, provided the resource gate admits execution.
    pub fn get_next_ready(&mut self) -> Result<Option<QueueItem>, QueueError> {
        let now = self.clock.now_utc();
        let Some(item) = self.doc.first_ready(now).cloned() else {
            return Ok(None);
        };
        if !self.resources_available()? {
            return Ok(None);
        }
        Ok(Some(item))
    }

    /// Move the identified item out of `queued` and into `running`.
    pub fn mark_running(&mut self, task_id: &str, pid: u32) -> Result<RunningTask, QueueError> {
        if self.doc.running.is_some() {
            return Err(QueueError::AlreadyRunning);
        }
        let index = self
            .doc
            .position_of(task_id)
            .ok_or_else(|| QueueError::NotQueued(task_id.to_string()))?;
        let item = self.doc.queued.remove(index);
        let running = RunningTask {
            id: item.id,
            name: item.name,
            pid,
            started_at: format_utc_seconds(self.clock.now_utc()),
        };
        self.doc.running = Some(running.clone());
        self.persist()?;
        info!(task = %running.name, id = %running.id, pid, "task marked running");
        Ok(running)
    }

    pub fn mark_completed(&mut self, task_id: &str, result: Value) -> Result<(), QueueError> {
        let running = self.take_running(task_id)?;
        self.doc.push_completed(CompletedEntry {
            id: running.id,
            name: running.name,
            completed_at: format_utc_seconds(self.clock.now_utc()),
            result,
        });
        self.persist()
    }

    pub fn mark_failed(&mut self, task_id: &str, error: Value) -> Result<(), QueueError> {
        let running = self.take_running(task_id)?;
        self.doc.push_failed(FailedEntry {
            id: running.id,
            name: running.name,
            failed_at: format_utc_seconds(self.clock.now_utc()),
            error,
            attempt: None,
        });
        self.persist()
    }

    /// Record a failure for an item that never ran (missing or disabled
    /// record). Does not touch `running`.
    pub fn record_failure(&mut self, item: &QueueItem, error: Value) -> Result<(), QueueError> {
        self.doc.push_failed(FailedEntry {
            id: item.id.clone(),
            name: item.name.clone(),
            failed_at: format_utc_seconds(self.clock.now_utc()),
            error,
            attempt: Some(item.attempt),
        });
        self.persist()
    }

    /// Re-insert an item for retry with an incremented attempt and a
    /// not-before delay.
    pub fn requeue_with_delay(
        &mut self,
        mut item: QueueItem,
        delay_seconds: u64,
    ) -> Result<(), QueueError> {
        item.attempt += 1;
        let not_before =
            self.clock.now_utc() + ChronoDuration::seconds(delay_seconds.min(i64::MAX as u64) as i64);
        item.not_before = Some(format_utc_seconds(not_before));
        item.metadata
            .insert("attempt".to_string(), Value::from(item.attempt));
        self.doc.running = None;

        let event = LogEvent::RetryScheduled {
            task_id: item.id.clone(),
            task_name: item.name.clone(),
            attempt: item.attempt,
            delay_seconds,
            not_before: format_utc_seconds(not_before),
        };
        info!(
            task = %item.name,
            id = %item.id,
            attempt = item.attempt,
            delay_seconds,
            "scheduled retry"
        );
        self.doc.queued.push(item);
        self.doc.sort_queued();
        self.persist()?;
        let _ = self.event_log.append(&event);
        Ok(())
    }

    /// Remove a queued item. Idempotent; returns whether anything was
    /// removed. The running task cannot be cancelled here.
    pub fn cancel(&mut self, task_id: &str) -> Result<bool, QueueError> {
        let Some(index) = self.doc.position_of(task_id) else {
            return Ok(false);
        };
        let item = self.doc.queued.remove(index);
        self.persist()?;
        info!(task = %item.name, id = %item.id, "cancelled queued task");
        Ok(true)
    }

    /// Drop all queued items; `running` is untouched.
    pub fn clear_queue(&mut self) -> Result<(), QueueError> {
        self.doc.queued.clear();
        self.persist()?;
        info!("cleared queued tasks");
        Ok(())
    }

    pub fn get_status(&self) -> StatusSnapshot {
        StatusSnapshot {
            running: self.doc.running.clone(),
            queued: self.doc.queued.clone(),
            queued_total: self.doc.queued.len(),
            queued_high_priority: self
                .doc
                .queued
                .iter()
                .filter(|item| item.priority == Priority::High)
                .count(),
            completed_recent: self.doc.completed.clone(),
            failed_recent: self.doc.failed.clone(),
            metrics: self.metrics.summary().unwrap_or_default(),
        }
    }

    /// Check invariants without mutating.
    pub fn validate_state(&self) -> (bool, Vec<String>) {
        let errors = self.doc.validate();
        (errors.is_empty(), errors)
    }

    /// Release the lock early. Also runs on drop.
    pub fn release(&mut self) {
        if self.lock_held {
            if let Err(e) = fs::remove_file(self.root.lock_file()) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(error = %e, "failed to remove queue lock file");
                }
            }
            self.lock_held = false;
        }
    }

    fn take_running(&mut self, task_id: &str) -> Result<RunningTask, QueueError> {
        match self.doc.running.take() {
            Some(running) if running.id == task_id => Ok(running),
            other => {
                self.doc.running = other;
                Err(QueueError::NotRunning(task_id.to_string()))
            }
        }
    }

    fn resources_available(&mut self) -> Result<bool, QueueError> {
        let sample = self.probe.sample();
        let over = sample.cpu_percent > self.settings.cpu_percent
            || sample.memory_percent > self.settings.memory_percent;
        if !over {
            return Ok(true);
        }

        let now = self.clock.now();
        let due = match self.last_resource_notice {
            Some(last) => now.duration_since(last) > RESOURCE_NOTICE_INTERVAL,
            None => true,
        };
        if due {
            info!(
                cpu = sample.cpu_percent,
                memory = sample.memory_percent,
                "resource thresholds exceeded; deferring execution"
            );
            let _ = self.event_log.append(&LogEvent::ResourcesExceeded {
                cpu_percent: sample.cpu_percent,
                memory_percent: sample.memory_percent,
            });
            self.last_resource_notice = Some(now);
        }
        Ok(false)
    }

    fn persist(&mut self) -> Result<(), QueueError> {
        write_atomic(&self.root.queue_file(), &self.doc)?;
        debug!(path = %self.root.queue_file().display(), "persisted queue state");
        Ok(())
    }
}

impl<C: Clock, G: IdGen> Drop for QueueManager<C, G> {
    fn drop(&mut self) {
        self.release();
    }
}

fn acquire_lock(root: &StateRoot, event_log: &EventLog) -> Result<(), QueueError> {
    let lock_file = root.lock_file();
    if lock_file.exists() {
        let recorded = fs::read_to_string(&lock_file)
            .ok()
            .and_then(|content| content.trim().parse::<u32>().ok());
        match recorded {
            Some(pid) if clodputer_adapters::pid_alive(pid) => {
                return Err(QueueError::LockHeld { pid });
            }
            other => {
                warn!(path = %lock_file.display(), pid = ?other, "removing stale lock file");
                let _ = fs::remove_file(&lock_file);
                let _ = event_log.append(&LogEvent::StaleLockReclaimed {
                    pid: other.unwrap_or(0),
                });
            }
        }
    }
    fs::write(&lock_file, std::process::id().to_string())?;
    Ok(())
}

/// Report the lock file without acquiring anything.
pub fn lockfile_status(root: &StateRoot) -> LockStatus {
    let lock_file = root.lock_file();
    if !lock_file.exists() {
        return LockStatus {
            locked: false,
            pid: None,
            stale: false,
        };
    }
    match fs::read_to_string(&lock_file)
        .ok()
        .and_then(|content| content.trim().parse::<u32>().ok())
    {
        Some(pid) => LockStatus {
            locked: true,
            pid: Some(pid),
            stale: !clodputer_adapters::pid_alive(pid),
        },
        None => LockStatus {
            locked: true,
            pid: None,
            stale: true,
        },
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
