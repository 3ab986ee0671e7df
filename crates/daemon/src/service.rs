// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The watch service: one non-recursive directory watch per file-watch task.
//!
//! Handlers run on the event source's worker thread. A matching event is
//! debounced, then enqueued through a short-lived queue manager; the queue
//! lock serialises handlers against every other producer.

use clodputer_core::{FileWatchTrigger, Priority, TaskRecord, WatchEventKind};
use clodputer_engine::{QueueError, QueueManager};
use clodputer_storage::StateRoot;
use notify::event::{CreateKind, ModifyKind, RemoveKind};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::control::WatcherError;
use crate::debounce::Debouncer;

/// How long an event handler keeps retrying a busy queue lock.
const ENQUEUE_RETRY_BUDGET: Duration = Duration::from_secs(5);
const ENQUEUE_RETRY_INTERVAL: Duration = Duration::from_millis(100);

/// Filter for one task's watch: directory, glob, event kind.
#[derive(Debug, Clone)]
pub struct WatchFilter {
    pub watch_dir: PathBuf,
    pub pattern: glob::Pattern,
    pub event: WatchEventKind,
}

impl WatchFilter {
    pub fn from_trigger(trigger: &FileWatchTrigger) -> Result<Self, WatcherError> {
        let pattern = glob::Pattern::new(&trigger.pattern).map_err(|e| {
            WatcherError::InvalidPattern {
                pattern: trigger.pattern.clone(),
                detail: e.to_string(),
            }
        })?;
        Ok(Self {
            watch_dir: expand_tilde_path(&trigger.path),
            pattern,
            event: trigger.event,
        })
    }

    /// Whether an event of `kind` at `path` passes this filter. Only direct
    /// children of the watched directory qualify.
    pub fn accepts(&self, kind: WatchEventKind, path: &Path) -> bool {
        if kind != self.event {
            return false;
        }
        if path.parent() != Some(self.watch_dir.as_path()) {
            return false;
        }
        path.file_name()
            .map(|name| self.pattern.matches(&name.to_string_lossy()))
            .unwrap_or(false)
    }
}

/// `~/x` → `<home>/x`.
fn expand_tilde_path(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    PathBuf::from(path)
}

/// Map a notify event to the trigger vocabulary. Events outside it (access,
/// metadata, rename bookkeeping) are ignored.
pub fn classify_event(kind: &EventKind) -> Option<WatchEventKind> {
    match kind {
        EventKind::Create(CreateKind::File) | EventKind::Create(CreateKind::Any) => {
            Some(WatchEventKind::Created)
        }
        EventKind::Modify(ModifyKind::Data(_)) | EventKind::Modify(ModifyKind::Any) => {
            Some(WatchEventKind::Modified)
        }
        EventKind::Remove(RemoveKind::File) | EventKind::Remove(RemoveKind::Any) => {
            Some(WatchEventKind::Deleted)
        }
        _ => None,
    }
}

/// Fingerprint of the file-watch task set, used by the supervising loop to
/// detect configuration changes.
pub fn watch_fingerprint(records: &[TaskRecord]) -> String {
    let entries: Vec<Value> = records
        .iter()
        .filter_map(|record| {
            record.file_watch().map(|trigger| {
                serde_json::json!({
                    "name": record.name,
                    "priority": record.priority,
                    "trigger": trigger,
                })
            })
        })
        .collect();
    serde_json::to_string(&entries).unwrap_or_default()
}

struct WatchEntry {
    // Watches are dropped (and stopped) with the service.
    _watcher: RecommendedWatcher,
    task_name: String,
}

/// Running set of directory watches. Dropping the service stops them all.
pub struct WatchService {
    entries: Vec<WatchEntry>,
}

impl WatchService {
    /// Start watches for every enabled file-watch task. Missing directories
    /// are logged and skipped; zero valid watches is an error so the
    /// supervising loop can back off and retry.
    pub fn start(root: &StateRoot, records: &[TaskRecord]) -> Result<Self, WatcherError> {
        let watch_tasks: Vec<(&TaskRecord, &FileWatchTrigger)> = records
            .iter()
            .filter_map(|record| record.file_watch().map(|trigger| (record, trigger)))
            .collect();
        if watch_tasks.is_empty() {
            return Err(WatcherError::NoWatchTasks);
        }

        let debouncer = Arc::new(Debouncer::new());
        let mut entries = Vec::new();

        for (record, trigger) in watch_tasks {
            let filter = WatchFilter::from_trigger(trigger)?;
            if !filter.watch_dir.exists() {
                warn!(
                    task = %record.name,
                    path = %filter.watch_dir.display(),
                    "watch path does not exist; skipping"
                );
                continue;
            }

            let handler = EventHandler {
                root: root.clone(),
                task_name: record.name.clone(),
                priority: record.priority,
                debounce: Duration::from_millis(trigger.debounce),
                filter: filter.clone(),
                debouncer: Arc::clone(&debouncer),
            };
            let mut watcher =
                notify::recommended_watcher(move |event| handler.handle(event))
                    .map_err(WatcherError::Notify)?;
            watcher
                .watch(&filter.watch_dir, RecursiveMode::NonRecursive)
                .map_err(WatcherError::Notify)?;

            info!(
                task = %record.name,
                path = %filter.watch_dir.display(),
                pattern = %trigger.pattern,
                event = trigger.event.as_str(),
                debounce_ms = trigger.debounce,
                "watching directory"
            );
            entries.push(WatchEntry {
                _watcher: watcher,
                task_name: record.name.clone(),
            });
        }

        if entries.is_empty() {
            return Err(WatcherError::NoValidWatchPaths);
        }
        info!(watches = entries.len(), "file watcher service started");
        Ok(Self { entries })
    }

    pub fn watch_count(&self) -> usize {
        self.entries.len()
    }

    pub fn task_names(&self) -> Vec<&str> {
        self.entries
            .iter()
            .map(|entry| entry.task_name.as_str())
            .collect()
    }
}

struct EventHandler {
    root: StateRoot,
    task_name: String,
    priority: Priority,
    debounce: Duration,
    filter: WatchFilter,
    debouncer: Arc<Debouncer>,
}

impl EventHandler {
    fn handle(&self, event: Result<notify::Event, notify::Error>) {
        let event = match event {
            Ok(event) => event,
            Err(e) => {
                warn!(task = %self.task_name, error = %e, "watch error");
                return;
            }
        };
        let Some(kind) = classify_event(&event.kind) else {
            return;
        };
        for path in &event.paths {
            if !self.filter.accepts(kind, path) {
                continue;
            }
            if !self.debouncer.should_emit(&self.task_name, path, self.debounce) {
                continue;
            }
            self.enqueue(kind, path);
        }
    }

    fn enqueue(&self, kind: WatchEventKind, path: &Path) {
        let mut metadata = Map::new();
        metadata.insert("trigger".to_string(), Value::from("file_watch"));
        metadata.insert("event".to_string(), Value::from(kind.as_str()));
        metadata.insert(
            "path".to_string(),
            Value::from(path.to_string_lossy().into_owned()),
        );

        match self.enqueue_with_retry(metadata) {
            Ok(item_id) => {
                info!(
                    task = %self.task_name,
                    event = kind.as_str(),
                    path = %path.display(),
                    id = %item_id,
                    "enqueued task for file event"
                );
            }
            Err(e) => {
                warn!(task = %self.task_name, error = %e, "failed to enqueue file event");
            }
        }
    }

    /// The queue lock may be held by the executor or another producer;
    /// keep retrying for a bounded budget before giving up.
    fn enqueue_with_retry(&self, metadata: Map<String, Value>) -> Result<String, QueueError> {
        let deadline = std::time::Instant::now() + ENQUEUE_RETRY_BUDGET;
        loop {
            match QueueManager::open(&self.root) {
                Ok(mut queue) => {
                    let item =
                        queue.enqueue(&self.task_name, self.priority, Some(metadata), None, 0)?;
                    return Ok(item.id);
                }
                Err(QueueError::LockHeld { .. }) if std::time::Instant::now() < deadline => {
                    std::thread::sleep(ENQUEUE_RETRY_INTERVAL);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
#[path = "service_tests.rs"]
mod tests;
