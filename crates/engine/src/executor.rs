// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task executor: spawn the agent CLI, supervise it to completion or
//! timeout, classify the outcome, and record everything.
//!
//! Execution is strictly sequential per instance; concurrent instances are
//! prevented by the queue lock. Spawn failure is the only outcome surfaced
//! as an error rather than recorded in the failed ring.

use clodputer_adapters::{
    build_command, cleanup_process_tree, extract_json, resolve_agent_bin, CleanupReport,
    OutputParseError, DEFAULT_GRACE_PERIOD, ORPHAN_NAME_FRAGMENT,
};
use clodputer_core::time_fmt::format_utc_seconds;
use clodputer_core::{
    Clock, IdGen, LogEvent, Priority, QueueItem, SystemClock, TaskRecord, UuidIdGen,
};
use clodputer_storage::{
    EnvStore, EventLog, MetricsStore, ReportWriter, StateRoot, StoreError, TaskStateStore,
};
use serde_json::{json, Map, Value};
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::{error, info, warn};

use crate::catch_up::next_expected_run;
use crate::queue::{QueueError, QueueManager};
use crate::tasks::{TaskSource, TaskSourceError};

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("task record unavailable: {0}")]
    ConfigMissing(#[from] TaskSourceError),
    #[error("failed to start agent CLI '{binary}': {source}")]
    SpawnFailed {
        binary: String,
        source: std::io::Error,
    },
    #[error("error while waiting for agent CLI: {0}")]
    Wait(std::io::Error),
    #[error(transparent)]
    Queue(#[from] QueueError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Success,
    Failure,
    Timeout,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Success => "success",
            ExecutionStatus::Failure => "failure",
            ExecutionStatus::Timeout => "timeout",
        }
    }
}

/// Everything observed about one run.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ExecutionResult {
    pub task_id: String,
    pub task_name: String,
    pub status: ExecutionStatus,
    pub return_code: Option<i32>,
    pub duration_seconds: f64,
    pub stdout: String,
    pub stderr: String,
    pub cleanup: CleanupReport,
    pub output_json: Option<Value>,
    pub output_parse_error: Option<String>,
    pub error: Option<String>,
}

impl ExecutionResult {
    fn report_value(&self) -> Value {
        json!({
            "task_id": self.task_id,
            "task_name": self.task_name,
            "status": self.status.as_str(),
            "return_code": self.return_code,
            "duration": self.duration_seconds,
            "output_json": self.output_json,
            "output_parse_error": self.output_parse_error,
            "error": self.error,
            "stderr": head(&self.stderr, 2000),
            "cleanup": self.cleanup,
        })
    }
}

pub struct TaskExecutor<S: TaskSource, C: Clock = SystemClock> {
    source: S,
    clock: C,
    event_log: EventLog,
    metrics: MetricsStore,
    task_states: TaskStateStore,
    reports: ReportWriter,
    env_store: EnvStore,
}

impl<S: TaskSource> TaskExecutor<S, SystemClock> {
    pub fn new(root: &StateRoot, source: S) -> Self {
        Self::with_clock(root, source, SystemClock)
    }
}

impl<S: TaskSource, C: Clock> TaskExecutor<S, C> {
    pub fn with_clock(root: &StateRoot, source: S, clock: C) -> Self {
        Self {
            event_log: EventLog::new(root),
            metrics: MetricsStore::new(root),
            task_states: TaskStateStore::new(root),
            reports: ReportWriter::new(root),
            env_store: EnvStore::new(root),
            source,
            clock,
        }
    }

    /// Run one task outside the queue document (manual `run <task>`).
    /// The run is still logged, metered, and reported.
    pub async fn run_by_name(&self, task_name: &str) -> Result<ExecutionResult, ExecutionError> {
        let record = self.source.load(task_name)?;
        let item = QueueItem {
            id: format!("manual-{}", UuidIdGen.next()),
            name: record.name.clone(),
            priority: record.priority,
            enqueued_at: format_utc_seconds(self.clock.now_utc()),
            not_before: None,
            attempt: 0,
            metadata: Map::new(),
        };
        self.execute(&record, item, None::<&mut QueueManager>).await
    }

    /// Dispatch the next ready queue item, if any.
    ///
    /// Items whose record is missing or disabled are cancelled and recorded
    /// as failed without spawning anything.
    pub async fn process_queue_once(
        &self,
        queue: &mut QueueManager<impl Clock, impl IdGen>,
    ) -> Result<Option<ExecutionResult>, ExecutionError> {
        let Some(item) = queue.get_next_ready()? else {
            return Ok(None);
        };

        let record = match self.source.load(&item.name) {
            Ok(record) => record,
            Err(e) => {
                error!(task = %item.name, error = %e, "failed to load task record");
                if queue.cancel(&item.id)? {
                    let payload = json!({"error": "config_error", "details": e.to_string()});
                    queue.record_failure(&item, payload.clone())?;
                    let _ = self.event_log.append(&LogEvent::TaskFailed {
                        task_id: item.id.clone(),
                        task_name: item.name.clone(),
                        error: payload,
                        metadata: stage_metadata("load"),
                    });
                }
                return Ok(None);
            }
        };

        if !record.enabled {
            warn!(task = %record.name, "task disabled; skipping");
            if queue.cancel(&item.id)? {
                let payload = json!({"error": "task_disabled"});
                queue.record_failure(&item, payload.clone())?;
                let _ = self.event_log.append(&LogEvent::TaskFailed {
                    task_id: item.id.clone(),
                    task_name: item.name.clone(),
                    error: payload,
                    metadata: stage_metadata("disabled"),
                });
            }
            return Ok(None);
        }

        self.execute(&record, item, Some(queue)).await.map(Some)
    }

    /// Drain the queue until nothing is ready.
    pub async fn process_queue(
        &self,
        queue: &mut QueueManager<impl Clock, impl IdGen>,
    ) -> Result<Vec<ExecutionResult>, ExecutionError> {
        let mut results = Vec::new();
        while let Some(result) = self.process_queue_once(queue).await? {
            results.push(result);
        }
        Ok(results)
    }

    async fn execute<QC: Clock, QG: IdGen>(
        &self,
        record: &TaskRecord,
        item: QueueItem,
        mut queue: Option<&mut QueueManager<QC, QG>>,
    ) -> Result<ExecutionResult, ExecutionError> {
        let binary = resolve_agent_bin(&self.env_store);
        let argv = build_command(&binary, &record.agent);
        let metadata = priority_metadata(record.priority);

        let mut command = Command::new(&argv[0]);
        command
            .args(&argv[1..])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = command.spawn().map_err(|source| ExecutionError::SpawnFailed {
            binary: argv[0].clone(),
            source,
        })?;
        let pid = child.id().unwrap_or(0);

        if let Some(queue) = queue.as_deref_mut() {
            queue.mark_running(&item.id, pid)?;
        }
        let _ = self.event_log.append(&LogEvent::TaskStarted {
            task_id: item.id.clone(),
            task_name: record.name.clone(),
            metadata: metadata.clone(),
        });

        let started = self.clock.now();
        let timeout = Duration::from_secs(record.agent.timeout_seconds);
        let wait = tokio::time::timeout(timeout, child.wait_with_output()).await;

        let result = match wait {
            Err(_elapsed) => {
                // Dropping the wait future killed the child (kill_on_drop);
                // now harvest the rest of the tree.
                let cleanup = cleanup_process_tree(pid, DEFAULT_GRACE_PERIOD, ORPHAN_NAME_FRAGMENT)
                    .await;
                warn!(task = %record.name, timeout_seconds = record.agent.timeout_seconds, "task timed out");
                ExecutionResult {
                    task_id: item.id.clone(),
                    task_name: record.name.clone(),
                    status: ExecutionStatus::Timeout,
                    return_code: None,
                    duration_seconds: elapsed_seconds(&self.clock, started),
                    stdout: String::new(),
                    stderr: String::new(),
                    cleanup,
                    output_json: None,
                    output_parse_error: None,
                    error: Some("timeout".to_string()),
                }
            }
            Ok(Err(e)) => {
                let _ = cleanup_process_tree(pid, DEFAULT_GRACE_PERIOD, ORPHAN_NAME_FRAGMENT).await;
                return Err(ExecutionError::Wait(e));
            }
            Ok(Ok(output)) => {
                // Harvest stragglers even after a clean exit.
                let cleanup = cleanup_process_tree(pid, DEFAULT_GRACE_PERIOD, ORPHAN_NAME_FRAGMENT)
                    .await;
                let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
                let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
                let return_code = output.status.code();

                let (output_json, parse_error) = match extract_json(&stdout) {
                    Ok(value) => (Some(value), None),
                    Err(OutputParseError::Empty) => (None, Some("no stdout".to_string())),
                    Err(OutputParseError::Invalid(detail)) => (None, Some(detail)),
                };

                let (status, error) = match (return_code, &parse_error) {
                    (Some(0), None) => (ExecutionStatus::Success, None),
                    (Some(0), Some(detail)) => (
                        ExecutionStatus::Failure,
                        Some(format!("JSON parse failure: {detail}")),
                    ),
                    (code, _) => (
                        ExecutionStatus::Failure,
                        Some(match code {
                            Some(code) => format!("agent exited with code {code}"),
                            None => "agent terminated by signal".to_string(),
                        }),
                    ),
                };

                ExecutionResult {
                    task_id: item.id.clone(),
                    task_name: record.name.clone(),
                    status,
                    return_code,
                    duration_seconds: elapsed_seconds(&self.clock, started),
                    stdout,
                    stderr,
                    cleanup,
                    output_json,
                    output_parse_error: parse_error,
                    error,
                }
            }
        };

        self.record_outcome(record, &item, &result, queue, metadata)?;
        Ok(result)
    }

    fn record_outcome<QC: Clock, QG: IdGen>(
        &self,
        record: &TaskRecord,
        item: &QueueItem,
        result: &ExecutionResult,
        queue: Option<&mut QueueManager<QC, QG>>,
        metadata: Map<String, Value>,
    ) -> Result<(), ExecutionError> {
        let success = result.status == ExecutionStatus::Success;

        if let Some(queue) = queue {
            if success {
                queue.mark_completed(
                    &item.id,
                    json!({
                        "duration": result.duration_seconds,
                        "result": result.output_json,
                        "return_code": result.return_code,
                    }),
                )?;
            } else {
                queue.mark_failed(&item.id, failure_payload(result))?;
                if item.attempt < record.agent.max_retries {
                    let delay = record.agent.retry_delay_seconds(item.attempt);
                    queue.requeue_with_delay(item.clone(), delay)?;
                }
            }
        }

        if success {
            let _ = self.event_log.append(&LogEvent::TaskCompleted {
                task_id: item.id.clone(),
                task_name: record.name.clone(),
                result: json!({
                    "duration": result.duration_seconds,
                    "result": result.output_json,
                    "return_code": result.return_code,
                }),
                metadata,
            });
            self.metrics
                .record_success(&record.name, result.duration_seconds)?;
        } else {
            let _ = self.event_log.append(&LogEvent::TaskFailed {
                task_id: item.id.clone(),
                task_name: record.name.clone(),
                error: failure_payload(result),
                metadata,
            });
            self.metrics.record_failure(&record.name)?;
        }

        let now = self.clock.now_utc();
        let next_expected = record
            .schedule
            .as_ref()
            .and_then(|schedule| next_expected_run(schedule, now))
            .map(format_utc_seconds);
        self.task_states
            .record_execution(&record.name, success, now, next_expected)?;

        if let Err(e) = self.reports.save(&record.name, now, &result.report_value()) {
            warn!(task = %record.name, error = %e, "failed to write execution report");
        }

        info!(
            task = %record.name,
            id = %item.id,
            status = result.status.as_str(),
            duration = result.duration_seconds,
            "task run recorded"
        );
        Ok(())
    }
}

fn failure_payload(result: &ExecutionResult) -> Value {
    json!({
        "error": result.error.clone().unwrap_or_else(|| "unknown".to_string()),
        "return_code": result.return_code,
        "stderr": non_empty(&result.stderr),
        "stdout": non_empty(&result.stdout),
        "parse_error": result.output_parse_error,
    })
}

fn priority_metadata(priority: Priority) -> Map<String, Value> {
    let mut metadata = Map::new();
    metadata.insert("priority".to_string(), Value::from(priority.as_str()));
    metadata
}

fn stage_metadata(stage: &str) -> Map<String, Value> {
    let mut metadata = Map::new();
    metadata.insert("stage".to_string(), Value::from(stage));
    metadata
}

fn non_empty(text: &str) -> Option<String> {
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

fn head(text: &str, limit: usize) -> String {
    if text.len() <= limit {
        return text.to_string();
    }
    let mut end = limit;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}

fn elapsed_seconds<C: Clock>(clock: &C, started: std::time::Instant) -> f64 {
    clock.now().duration_since(started).as_secs_f64()
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
