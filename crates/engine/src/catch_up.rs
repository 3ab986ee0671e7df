// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Catch-up for scheduled occurrences missed while the runtime was down.
//!
//! For each enabled task with a cron schedule and a non-skip mode, enumerate
//! occurrences in the half-open interval `(last_success, now)` and enqueue
//! one item per retained occurrence. Invalid expressions, missing state, and
//! parse failures all yield an empty retained set, never an error.

use chrono::{DateTime, Utc};
use clodputer_core::time_fmt::{format_utc_seconds, parse_utc};
use clodputer_core::{CatchUpMode, Clock, IdGen, ScheduleConfig, TaskRecord};
use clodputer_storage::TaskStateStore;
use cron::Schedule;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::{debug, info};

use crate::queue::{QueueError, QueueManager};

/// One scheduled occurrence that elapsed unserved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissedRun {
    pub task_name: String,
    pub missed_at: DateTime<Utc>,
    pub mode: CatchUpMode,
}

/// Rewrite an expression into the seconds-first dialect the schedule parser
/// speaks: five fields gain a leading seconds column, six pass through, and
/// macros are kept as-is. `None` when the shape is not enumerable.
fn normalize_expression(expression: &str) -> Option<String> {
    let expression = expression.trim();
    if expression.is_empty() {
        return None;
    }
    if expression.starts_with('@') {
        return Some(expression.to_string());
    }
    match expression.split_whitespace().count() {
        5 => Some(format!("0 {expression}")),
        6 => Some(expression.to_string()),
        _ => None,
    }
}

/// Occurrences of `schedule` strictly after `after` and strictly before
/// `before`, oldest first. Empty on any parse failure.
fn occurrences_between(
    schedule: &ScheduleConfig,
    after: DateTime<Utc>,
    before: DateTime<Utc>,
) -> Vec<DateTime<Utc>> {
    let Some(normalized) = normalize_expression(&schedule.expression) else {
        return Vec::new();
    };
    let Ok(parsed) = Schedule::from_str(&normalized) else {
        return Vec::new();
    };
    parsed
        .after(&after)
        .take_while(|occurrence| *occurrence < before)
        .collect()
}

/// The next occurrence after `after`, for `next_expected` bookkeeping.
pub fn next_expected_run(schedule: &ScheduleConfig, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let normalized = normalize_expression(&schedule.expression)?;
    let parsed = Schedule::from_str(&normalized).ok()?;
    parsed.after(&after).next()
}

/// Detect missed runs for every eligible task.
pub fn detect_missed_runs(
    tasks: &[TaskRecord],
    states: &BTreeMap<String, clodputer_storage::TaskState>,
    now: DateTime<Utc>,
) -> Vec<MissedRun> {
    let mut missed = Vec::new();

    for task in tasks {
        let Some(schedule) = task.schedule.as_ref() else {
            continue;
        };
        if !task.enabled || schedule.catch_up == CatchUpMode::Skip {
            continue;
        }
        // A task that never succeeded has nothing to catch up from.
        let Some(last_success) = states
            .get(&task.name)
            .and_then(|state| state.last_success.as_deref())
            .and_then(parse_utc)
        else {
            continue;
        };

        let mut occurrences = occurrences_between(schedule, last_success, now);
        if schedule.catch_up == CatchUpMode::RunOnce && occurrences.len() > 1 {
            occurrences = occurrences.split_off(occurrences.len() - 1);
        }
        for missed_at in occurrences {
            missed.push(MissedRun {
                task_name: task.name.clone(),
                missed_at,
                mode: schedule.catch_up,
            });
        }
    }

    missed
}

/// Detect and enqueue missed runs, recording the missed timestamp in each
/// item's metadata. Returns what was enqueued.
pub fn catch_up_missed(
    queue: &mut QueueManager<impl Clock, impl IdGen>,
    tasks: &[TaskRecord],
    task_states: &TaskStateStore,
    now: DateTime<Utc>,
) -> Result<Vec<MissedRun>, QueueError> {
    let states = task_states.load_all()?;
    let missed = detect_missed_runs(tasks, &states, now);
    if missed.is_empty() {
        debug!("no missed scheduled runs");
        return Ok(missed);
    }

    for run in &missed {
        let priority = tasks
            .iter()
            .find(|task| task.name == run.task_name)
            .map(|task| task.priority)
            .unwrap_or_default();
        let mut metadata = Map::new();
        metadata.insert("trigger".to_string(), Value::from("catch_up"));
        metadata.insert(
            "missed_at".to_string(),
            Value::from(format_utc_seconds(run.missed_at)),
        );
        queue.enqueue(&run.task_name, priority, Some(metadata), None, 0)?;
    }
    info!(count = missed.len(), "enqueued catch-up runs");
    Ok(missed)
}

#[cfg(test)]
#[path = "catch_up_tests.rs"]
mod tests;
