// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lifecycle events recorded in the structured execution log.
//!
//! Serializes with `{"event": "task_started", ...fields}` format, one compact
//! JSON object per log line. Readers tolerate unknown payload fields.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One record in `execution.log`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LogEvent {
    TaskStarted {
        task_id: String,
        task_name: String,
        #[serde(default)]
        metadata: Map<String, Value>,
    },
    TaskCompleted {
        task_id: String,
        task_name: String,
        result: Value,
        #[serde(default)]
        metadata: Map<String, Value>,
    },
    TaskFailed {
        task_id: String,
        task_name: String,
        error: Value,
        #[serde(default)]
        metadata: Map<String, Value>,
    },

    // -- informational --
    TaskEnqueued {
        task_id: String,
        task_name: String,
        priority: String,
    },
    RetryScheduled {
        task_id: String,
        task_name: String,
        attempt: u32,
        delay_seconds: u64,
        not_before: String,
    },
    StaleLockReclaimed {
        pid: u32,
    },
    QueueCorruptArchived {
        archived_to: String,
    },
    ResourcesExceeded {
        cpu_percent: f32,
        memory_percent: f32,
    },
}

impl LogEvent {
    /// The task id the event refers to, where applicable.
    pub fn task_id(&self) -> Option<&str> {
        match self {
            LogEvent::TaskStarted { task_id, .. }
            | LogEvent::TaskCompleted { task_id, .. }
            | LogEvent::TaskFailed { task_id, .. }
            | LogEvent::TaskEnqueued { task_id, .. }
            | LogEvent::RetryScheduled { task_id, .. } => Some(task_id),
            _ => None,
        }
    }

    /// Wire name of the event, matching the serde tag.
    pub fn name(&self) -> &'static str {
        match self {
            LogEvent::TaskStarted { .. } => "task_started",
            LogEvent::TaskCompleted { .. } => "task_completed",
            LogEvent::TaskFailed { .. } => "task_failed",
            LogEvent::TaskEnqueued { .. } => "task_enqueued",
            LogEvent::RetryScheduled { .. } => "retry_scheduled",
            LogEvent::StaleLockReclaimed { .. } => "stale_lock_reclaimed",
            LogEvent::QueueCorruptArchived { .. } => "queue_corrupt_archived",
            LogEvent::ResourcesExceeded { .. } => "resources_exceeded",
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
