// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The queue document and its ordering rules.
//!
//! This is the pure in-memory form of `queue.json`. Persistence and locking
//! live in the engine; everything here is deterministic and side-effect free
//! so ordering and invariants can be tested directly.

use crate::time_fmt::parse_utc;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Completed/failed rings keep this many recent entries.
pub const OUTCOME_RING_LEN: usize = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    #[default]
    Normal,
}

impl Priority {
    /// Sort rank: high before normal.
    fn rank(self) -> u8 {
        match self {
            Priority::High => 0,
            Priority::Normal => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Normal => "normal",
        }
    }
}

/// One queued run of a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueItem {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub priority: Priority,
    pub enqueued_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_before: Option<String>,
    #[serde(default)]
    pub attempt: u32,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl QueueItem {
    /// Parsed `not_before`, or `None` when absent or unparseable.
    pub fn not_before_utc(&self) -> Option<DateTime<Utc>> {
        self.not_before.as_deref().and_then(parse_utc)
    }

    /// Whether the item is eligible for dispatch at `now`.
    pub fn is_ready(&self, now: DateTime<Utc>) -> bool {
        match self.not_before_utc() {
            Some(at) => at <= now,
            None => true,
        }
    }

    fn sort_key(&self) -> (u8, DateTime<Utc>, &str) {
        (
            self.priority.rank(),
            self.not_before_utc().unwrap_or(DateTime::<Utc>::MIN_UTC),
            self.enqueued_at.as_str(),
        )
    }
}

/// The single record allowed in `running`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunningTask {
    pub id: String,
    pub name: String,
    pub pid: u32,
    pub started_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletedEntry {
    pub id: String,
    pub name: String,
    pub completed_at: String,
    pub result: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedEntry {
    pub id: String,
    pub name: String,
    pub failed_at: String,
    pub error: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempt: Option<u32>,
}

/// On-disk shape of `queue.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueDocument {
    #[serde(default)]
    pub running: Option<RunningTask>,
    #[serde(default)]
    pub queued: Vec<QueueItem>,
    #[serde(default)]
    pub completed: Vec<CompletedEntry>,
    #[serde(default)]
    pub failed: Vec<FailedEntry>,
}

impl QueueDocument {
    /// Re-sort `queued` by the dispatch key: priority class first, then
    /// elapsed-or-absent `not_before`, then enqueue time. The sort is stable
    /// so equal keys keep insertion order.
    pub fn sort_queued(&mut self) {
        self.queued.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
    }

    /// First item whose `not_before` has elapsed, in sorted order.
    pub fn first_ready(&self, now: DateTime<Utc>) -> Option<&QueueItem> {
        self.queued.iter().find(|item| item.is_ready(now))
    }

    pub fn position_of(&self, id: &str) -> Option<usize> {
        self.queued.iter().position(|item| item.id == id)
    }

    /// Append an outcome, trimming the ring to [`OUTCOME_RING_LEN`].
    pub fn push_completed(&mut self, entry: CompletedEntry) {
        self.completed.push(entry);
        trim_front(&mut self.completed, OUTCOME_RING_LEN);
    }

    pub fn push_failed(&mut self, entry: FailedEntry) {
        self.failed.push(entry);
        trim_front(&mut self.failed, OUTCOME_RING_LEN);
    }

    /// Check structural invariants: queued ids pairwise distinct and
    /// disjoint from `running.id`. Returns findings without mutating.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        let mut seen = std::collections::HashSet::new();
        for item in &self.queued {
            if !seen.insert(item.id.as_str()) {
                errors.push(format!("duplicate queued task id {}", item.id));
            }
        }
        if let Some(running) = &self.running {
            if seen.contains(running.id.as_str()) {
                errors.push(format!(
                    "task {} appears both queued and running",
                    running.id
                ));
            }
        }
        errors
    }
}

fn trim_front<T>(ring: &mut Vec<T>, keep: usize) {
    if ring.len() > keep {
        let excess = ring.len() - keep;
        ring.drain(..excess);
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
