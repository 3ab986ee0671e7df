// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task records consumed by the execution engine.
//!
//! Records arrive pre-validated from the configuration subsystem; this module
//! only defines their typed shape. A record pairs an agent invocation spec
//! with at most one of a time schedule or an event trigger.

use crate::queue::Priority;
use serde::{Deserialize, Serialize};

/// Fully validated configuration of one task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub priority: Priority,
    pub agent: AgentSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<ScheduleConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<Trigger>,
}

fn default_enabled() -> bool {
    true
}

impl TaskRecord {
    /// Whether this task participates in cron installation and catch-up.
    pub fn is_scheduled(&self) -> bool {
        self.enabled && self.schedule.is_some()
    }

    /// The file-watch trigger, if this task has one.
    pub fn file_watch(&self) -> Option<&FileWatchTrigger> {
        match self.trigger {
            Some(Trigger::FileWatch(ref fw)) if self.enabled => Some(fw),
            _ => None,
        }
    }
}

/// How the agent CLI is invoked for a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSpec {
    pub prompt: String,
    #[serde(default)]
    pub allowed_tools: Vec<String>,
    #[serde(default)]
    pub disallowed_tools: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permission_mode: Option<PermissionMode>,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default = "default_backoff")]
    pub retry_backoff_seconds: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mcp_config: Option<String>,
}

fn default_timeout() -> u64 {
    3600
}

fn default_backoff() -> u64 {
    60
}

impl AgentSpec {
    /// Backoff before retry number `attempt` (0-based): base × 2^attempt.
    pub fn retry_delay_seconds(&self, attempt: u32) -> u64 {
        self.retry_backoff_seconds.saturating_mul(1u64 << attempt.min(63))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PermissionMode {
    AcceptEdits,
    RejectEdits,
    Prompt,
}

impl PermissionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionMode::AcceptEdits => "acceptEdits",
            PermissionMode::RejectEdits => "rejectEdits",
            PermissionMode::Prompt => "prompt",
        }
    }
}

/// Time-based schedule with catch-up policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    pub expression: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(default)]
    pub catch_up: CatchUpMode,
}

/// What to do with scheduled occurrences that elapsed while the runtime was
/// not running.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatchUpMode {
    #[default]
    Skip,
    RunOnce,
    RunAll,
}

/// Event trigger shapes, discriminated by `type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Trigger {
    Manual,
    FileWatch(FileWatchTrigger),
    Interval { seconds: u64 },
}

/// Watch one directory for matching file events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileWatchTrigger {
    pub path: String,
    #[serde(default = "default_pattern")]
    pub pattern: String,
    #[serde(default)]
    pub event: WatchEventKind,
    #[serde(default = "default_debounce")]
    pub debounce: u64,
}

fn default_pattern() -> String {
    "*".to_string()
}

fn default_debounce() -> u64 {
    1000
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatchEventKind {
    #[default]
    Created,
    Modified,
    Deleted,
}

impl WatchEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WatchEventKind::Created => "created",
            WatchEventKind::Modified => "modified",
            WatchEventKind::Deleted => "deleted",
        }
    }
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
