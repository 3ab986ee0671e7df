// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-task schedule state: last run, last success, next expected run.
//!
//! This document feeds catch-up detection, so a corrupt file must never take
//! the runtime down: it is sidelined and treated as empty.

use chrono::{DateTime, Utc};
use clodputer_core::time_fmt::format_utc_seconds;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::{load_or_archive, write_atomic, StateRoot, StoreError};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_success: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_expected: Option<String>,
}

#[derive(Clone)]
pub struct TaskStateStore {
    path: PathBuf,
}

impl TaskStateStore {
    pub fn new(root: &StateRoot) -> Self {
        Self {
            path: root.task_state_file(),
        }
    }

    pub fn load_all(&self) -> Result<BTreeMap<String, TaskState>, StoreError> {
        let (states, _) = load_or_archive(&self.path)?;
        Ok(states)
    }

    pub fn get(&self, task_name: &str) -> Result<Option<TaskState>, StoreError> {
        Ok(self.load_all()?.remove(task_name))
    }

    /// Record one execution: `last_run` always, `last_success` on success,
    /// `next_expected` when the caller derived one from the schedule.
    pub fn record_execution(
        &self,
        task_name: &str,
        success: bool,
        at: DateTime<Utc>,
        next_expected: Option<String>,
    ) -> Result<(), StoreError> {
        let mut states = self.load_all()?;
        let state = states.entry(task_name.to_string()).or_default();
        let stamp = format_utc_seconds(at);
        state.last_run = Some(stamp.clone());
        if success {
            state.last_success = Some(stamp);
        }
        if next_expected.is_some() {
            state.next_expected = next_expected;
        }
        write_atomic(&self.path, &states)
    }
}

#[cfg(test)]
#[path = "task_state_tests.rs"]
mod tests;
