// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-task success/failure counters with cumulative durations.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::{load_or_archive, write_atomic, StateRoot, StoreError};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskMetrics {
    #[serde(default)]
    pub success: u64,
    #[serde(default)]
    pub failure: u64,
    #[serde(default)]
    pub total_duration: f64,
}

/// Derived view returned by [`MetricsStore::summary`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskMetricsSummary {
    pub name: String,
    pub success: u64,
    pub failure: u64,
    pub total: u64,
    pub avg_duration: f64,
}

#[derive(Clone)]
pub struct MetricsStore {
    path: PathBuf,
}

impl MetricsStore {
    pub fn new(root: &StateRoot) -> Self {
        Self {
            path: root.metrics_file(),
        }
    }

    pub fn record_success(&self, task_name: &str, duration_seconds: f64) -> Result<(), StoreError> {
        let mut data = self.load()?;
        let entry = data.entry(task_name.to_string()).or_default();
        entry.success += 1;
        entry.total_duration += duration_seconds;
        write_atomic(&self.path, &data)
    }

    pub fn record_failure(&self, task_name: &str) -> Result<(), StoreError> {
        let mut data = self.load()?;
        data.entry(task_name.to_string()).or_default().failure += 1;
        write_atomic(&self.path, &data)
    }

    pub fn get(&self, task_name: &str) -> Result<Option<TaskMetrics>, StoreError> {
        Ok(self.load()?.remove(task_name))
    }

    /// Per-task summaries ordered by total runs, busiest first.
    pub fn summary(&self) -> Result<Vec<TaskMetricsSummary>, StoreError> {
        let data = self.load()?;
        let mut rows: Vec<TaskMetricsSummary> = data
            .into_iter()
            .map(|(name, stats)| {
                let avg = if stats.success > 0 {
                    stats.total_duration / stats.success as f64
                } else {
                    0.0
                };
                TaskMetricsSummary {
                    name,
                    success: stats.success,
                    failure: stats.failure,
                    total: stats.success + stats.failure,
                    avg_duration: avg,
                }
            })
            .collect();
        rows.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.name.cmp(&b.name)));
        Ok(rows)
    }

    fn load(&self) -> Result<BTreeMap<String, TaskMetrics>, StoreError> {
        let (data, _) = load_or_archive(&self.path)?;
        Ok(data)
    }
}

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod tests;
