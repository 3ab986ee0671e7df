// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task record loading.
//!
//! Records are JSON documents under `tasks/`, deserialized straight into the
//! typed record. Schema validation beyond type shape belongs to the
//! configuration subsystem; the engine trusts what it is handed and surfaces
//! a missing or undeserializable record at execution time.

use clodputer_core::TaskRecord;
use clodputer_storage::StateRoot;
use std::fs;
use std::path::PathBuf;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum TaskSourceError {
    #[error("no task record named '{name}'")]
    NotFound { name: String },
    #[error("task record {path} is unreadable: {detail}")]
    Unreadable { path: PathBuf, detail: String },
}

/// Where the executor gets task records from.
pub trait TaskSource {
    fn load(&self, name: &str) -> Result<TaskRecord, TaskSourceError>;
    fn load_all(&self) -> Result<Vec<TaskRecord>, TaskSourceError>;
}

/// Directory-backed source: one `<name>.json` per task.
#[derive(Clone)]
pub struct TaskDir {
    dir: PathBuf,
}

impl TaskDir {
    pub fn new(root: &StateRoot) -> Self {
        Self {
            dir: root.tasks_dir(),
        }
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }
}

impl TaskSource for TaskDir {
    fn load(&self, name: &str) -> Result<TaskRecord, TaskSourceError> {
        let path = self.path_for(name);
        if !path.exists() {
            return Err(TaskSourceError::NotFound {
                name: name.to_string(),
            });
        }
        let content = fs::read_to_string(&path).map_err(|e| TaskSourceError::Unreadable {
            path: path.clone(),
            detail: e.to_string(),
        })?;
        serde_json::from_str(&content).map_err(|e| TaskSourceError::Unreadable {
            path,
            detail: e.to_string(),
        })
    }

    /// All readable records, sorted by file name. Unreadable files are
    /// logged and skipped so one bad record cannot hide the rest.
    fn load_all(&self) -> Result<Vec<TaskRecord>, TaskSourceError> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut paths: Vec<PathBuf> = fs::read_dir(&self.dir)
            .map_err(|e| TaskSourceError::Unreadable {
                path: self.dir.clone(),
                detail: e.to_string(),
            })?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();

        let mut records = Vec::new();
        for path in paths {
            match fs::read_to_string(&path)
                .map_err(|e| e.to_string())
                .and_then(|content| serde_json::from_str(&content).map_err(|e| e.to_string()))
            {
                Ok(record) => records.push(record),
                Err(detail) => warn!(path = %path.display(), %detail, "skipping unreadable task record"),
            }
        }
        Ok(records)
    }
}

#[cfg(test)]
#[path = "tasks_tests.rs"]
mod tests;
