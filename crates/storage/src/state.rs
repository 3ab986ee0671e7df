// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-task user state: opaque JSON objects tasks persist between runs.
//!
//! One file per task under `state/`, capped at [`MAX_STATE_SIZE`] in both
//! directions. Unlike the runtime's own documents, corruption here is an
//! error surfaced to the caller; the runtime does not own this data and must
//! not silently discard it.

use serde_json::{Map, Value};
use std::fs;
use std::path::PathBuf;
use thiserror::Error;

use crate::StateRoot;

pub const MAX_STATE_SIZE: u64 = 1024 * 1024;

#[derive(Debug, Error)]
pub enum StateFileError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("state for '{task}' is not valid JSON: {source}")]
    Corrupt {
        task: String,
        source: serde_json::Error,
    },
    #[error("state for '{task}' must be a JSON object")]
    NotAnObject { task: String },
    #[error("state for '{task}' is {size} bytes, max {MAX_STATE_SIZE}")]
    TooLarge { task: String, size: u64 },
}

#[derive(Clone)]
pub struct StateFiles {
    dir: PathBuf,
}

impl StateFiles {
    pub fn new(root: &StateRoot) -> Self {
        Self {
            dir: root.state_dir(),
        }
    }

    pub fn path_for(&self, task_name: &str) -> PathBuf {
        self.dir.join(format!("{task_name}.json"))
    }

    /// Load a task's state, or an empty object when none exists.
    pub fn load(&self, task_name: &str) -> Result<Map<String, Value>, StateFileError> {
        let path = self.path_for(task_name);
        if !path.exists() {
            return Ok(Map::new());
        }

        let size = path.metadata()?.len();
        if size > MAX_STATE_SIZE {
            return Err(StateFileError::TooLarge {
                task: task_name.to_string(),
                size,
            });
        }

        let content = fs::read_to_string(&path)?;
        let value: Value =
            serde_json::from_str(&content).map_err(|source| StateFileError::Corrupt {
                task: task_name.to_string(),
                source,
            })?;
        match value {
            Value::Object(map) => Ok(map),
            _ => Err(StateFileError::NotAnObject {
                task: task_name.to_string(),
            }),
        }
    }

    pub fn save(
        &self,
        task_name: &str,
        state: &Map<String, Value>,
    ) -> Result<PathBuf, StateFileError> {
        let content = serde_json::to_string_pretty(&Value::Object(state.clone()))
            .map_err(|source| StateFileError::Corrupt {
                task: task_name.to_string(),
                source,
            })?;
        let size = content.len() as u64;
        if size > MAX_STATE_SIZE {
            return Err(StateFileError::TooLarge {
                task: task_name.to_string(),
                size,
            });
        }

        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(task_name);
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, content)?;
        fs::rename(&tmp, &path)?;
        Ok(path)
    }

    /// Merge `updates` into the existing state and persist.
    pub fn update(
        &self,
        task_name: &str,
        updates: Map<String, Value>,
    ) -> Result<Map<String, Value>, StateFileError> {
        let mut state = self.load(task_name)?;
        state.extend(updates);
        self.save(task_name, &state)?;
        Ok(state)
    }

    /// Remove a task's state. Returns whether anything existed.
    pub fn delete(&self, task_name: &str) -> Result<bool, StateFileError> {
        let path = self.path_for(task_name);
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(path)?;
        Ok(true)
    }

    /// All task states, skipping unreadable files.
    pub fn list(&self) -> Result<Vec<(String, Map<String, Value>)>, StateFileError> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut names: Vec<String> = fs::read_dir(&self.dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .filter_map(|path| path.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .collect();
        names.sort();

        let mut states = Vec::new();
        for name in names {
            if let Ok(state) = self.load(&name) {
                states.push((name, state));
            }
        }
        Ok(states)
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
