// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! State root layout.
//!
//! Every persistent path lives under one directory (default `~/.clodputer`,
//! overridable via `CLODPUTER_STATE_DIR`). Components receive a `StateRoot`
//! through their constructors so tests can point them at a temp directory.

use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct StateRoot {
    dir: PathBuf,
}

impl StateRoot {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Resolve from the environment: `CLODPUTER_STATE_DIR` > `~/.clodputer`.
    pub fn from_env() -> Self {
        if let Ok(dir) = std::env::var("CLODPUTER_STATE_DIR") {
            if !dir.is_empty() {
                return Self::new(dir);
            }
        }
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::new(home.join(".clodputer"))
    }

    /// Create the root directory and its fixed subdirectories.
    pub fn ensure(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        std::fs::create_dir_all(self.archive_dir())?;
        std::fs::create_dir_all(self.backups_dir())?;
        std::fs::create_dir_all(self.state_dir())?;
        std::fs::create_dir_all(self.outputs_dir())?;
        std::fs::create_dir_all(self.tasks_dir())?;
        Ok(())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn queue_file(&self) -> PathBuf {
        self.dir.join("queue.json")
    }

    pub fn lock_file(&self) -> PathBuf {
        self.dir.join("clodputer.lock")
    }

    pub fn execution_log(&self) -> PathBuf {
        self.dir.join("execution.log")
    }

    pub fn archive_dir(&self) -> PathBuf {
        self.dir.join("archive")
    }

    pub fn metrics_file(&self) -> PathBuf {
        self.dir.join("metrics.json")
    }

    pub fn task_state_file(&self) -> PathBuf {
        self.dir.join("task_state.json")
    }

    /// Per-task opaque user state: `state/<task>.json`.
    pub fn state_dir(&self) -> PathBuf {
        self.dir.join("state")
    }

    /// Per-run execution reports: `outputs/<task>/<stamp>.{json,md}`.
    pub fn outputs_dir(&self) -> PathBuf {
        self.dir.join("outputs")
    }

    pub fn tasks_dir(&self) -> PathBuf {
        self.dir.join("tasks")
    }

    pub fn watcher_pid_file(&self) -> PathBuf {
        self.dir.join("watcher.pid")
    }

    pub fn watcher_log_file(&self) -> PathBuf {
        self.dir.join("watcher.log")
    }

    pub fn backups_dir(&self) -> PathBuf {
        self.dir.join("backups")
    }

    pub fn env_file(&self) -> PathBuf {
        self.dir.join("env.json")
    }

    /// Stdout/stderr sink for cron-launched runs.
    pub fn cron_log_file(&self) -> PathBuf {
        self.dir.join("cron.log")
    }
}

#[cfg(test)]
#[path = "paths_tests.rs"]
mod tests;
