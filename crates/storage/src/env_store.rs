// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Environment descriptor (`env.json`).
//!
//! Remembers resolved host facts, currently the agent CLI path. The file
//! cannot be regenerated from other state, so every rewrite copies the
//! previous version into `backups/` first.

use chrono::Utc;
use clodputer_core::time_fmt::backup_stamp;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::{load_or_archive, write_atomic, StateRoot, StoreError};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct EnvDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    agent_cli: Option<String>,
}

#[derive(Clone)]
pub struct EnvStore {
    path: PathBuf,
    backups_dir: PathBuf,
}

impl EnvStore {
    pub fn new(root: &StateRoot) -> Self {
        Self {
            path: root.env_file(),
            backups_dir: root.backups_dir(),
        }
    }

    /// The stored agent CLI path, if any.
    pub fn agent_cli(&self) -> Option<String> {
        let (doc, _) = load_or_archive::<EnvDocument>(&self.path).ok()?;
        doc.agent_cli
    }

    /// Persist the resolved agent CLI path, backing up the previous file.
    pub fn store_agent_cli(&self, path: &str) -> Result<(), StoreError> {
        let (mut doc, _) = load_or_archive::<EnvDocument>(&self.path)?;
        if doc.agent_cli.as_deref() == Some(path) {
            return Ok(());
        }
        self.backup_existing()?;
        doc.agent_cli = Some(path.to_string());
        write_atomic(&self.path, &doc)
    }

    fn backup_existing(&self) -> Result<(), StoreError> {
        if !self.path.exists() {
            return Ok(());
        }
        fs::create_dir_all(&self.backups_dir)?;
        let stamp = backup_stamp(Utc::now());
        fs::copy(&self.path, self.backups_dir.join(format!("env-{stamp}.bak")))?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "env_store_tests.rs"]
mod tests;
