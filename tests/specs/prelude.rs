//! Test helpers for behavioral specifications.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, dead_code)]

use clodputer_storage::StateRoot;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;

/// A temp state root with helpers for installing fake agents and tasks.
pub struct Harness {
    _tmp: tempfile::TempDir,
    pub root: StateRoot,
}

impl Harness {
    pub fn new() -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let root = StateRoot::new(tmp.path().join("clodputer"));
        root.ensure().unwrap();
        Self { _tmp: tmp, root }
    }

    /// Scratch directory outside the state root (e.g. a watched inbox).
    pub fn scratch_dir(&self, name: &str) -> PathBuf {
        let dir = self._tmp.path().join(name);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    /// Install a fake agent shell script and point the binary override at
    /// it. Remember to remove the var at the end of #[serial] tests.
    pub fn install_agent(&self, body: &str) -> PathBuf {
        let path = self.root.dir().join("fake-agent.sh");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        let mut perms = std::fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).unwrap();
        std::env::set_var("CLODPUTER_CLAUDE_BIN", &path);
        path
    }

    /// Write a task record JSON document into tasks/.
    pub fn write_task(&self, json: serde_json::Value) {
        let name = json["name"].as_str().unwrap().to_string();
        std::fs::write(
            self.root.tasks_dir().join(format!("{name}.json")),
            serde_json::to_string_pretty(&json).unwrap(),
        )
        .unwrap();
    }

    pub fn events(&self) -> Vec<serde_json::Value> {
        clodputer_storage::EventLog::new(&self.root)
            .read_all()
            .unwrap()
    }

    pub fn queue_doc(&self) -> serde_json::Value {
        serde_json::from_str(&std::fs::read_to_string(self.root.queue_file()).unwrap()).unwrap()
    }
}
