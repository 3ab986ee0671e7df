// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::EnvStore;
use crate::StateRoot;

fn store() -> (tempfile::TempDir, StateRoot, EnvStore) {
    let tmp = tempfile::tempdir().unwrap();
    let root = StateRoot::new(tmp.path());
    root.ensure().unwrap();
    let store = EnvStore::new(&root);
    (tmp, root, store)
}

#[test]
fn stores_and_reads_back_agent_cli() {
    let (_tmp, _root, store) = store();
    assert!(store.agent_cli().is_none());
    store.store_agent_cli("/usr/local/bin/claude").unwrap();
    assert_eq!(store.agent_cli().as_deref(), Some("/usr/local/bin/claude"));
}

#[test]
fn rewrite_backs_up_previous_descriptor() {
    let (_tmp, root, store) = store();
    store.store_agent_cli("/old/claude").unwrap();
    store.store_agent_cli("/new/claude").unwrap();

    let backups: Vec<_> = std::fs::read_dir(root.backups_dir())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with("env-"))
        .collect();
    assert_eq!(backups.len(), 1);
    let content = std::fs::read_to_string(backups[0].path()).unwrap();
    assert!(content.contains("/old/claude"));
}

#[test]
fn storing_the_same_path_twice_is_a_no_op() {
    let (_tmp, root, store) = store();
    store.store_agent_cli("/same/claude").unwrap();
    store.store_agent_cli("/same/claude").unwrap();
    // First write had nothing to back up and the second changed nothing.
    let backups = std::fs::read_dir(root.backups_dir()).unwrap().count();
    assert_eq!(backups, 0);
}
