//! Scenario: three missed daily occurrences are enqueued per catch-up mode.

use crate::prelude::Harness;
use chrono::{TimeZone, Utc};
use clodputer_engine::{catch_up_missed, QueueManager, TaskDir, TaskSource};
use clodputer_storage::TaskStateStore;

fn daily_task(harness: &Harness, catch_up: &str) {
    harness.write_task(serde_json::json!({
        "name": "daily",
        "agent": {"prompt": "morning summary"},
        "schedule": {"expression": "0 9 * * *", "catch_up": catch_up}
    }));
}

fn seed_last_success(harness: &Harness) {
    let store = TaskStateStore::new(&harness.root);
    let last = Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap();
    store.record_execution("daily", true, last, None).unwrap();
}

#[test]
fn run_all_enqueues_every_missed_occurrence() {
    let harness = Harness::new();
    daily_task(&harness, "run_all");
    seed_last_success(&harness);

    let tasks = TaskDir::new(&harness.root).load_all().unwrap();
    let mut queue = QueueManager::open(&harness.root).unwrap();
    let now = Utc.with_ymd_and_hms(2025, 6, 4, 10, 0, 0).unwrap();
    let missed =
        catch_up_missed(&mut queue, &tasks, &TaskStateStore::new(&harness.root), now).unwrap();
    assert_eq!(missed.len(), 3);

    let doc = harness.queue_doc();
    let queued = doc["queued"].as_array().unwrap();
    assert_eq!(queued.len(), 3);
    let stamps: Vec<&str> = queued
        .iter()
        .map(|item| item["metadata"]["missed_at"].as_str().unwrap())
        .collect();
    assert_eq!(
        stamps,
        [
            "2025-06-02T09:00:00Z",
            "2025-06-03T09:00:00Z",
            "2025-06-04T09:00:00Z"
        ]
    );
    for item in queued {
        assert_eq!(item["metadata"]["trigger"], "catch_up");
        assert_eq!(item["name"], "daily");
    }
}

#[test]
fn run_once_enqueues_only_the_most_recent() {
    let harness = Harness::new();
    daily_task(&harness, "run_once");
    seed_last_success(&harness);

    let tasks = TaskDir::new(&harness.root).load_all().unwrap();
    let mut queue = QueueManager::open(&harness.root).unwrap();
    let now = Utc.with_ymd_and_hms(2025, 6, 4, 10, 0, 0).unwrap();
    let missed =
        catch_up_missed(&mut queue, &tasks, &TaskStateStore::new(&harness.root), now).unwrap();
    assert_eq!(missed.len(), 1);
    assert_eq!(
        harness.queue_doc()["queued"][0]["metadata"]["missed_at"],
        "2025-06-04T09:00:00Z"
    );
}

#[test]
fn skip_mode_enqueues_nothing() {
    let harness = Harness::new();
    daily_task(&harness, "skip");
    seed_last_success(&harness);

    let tasks = TaskDir::new(&harness.root).load_all().unwrap();
    let mut queue = QueueManager::open(&harness.root).unwrap();
    let now = Utc.with_ymd_and_hms(2025, 6, 4, 10, 0, 0).unwrap();
    let missed =
        catch_up_missed(&mut queue, &tasks, &TaskStateStore::new(&harness.root), now).unwrap();
    assert!(missed.is_empty());
    assert!(!harness.root.queue_file().exists() || harness.queue_doc()["queued"].as_array().unwrap().is_empty());
}
