//! Scenario: rapid-fire file creation collapses to one enqueue; a second
//! burst after the window yields a second item.

use crate::prelude::Harness;
use clodputer_daemon::WatchService;
use std::time::Duration;

fn watch_task(path: &std::path::Path) -> serde_json::Value {
    serde_json::json!({
        "name": "w",
        "agent": {"prompt": "ingest"},
        "trigger": {
            "type": "file_watch",
            "path": path.to_str().unwrap(),
            "pattern": "*.txt",
            "event": "created",
            "debounce": 500
        }
    })
}

fn queued_count(harness: &Harness) -> usize {
    harness.queue_doc()["queued"].as_array().unwrap().len()
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(800)).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn bursts_collapse_per_debounce_window() {
    let harness = Harness::new();
    let inbox = harness.scratch_dir("inbox");
    let record: clodputer_core::TaskRecord =
        serde_json::from_value(watch_task(&inbox)).unwrap();

    let service = WatchService::start(&harness.root, &[record]).unwrap();
    assert_eq!(service.watch_count(), 1);
    // Give the backend a moment to arm the watch.
    tokio::time::sleep(Duration::from_millis(200)).await;

    // Five matching files inside the 500ms window on the same path.
    for _ in 0..5 {
        std::fs::write(inbox.join("note.txt"), "x").unwrap();
        std::fs::remove_file(inbox.join("note.txt")).unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;
    }
    settle().await;
    assert_eq!(queued_count(&harness), 1);

    // After the window, the same path fires again.
    std::fs::write(inbox.join("note.txt"), "x").unwrap();
    settle().await;
    assert_eq!(queued_count(&harness), 2);

    drop(service);

    // The items carry the trigger metadata.
    let doc = harness.queue_doc();
    let item = &doc["queued"][0];
    assert_eq!(item["name"], "w");
    assert_eq!(item["metadata"]["trigger"], "file_watch");
    assert_eq!(item["metadata"]["event"], "created");
    assert!(item["metadata"]["path"]
        .as_str()
        .unwrap()
        .ends_with("note.txt"));
}

#[tokio::test(flavor = "multi_thread")]
async fn non_matching_files_are_ignored() {
    let harness = Harness::new();
    let inbox = harness.scratch_dir("inbox");
    let record: clodputer_core::TaskRecord =
        serde_json::from_value(watch_task(&inbox)).unwrap();

    let _service = WatchService::start(&harness.root, &[record]).unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    std::fs::write(inbox.join("ignored.md"), "x").unwrap();
    settle().await;
    assert!(!harness.root.queue_file().exists() || queued_count(&harness) == 0);
}
