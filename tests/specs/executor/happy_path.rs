//! Scenario: a zero-retry task succeeds and every record agrees.

use crate::prelude::Harness;
use clodputer_core::Priority;
use clodputer_engine::{ExecutionStatus, QueueManager, TaskDir, TaskExecutor};
use clodputer_storage::MetricsStore;
use serial_test::serial;

#[tokio::test]
#[serial]
async fn alpha_success_is_visible_everywhere() {
    let harness = Harness::new();
    harness.install_agent(r#"echo '{"ok": true}'"#);
    harness.write_task(serde_json::json!({
        "name": "alpha",
        "agent": {"prompt": "do the thing", "timeout_seconds": 30}
    }));

    let mut queue = QueueManager::open(&harness.root).unwrap();
    queue
        .enqueue("alpha", Priority::Normal, None, None, 0)
        .unwrap();

    let executor = TaskExecutor::new(&harness.root, TaskDir::new(&harness.root));
    let results = executor.process_queue(&mut queue).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].status, ExecutionStatus::Success);
    assert_eq!(
        results[0].output_json,
        Some(serde_json::json!({"ok": true}))
    );

    // Queue document: nothing running, nothing queued, one completion.
    let status = queue.get_status();
    assert!(status.running.is_none());
    assert!(status.queued.is_empty());
    assert_eq!(status.completed_recent.len(), 1);
    assert_eq!(status.completed_recent[0].name, "alpha");
    assert_eq!(
        status.completed_recent[0].result["result"],
        serde_json::json!({"ok": true})
    );

    // Event log: started strictly before completed, same task id.
    let events = harness.events();
    let started = events
        .iter()
        .position(|e| e["event"] == "task_started")
        .unwrap();
    let completed = events
        .iter()
        .position(|e| e["event"] == "task_completed")
        .unwrap();
    assert!(started < completed);
    assert_eq!(
        events[started]["task_id"],
        events[completed]["task_id"]
    );

    // Metrics: success=1, failure=0.
    let metrics = MetricsStore::new(&harness.root)
        .get("alpha")
        .unwrap()
        .unwrap();
    assert_eq!((metrics.success, metrics.failure), (1, 0));

    std::env::remove_var("CLODPUTER_CLAUDE_BIN");
}
