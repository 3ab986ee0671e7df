//! Scenario: a task times out, the child is killed, and a delayed retry
//! lands back in the queue.

use crate::prelude::Harness;
use clodputer_core::time_fmt::parse_utc;
use clodputer_core::Priority;
use clodputer_engine::{ExecutionStatus, QueueManager, TaskDir, TaskExecutor};
use serial_test::serial;
use std::time::Duration;

#[tokio::test]
#[serial]
async fn timeout_schedules_a_backoff_retry() {
    let harness = Harness::new();
    harness.install_agent("sleep 10");
    harness.write_task(serde_json::json!({
        "name": "beta",
        "agent": {
            "prompt": "slow",
            "timeout_seconds": 1,
            "max_retries": 1,
            "retry_backoff_seconds": 2
        }
    }));

    let mut queue = QueueManager::open(&harness.root).unwrap();
    queue
        .enqueue("beta", Priority::Normal, None, None, 0)
        .unwrap();

    let executor = TaskExecutor::new(&harness.root, TaskDir::new(&harness.root));
    let started = std::time::Instant::now();
    let result = executor
        .process_queue_once(&mut queue)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(result.status, ExecutionStatus::Timeout);
    assert_eq!(result.error.as_deref(), Some("timeout"));
    // The 10s sleeper did not run to completion.
    assert!(started.elapsed() < Duration::from_secs(9));

    // Failed ring has the timeout; one retry item with attempt=1 and a
    // not_before roughly backoff seconds out.
    let status = queue.get_status();
    assert_eq!(status.failed_recent.len(), 1);
    assert_eq!(status.failed_recent[0].error["error"], "timeout");
    assert_eq!(status.queued.len(), 1);
    let retry = &status.queued[0];
    assert_eq!(retry.attempt, 1);
    let not_before = parse_utc(retry.not_before.as_deref().unwrap()).unwrap();
    let delay = (not_before - chrono::Utc::now()).num_seconds();
    assert!((0..=2).contains(&delay), "delay was {delay}s");

    // Event log recorded the failure as a timeout.
    let failed = harness
        .events()
        .into_iter()
        .find(|e| e["event"] == "task_failed")
        .unwrap();
    assert_eq!(failed["error"]["error"], "timeout");

    // Not ready until the delay elapses.
    assert!(queue.get_next_ready().unwrap().is_none());
    tokio::time::sleep(Duration::from_millis(2200)).await;
    let ready = queue.get_next_ready().unwrap().unwrap();
    assert_eq!(ready.name, "beta");
    assert_eq!(ready.attempt, 1);

    std::env::remove_var("CLODPUTER_CLAUDE_BIN");
}
