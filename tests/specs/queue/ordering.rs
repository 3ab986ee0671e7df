//! Priority and delay ordering across producers.

use crate::prelude::Harness;
use clodputer_core::Priority;
use clodputer_engine::QueueManager;

#[test]
fn high_priority_dispatches_before_earlier_normal_items() {
    let harness = Harness::new();
    let mut queue = QueueManager::open(&harness.root).unwrap();

    let a = queue.enqueue("a", Priority::Normal, None, None, 0).unwrap();
    let b = queue.enqueue("b", Priority::High, None, None, 0).unwrap();
    let c = queue.enqueue("c", Priority::Normal, None, None, 0).unwrap();

    // b first, then a, then c.
    let first = queue.get_next_ready().unwrap().unwrap();
    assert_eq!(first.id, b.id);
    queue.mark_running(&first.id, 100).unwrap();
    queue
        .mark_completed(&first.id, serde_json::json!({}))
        .unwrap();

    let second = queue.get_next_ready().unwrap().unwrap();
    assert_eq!(second.id, a.id);
    queue.mark_running(&second.id, 101).unwrap();
    queue
        .mark_completed(&second.id, serde_json::json!({}))
        .unwrap();

    let third = queue.get_next_ready().unwrap().unwrap();
    assert_eq!(third.id, c.id);
}

#[test]
fn queue_document_on_disk_upholds_invariants() {
    let harness = Harness::new();
    let mut queue = QueueManager::open(&harness.root).unwrap();
    queue.enqueue("a", Priority::Normal, None, None, 0).unwrap();
    queue.enqueue("b", Priority::High, None, None, 0).unwrap();

    let (ok, errors) = queue.validate_state();
    assert!(ok, "{errors:?}");

    let doc = harness.queue_doc();
    assert!(doc["running"].is_null());
    assert_eq!(doc["queued"].as_array().unwrap().len(), 2);
    // High priority sorts first in the persisted order too.
    assert_eq!(doc["queued"][0]["name"], "b");
}

#[test]
fn double_cancel_equals_single_cancel() {
    let harness = Harness::new();
    let mut queue = QueueManager::open(&harness.root).unwrap();
    let item = queue.enqueue("a", Priority::Normal, None, None, 0).unwrap();

    assert!(queue.cancel(&item.id).unwrap());
    let after_first = harness.queue_doc();
    assert!(!queue.cancel(&item.id).unwrap());
    let after_second = harness.queue_doc();
    assert_eq!(after_first["queued"], after_second["queued"]);
}
