// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use clodputer_core::{FakeClock, Priority, SequentialIdGen};
use clodputer_storage::StateRoot;
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Probe with a switchable overload flag shared with the test body.
struct FakeProbe {
    overloaded: Arc<AtomicBool>,
}

impl ResourceProbe for FakeProbe {
    fn sample(&mut self) -> ResourceSample {
        if self.overloaded.load(Ordering::SeqCst) {
            ResourceSample {
                cpu_percent: 99.0,
                memory_percent: 99.0,
            }
        } else {
            ResourceSample {
                cpu_percent: 5.0,
                memory_percent: 20.0,
            }
        }
    }
}

struct Fixture {
    _tmp: tempfile::TempDir,
    root: StateRoot,
    clock: FakeClock,
    overloaded: Arc<AtomicBool>,
}

impl Fixture {
    fn new() -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let root = StateRoot::new(tmp.path());
        Self {
            _tmp: tmp,
            root,
            clock: FakeClock::new(),
            overloaded: Arc::new(AtomicBool::new(false)),
        }
    }

    fn open(&self) -> QueueManager<FakeClock, SequentialIdGen> {
        QueueManager::open_with(
            &self.root,
            QueueSettings::default(),
            self.clock.clone(),
            SequentialIdGen::new("item"),
            Box::new(FakeProbe {
                overloaded: Arc::clone(&self.overloaded),
            }),
        )
        .unwrap()
    }
}

#[test]
fn enqueue_persists_and_orders_by_priority() {
    let fx = Fixture::new();
    let mut queue = fx.open();
    queue.enqueue("a", Priority::Normal, None, None, 0).unwrap();
    fx.clock.advance(Duration::from_secs(1));
    queue.enqueue("b", Priority::High, None, None, 0).unwrap();
    fx.clock.advance(Duration::from_secs(1));
    queue.enqueue("c", Priority::Normal, None, None, 0).unwrap();

    let next = queue.get_next_ready().unwrap().unwrap();
    assert_eq!(next.name, "b");

    // Order survives a reopen from disk.
    drop(queue);
    let queue = fx.open();
    let status = queue.get_status();
    let names: Vec<&str> = status.queued.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(names, ["b", "a", "c"]);
}

#[test]
fn second_manager_cannot_open_while_lock_is_live() {
    let fx = Fixture::new();
    let _queue = fx.open();
    match fx.open_err() {
        QueueError::LockHeld { pid } => assert_eq!(pid, std::process::id()),
        other => panic!("unexpected: {other:?}"),
    }
}

impl Fixture {
    fn open_err(&self) -> QueueError {
        match QueueManager::open_with(
            &self.root,
            QueueSettings::default(),
            self.clock.clone(),
            SequentialIdGen::new("dup"),
            Box::new(FakeProbe {
                overloaded: Arc::clone(&self.overloaded),
            }),
        ) {
            Ok(_) => panic!("expected open to fail"),
            Err(e) => e,
        }
    }
}

#[test]
fn stale_lock_is_reclaimed_with_warning_event() {
    let fx = Fixture::new();
    fx.root.ensure().unwrap();
    // Pid that cannot be live: one beyond the maximum.
    std::fs::write(fx.root.lock_file(), "4194305").unwrap();

    let queue = fx.open();
    let events = queue.event_log().read_all().unwrap();
    assert!(events
        .iter()
        .any(|e| e["event"] == "stale_lock_reclaimed" && e["pid"] == 4194305));
    let content = std::fs::read_to_string(fx.root.lock_file()).unwrap();
    assert_eq!(content, std::process::id().to_string());
}

#[test]
fn lock_released_on_drop() {
    let fx = Fixture::new();
    let queue = fx.open();
    assert!(fx.root.lock_file().exists());
    drop(queue);
    assert!(!fx.root.lock_file().exists());
    // Re-acquisition now succeeds.
    let _again = fx.open();
}

#[test]
fn corrupt_queue_file_is_archived_and_logged() {
    let fx = Fixture::new();
    fx.root.ensure().unwrap();
    std::fs::write(fx.root.queue_file(), "{ broken").unwrap();

    let queue = fx.open();
    assert!(queue.get_status().queued.is_empty());

    let archived = std::fs::read_dir(fx.root.dir())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with("queue.corrupt-"))
        .count();
    assert_eq!(archived, 1);
    let events = queue.event_log().read_all().unwrap();
    assert!(events.iter().any(|e| e["event"] == "queue_corrupt_archived"));
}

#[test]
fn missing_queue_file_loads_empty() {
    let fx = Fixture::new();
    let queue = fx.open();
    let status = queue.get_status();
    assert!(status.running.is_none());
    assert!(status.queued.is_empty());
}

#[test]
fn running_lifecycle_success() {
    let fx = Fixture::new();
    let mut queue = fx.open();
    let item = queue.enqueue("alpha", Priority::Normal, None, None, 0).unwrap();

    let running = queue.mark_running(&item.id, 4242).unwrap();
    assert_eq!(running.pid, 4242);
    let status = queue.get_status();
    assert!(status.queued.is_empty());
    assert_eq!(status.running.as_ref().map(|r| r.id.as_str()), Some(item.id.as_str()));

    queue
        .mark_completed(&item.id, json!({"duration": 0.5}))
        .unwrap();
    let status = queue.get_status();
    assert!(status.running.is_none());
    assert_eq!(status.completed_recent.len(), 1);
    assert_eq!(status.completed_recent[0].name, "alpha");
}

#[test]
fn mark_running_unknown_id_fails() {
    let fx = Fixture::new();
    let mut queue = fx.open();
    assert!(matches!(
        queue.mark_running("nope", 1),
        Err(QueueError::NotQueued(_))
    ));
}

#[test]
fn mark_completed_requires_matching_running_id() {
    let fx = Fixture::new();
    let mut queue = fx.open();
    let item = queue.enqueue("alpha", Priority::Normal, None, None, 0).unwrap();
    queue.mark_running(&item.id, 1).unwrap();
    assert!(matches!(
        queue.mark_completed("other", json!({})),
        Err(QueueError::NotRunning(_))
    ));
    // The running record is preserved after the failed call.
    assert!(queue.get_status().running.is_some());
}

#[test]
fn only_one_task_runs_at_a_time() {
    let fx = Fixture::new();
    let mut queue = fx.open();
    let first = queue.enqueue("a", Priority::Normal, None, None, 0).unwrap();
    let second = queue.enqueue("b", Priority::Normal, None, None, 0).unwrap();
    queue.mark_running(&first.id, 1).unwrap();
    assert!(matches!(
        queue.mark_running(&second.id, 2),
        Err(QueueError::AlreadyRunning)
    ));
}

#[test]
fn requeue_with_delay_increments_attempt_and_delays() {
    let fx = Fixture::new();
    let mut queue = fx.open();
    let item = queue.enqueue("beta", Priority::Normal, None, None, 0).unwrap();
    queue.mark_running(&item.id, 7).unwrap();
    queue.mark_failed(&item.id, json!({"error": "timeout"})).unwrap();
    queue.requeue_with_delay(item, 2).unwrap();

    // Not yet eligible.
    assert!(queue.get_next_ready().unwrap().is_none());

    fx.clock.advance(Duration::from_secs(3));
    let retried = queue.get_next_ready().unwrap().unwrap();
    assert_eq!(retried.name, "beta");
    assert_eq!(retried.attempt, 1);
    assert_eq!(retried.metadata["attempt"], 1);
}

#[test]
fn cancel_is_idempotent() {
    let fx = Fixture::new();
    let mut queue = fx.open();
    let item = queue.enqueue("alpha", Priority::Normal, None, None, 0).unwrap();
    assert!(queue.cancel(&item.id).unwrap());
    assert!(!queue.cancel(&item.id).unwrap());
}

#[test]
fn clear_queue_leaves_running_untouched() {
    let fx = Fixture::new();
    let mut queue = fx.open();
    let item = queue.enqueue("a", Priority::Normal, None, None, 0).unwrap();
    queue.mark_running(&item.id, 1).unwrap();
    queue.enqueue("b", Priority::Normal, None, None, 0).unwrap();
    queue.clear_queue().unwrap();

    let status = queue.get_status();
    assert!(status.queued.is_empty());
    assert!(status.running.is_some());
}

#[test]
fn resource_gate_defers_ready_items() {
    let fx = Fixture::new();
    let mut queue = fx.open();
    queue.enqueue("alpha", Priority::Normal, None, None, 0).unwrap();

    fx.overloaded.store(true, Ordering::SeqCst);
    assert!(queue.get_next_ready().unwrap().is_none());

    fx.overloaded.store(false, Ordering::SeqCst);
    assert!(queue.get_next_ready().unwrap().is_some());
}

#[test]
fn resource_notice_is_throttled_to_one_per_interval() {
    let fx = Fixture::new();
    let mut queue = fx.open();
    queue.enqueue("alpha", Priority::Normal, None, None, 0).unwrap();
    fx.overloaded.store(true, Ordering::SeqCst);

    for _ in 0..5 {
        assert!(queue.get_next_ready().unwrap().is_none());
    }
    let notices = queue
        .event_log()
        .read_all()
        .unwrap()
        .iter()
        .filter(|e| e["event"] == "resources_exceeded")
        .count();
    assert_eq!(notices, 1);

    fx.clock.advance(Duration::from_secs(31));
    assert!(queue.get_next_ready().unwrap().is_none());
    let notices = queue
        .event_log()
        .read_all()
        .unwrap()
        .iter()
        .filter(|e| e["event"] == "resources_exceeded")
        .count();
    assert_eq!(notices, 2);
}

#[test]
fn validate_state_reports_clean_queue() {
    let fx = Fixture::new();
    let mut queue = fx.open();
    queue.enqueue("alpha", Priority::Normal, None, None, 0).unwrap();
    let (ok, errors) = queue.validate_state();
    assert!(ok);
    assert!(errors.is_empty());
}

#[test]
fn lockfile_status_reports_live_stale_and_absent() {
    let fx = Fixture::new();
    assert_eq!(
        lockfile_status(&fx.root),
        LockStatus {
            locked: false,
            pid: None,
            stale: false
        }
    );

    let queue = fx.open();
    let status = lockfile_status(&fx.root);
    assert!(status.locked);
    assert_eq!(status.pid, Some(std::process::id()));
    assert!(!status.stale);
    drop(queue);

    fx.root.ensure().unwrap();
    std::fs::write(fx.root.lock_file(), "4194305").unwrap();
    let status = lockfile_status(&fx.root);
    assert!(status.locked && status.stale);
}
