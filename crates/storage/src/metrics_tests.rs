// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::MetricsStore;
use crate::StateRoot;

fn store() -> (tempfile::TempDir, MetricsStore) {
    let tmp = tempfile::tempdir().unwrap();
    let root = StateRoot::new(tmp.path());
    root.ensure().unwrap();
    (tmp, MetricsStore::new(&root))
}

#[test]
fn counters_accumulate() {
    let (_tmp, metrics) = store();
    metrics.record_success("alpha", 2.0).unwrap();
    metrics.record_success("alpha", 4.0).unwrap();
    metrics.record_failure("alpha").unwrap();

    let stats = metrics.get("alpha").unwrap().unwrap();
    assert_eq!(stats.success, 2);
    assert_eq!(stats.failure, 1);
    assert!((stats.total_duration - 6.0).abs() < f64::EPSILON);
}

#[test]
fn summary_orders_by_total_and_averages_over_successes() {
    let (_tmp, metrics) = store();
    metrics.record_success("quiet", 1.0).unwrap();
    metrics.record_success("busy", 3.0).unwrap();
    metrics.record_failure("busy").unwrap();
    metrics.record_failure("busy").unwrap();

    let summary = metrics.summary().unwrap();
    assert_eq!(summary[0].name, "busy");
    assert_eq!(summary[0].total, 3);
    assert!((summary[0].avg_duration - 3.0).abs() < f64::EPSILON);
    assert_eq!(summary[1].name, "quiet");
}

#[test]
fn unknown_task_has_no_metrics() {
    let (_tmp, metrics) = store();
    assert!(metrics.get("ghost").unwrap().is_none());
    assert!(metrics.summary().unwrap().is_empty());
}

#[test]
fn failure_only_task_has_zero_average() {
    let (_tmp, metrics) = store();
    metrics.record_failure("flaky").unwrap();
    let summary = metrics.summary().unwrap();
    assert_eq!(summary[0].failure, 1);
    assert_eq!(summary[0].avg_duration, 0.0);
}
