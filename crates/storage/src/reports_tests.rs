// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::ReportWriter;
use crate::StateRoot;
use chrono::{TimeZone, Utc};
use serde_json::json;

#[test]
fn save_writes_json_and_markdown_pair() {
    let tmp = tempfile::tempdir().unwrap();
    let root = StateRoot::new(tmp.path());
    root.ensure().unwrap();
    let writer = ReportWriter::new(&root);

    let at = Utc.with_ymd_and_hms(2025, 6, 1, 8, 30, 0).unwrap();
    let report = json!({
        "task_id": "abc",
        "status": "success",
        "duration": 1.25,
        "return_code": 0,
        "output_json": {"ok": true},
    });
    let paths = writer.save("alpha", at, &report).unwrap();

    assert!(paths.json.ends_with("alpha/2025-06-01_08-30-00.json"));
    assert!(paths.markdown.ends_with("alpha/2025-06-01_08-30-00.md"));

    let stored: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&paths.json).unwrap()).unwrap();
    assert_eq!(stored, report);

    let markdown = std::fs::read_to_string(&paths.markdown).unwrap();
    assert!(markdown.contains("**Status:** SUCCESS"));
    assert!(markdown.contains("**Duration:** 1.25s"));
    assert!(markdown.contains("\"ok\": true"));
}

#[test]
fn failure_report_includes_error_section() {
    let tmp = tempfile::tempdir().unwrap();
    let root = StateRoot::new(tmp.path());
    root.ensure().unwrap();
    let writer = ReportWriter::new(&root);

    let at = Utc.with_ymd_and_hms(2025, 6, 1, 8, 30, 0).unwrap();
    let report = json!({"status": "timeout", "error": "timeout"});
    let paths = writer.save("beta", at, &report).unwrap();

    let markdown = std::fs::read_to_string(&paths.markdown).unwrap();
    assert!(markdown.contains("## Error"));
    assert!(markdown.contains("**Status:** TIMEOUT"));
}
