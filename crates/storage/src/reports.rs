// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-run execution reports under `outputs/<task>/`.
//!
//! Each run produces a JSON document with the full result and a markdown
//! summary beside it, named by a filename-safe timestamp.

use chrono::{DateTime, Utc};
use clodputer_core::time_fmt::report_stamp;
use serde_json::Value;
use std::fs;
use std::path::PathBuf;

use crate::{StateRoot, StoreError};

#[derive(Debug, Clone)]
pub struct ReportPaths {
    pub json: PathBuf,
    pub markdown: PathBuf,
}

#[derive(Clone)]
pub struct ReportWriter {
    outputs_dir: PathBuf,
}

impl ReportWriter {
    pub fn new(root: &StateRoot) -> Self {
        Self {
            outputs_dir: root.outputs_dir(),
        }
    }

    /// Write `<stamp>.json` and `<stamp>.md` for one run.
    pub fn save(
        &self,
        task_name: &str,
        at: DateTime<Utc>,
        report: &Value,
    ) -> Result<ReportPaths, StoreError> {
        let task_dir = self.outputs_dir.join(task_name);
        fs::create_dir_all(&task_dir)?;

        let stamp = report_stamp(at);
        let json_path = task_dir.join(format!("{stamp}.json"));
        fs::write(&json_path, serde_json::to_string_pretty(report)?)?;

        let markdown_path = task_dir.join(format!("{stamp}.md"));
        fs::write(&markdown_path, render_markdown(task_name, &stamp, report))?;

        Ok(ReportPaths {
            json: json_path,
            markdown: markdown_path,
        })
    }
}

fn render_markdown(task_name: &str, stamp: &str, report: &Value) -> String {
    let status = report["status"].as_str().unwrap_or("unknown");
    let mut lines = vec![
        "# Task Execution Report".to_string(),
        String::new(),
        format!("**Task:** {task_name}"),
        format!("**Status:** {}", status.to_uppercase()),
        format!("**Timestamp:** {stamp}"),
    ];
    if let Some(id) = report["task_id"].as_str() {
        lines.push(format!("**Task ID:** {id}"));
    }
    if let Some(duration) = report["duration"].as_f64() {
        lines.push(format!("**Duration:** {duration:.2}s"));
    }
    if let Some(code) = report["return_code"].as_i64() {
        lines.push(format!("**Return code:** {code}"));
    }
    if let Some(error) = report["error"].as_str() {
        lines.push(String::new());
        lines.push("## Error".to_string());
        lines.push(String::new());
        lines.push(error.to_string());
    }
    if report["output_json"].is_object() || report["output_json"].is_array() {
        lines.push(String::new());
        lines.push("## Output".to_string());
        lines.push(String::new());
        lines.push("```json".to_string());
        lines.push(
            serde_json::to_string_pretty(&report["output_json"]).unwrap_or_default(),
        );
        lines.push("```".to_string());
    }
    lines.push(String::new());
    lines.join("\n")
}

#[cfg(test)]
#[path = "reports_tests.rs"]
mod tests;
