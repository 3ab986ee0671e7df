// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only JSONL execution log with size-based rotation.
//!
//! Records gain a millisecond-precision `timestamp` on write. When the live
//! file exceeds [`MAX_LOG_SIZE`] it is renamed to `archive/<YYYY-MM>.log`
//! (falling back to a second-resolution stamp when that name is taken) and
//! archives beyond [`ARCHIVE_RETAIN_COUNT`] are deleted oldest first.

use chrono::{DateTime, Utc};
use clodputer_core::time_fmt::{archive_stamp, format_utc_millis, month_label};
use clodputer_core::{Clock, LogEvent, SystemClock};
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, warn};

use crate::StateRoot;

pub const MAX_LOG_SIZE: u64 = 10 * 1024 * 1024;
pub const ARCHIVE_RETAIN_COUNT: usize = 6;

#[derive(Debug, Error)]
pub enum EventLogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Writer/reader for `execution.log`.
#[derive(Clone)]
pub struct EventLog<C: Clock = SystemClock> {
    log_file: PathBuf,
    archive_dir: PathBuf,
    clock: C,
}

impl EventLog<SystemClock> {
    pub fn new(root: &StateRoot) -> Self {
        Self::with_clock(root, SystemClock)
    }
}

impl<C: Clock> EventLog<C> {
    pub fn with_clock(root: &StateRoot, clock: C) -> Self {
        Self {
            log_file: root.execution_log(),
            archive_dir: root.archive_dir(),
            clock,
        }
    }

    /// Append one event as a compact single-line record.
    pub fn append(&self, event: &LogEvent) -> Result<(), EventLogError> {
        self.rotate_if_needed()?;

        let mut record = serde_json::to_value(event)?;
        if let Value::Object(ref mut map) = record {
            map.insert(
                "timestamp".to_string(),
                Value::String(format_utc_millis(self.clock.now_utc())),
            );
        }

        if let Some(parent) = self.log_file.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_file)?;
        // One write call per record keeps lines atomic for small payloads.
        let mut line = serde_json::to_string(&record)?;
        line.push('\n');
        file.write_all(line.as_bytes())?;
        Ok(())
    }

    /// All parseable records, oldest first. Unparseable lines (e.g. a torn
    /// trailing write) are skipped.
    pub fn read_all(&self) -> Result<Vec<Value>, EventLogError> {
        if !self.log_file.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.log_file)?;
        Ok(content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect())
    }

    /// The most recent `limit` records, oldest first.
    pub fn tail(&self, limit: usize) -> Result<Vec<Value>, EventLogError> {
        let mut events = self.read_all()?;
        if events.len() > limit {
            events.drain(..events.len() - limit);
        }
        Ok(events)
    }

    fn rotate_if_needed(&self) -> Result<(), EventLogError> {
        let size = match fs::metadata(&self.log_file) {
            Ok(meta) => meta.len(),
            Err(_) => return Ok(()),
        };
        if size <= MAX_LOG_SIZE {
            return Ok(());
        }

        fs::create_dir_all(&self.archive_dir)?;
        let now = self.clock.now_utc();
        let destination = self.archive_destination(now);
        fs::rename(&self.log_file, &destination)?;
        debug!(archived_to = %destination.display(), "rotated execution log");
        self.prune_archives();
        Ok(())
    }

    /// `archive/<YYYY-MM>.log`, or a second-resolution stamp when the
    /// monthly archive already exists.
    fn archive_destination(&self, now: DateTime<Utc>) -> PathBuf {
        let monthly = self.archive_dir.join(format!("{}.log", month_label(now)));
        if monthly.exists() {
            self.archive_dir.join(format!("{}.log", archive_stamp(now)))
        } else {
            monthly
        }
    }

    fn prune_archives(&self) {
        let mut archives: Vec<(std::time::SystemTime, PathBuf)> = match fs::read_dir(
            &self.archive_dir,
        ) {
            Ok(entries) => entries
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.path())
                .filter(|path| path.extension().is_some_and(|ext| ext == "log"))
                .filter_map(|path| {
                    let modified = path.metadata().and_then(|m| m.modified()).ok()?;
                    Some((modified, path))
                })
                .collect(),
            Err(e) => {
                warn!(error = %e, "could not list log archives for pruning");
                return;
            }
        };

        // Newest first; everything past the retention count goes.
        archives.sort_by(|a, b| b.0.cmp(&a.0));
        for (_, stale) in archives.into_iter().skip(ARCHIVE_RETAIN_COUNT) {
            if let Err(e) = fs::remove_file(&stale) {
                warn!(path = %stale.display(), error = %e, "failed to prune archive");
            }
        }
    }
}

#[cfg(test)]
#[path = "event_log_tests.rs"]
mod tests;
