// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Timestamp formatting shared across persisted documents

use chrono::{DateTime, SecondsFormat, Utc};

/// RFC3339 UTC with second precision: `2025-06-01T08:30:00Z`.
///
/// This is the form stored in queue items, task state, and cron headers.
pub fn format_utc_seconds(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// RFC3339 UTC with millisecond precision, used by event-log records.
pub fn format_utc_millis(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse an RFC3339 timestamp, tolerating a bare `Z` suffix.
///
/// Returns `None` for empty or malformed input; callers treat missing
/// timestamps as "no constraint" rather than errors.
pub fn parse_utc(value: &str) -> Option<DateTime<Utc>> {
    if value.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Compact stamp for corrupt-file archives and crontab backups:
/// `20250601T083000`.
pub fn backup_stamp(at: DateTime<Utc>) -> String {
    at.format("%Y%m%dT%H%M%S").to_string()
}

/// Stamp used to disambiguate a same-month event-log archive collision.
pub fn archive_stamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H%M%S").to_string()
}

/// Month label for event-log archives: `2025-06`.
pub fn month_label(at: DateTime<Utc>) -> String {
    at.format("%Y-%m").to_string()
}

/// Stamp for per-run report files: `2025-06-01_08-30-00`.
pub fn report_stamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d_%H-%M-%S").to_string()
}

#[cfg(test)]
#[path = "time_fmt_tests.rs"]
mod tests;
