// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Atomic JSON document persistence.
//!
//! Writes go to a sibling temp file which must parse back as JSON before the
//! rename; a write can therefore fail with a corruption error but can never
//! leave a half-written document behind. Loads sideline an unparseable file
//! as `<name>.corrupt-<stamp>` and continue with the default document.

use chrono::Utc;
use clodputer_core::time_fmt::backup_stamp;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("document failed verification before rename: {path}")]
    VerifyFailed { path: PathBuf },
    #[error("could not archive corrupt document {path}: {source}")]
    ArchiveFailed {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Write `value` to `path` atomically: temp sibling, parse-back verify,
/// fsync, rename.
pub fn write_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let serialized = to_pretty_sorted(value)?;
    let tmp_path = path.with_extension("tmp");

    {
        let mut file = File::create(&tmp_path)?;
        file.write_all(serialized.as_bytes())?;
        file.write_all(b"\n")?;
        file.sync_all()?;
    }

    // Verify readability before the atomic replace.
    let written = fs::read_to_string(&tmp_path)?;
    if serde_json::from_str::<serde_json::Value>(&written).is_err() {
        let _ = fs::remove_file(&tmp_path);
        return Err(StoreError::VerifyFailed {
            path: path.to_path_buf(),
        });
    }

    fs::rename(&tmp_path, path)?;
    debug!(path = %path.display(), "persisted document");
    Ok(())
}

/// Load `path`, or the default document when the file is missing.
///
/// An unparseable file is renamed to `<name>.corrupt-<stamp>` and replaced by
/// the default; the archive path is reported so callers can log an event.
/// This is a recovery, not a failure.
pub fn load_or_archive<T: DeserializeOwned + Default>(
    path: &Path,
) -> Result<(T, Option<PathBuf>), StoreError> {
    if !path.exists() {
        return Ok((T::default(), None));
    }

    let content = fs::read_to_string(path)?;
    match serde_json::from_str(&content) {
        Ok(value) => Ok((value, None)),
        Err(e) => {
            let corrupt_path = corrupt_sibling(path);
            warn!(
                error = %e,
                path = %path.display(),
                archived_to = %corrupt_path.display(),
                "corrupt document sidelined, starting fresh",
            );
            fs::rename(path, &corrupt_path).map_err(|source| StoreError::ArchiveFailed {
                path: path.to_path_buf(),
                source,
            })?;
            Ok((T::default(), Some(corrupt_path)))
        }
    }
}

/// Pretty JSON with lexically sorted keys at every map level.
pub fn to_pretty_sorted<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let value = serde_json::to_value(value)?;
    serde_json::to_string_pretty(&sort_keys(value))
}

fn sort_keys(value: serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let mut entries: Vec<(String, serde_json::Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let mut sorted = serde_json::Map::new();
            for (key, inner) in entries {
                sorted.insert(key, sort_keys(inner));
            }
            serde_json::Value::Object(sorted)
        }
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.into_iter().map(sort_keys).collect())
        }
        other => other,
    }
}

/// `queue.json` → `queue.corrupt-<stamp>`.
fn corrupt_sibling(path: &Path) -> PathBuf {
    let stamp = backup_stamp(Utc::now());
    let stem = path
        .file_stem()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    path.with_file_name(format!("{stem}.corrupt-{stamp}"))
}

#[cfg(test)]
#[path = "atomic_tests.rs"]
mod tests;
