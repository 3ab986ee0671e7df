// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Host crontab access.
//!
//! The table is read and written through the `crontab` utility so the host
//! daemon sees changes immediately. Calls carry a timeout; a hung `crontab`
//! must not wedge the runtime.

use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

const CRONTAB_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum CrontabError {
    #[error("crontab utility not found")]
    NotFound,
    #[error("failed to read crontab: {0}")]
    ReadFailed(String),
    #[error("failed to install crontab: {0}")]
    WriteFailed(String),
    #[error("crontab {verb} timed out after {seconds}s")]
    Timeout { verb: &'static str, seconds: u64 },
}

fn crontab_bin() -> Result<std::path::PathBuf, CrontabError> {
    which::which("crontab").map_err(|_| CrontabError::NotFound)
}

/// Current table contents. A user with no crontab yet reads as empty.
pub async fn read_crontab() -> Result<String, CrontabError> {
    let bin = crontab_bin()?;
    let output = tokio::time::timeout(
        CRONTAB_TIMEOUT,
        Command::new(bin).arg("-l").output(),
    )
    .await
    .map_err(|_| CrontabError::Timeout {
        verb: "read",
        seconds: CRONTAB_TIMEOUT.as_secs(),
    })?
    .map_err(|e| CrontabError::ReadFailed(e.to_string()))?;

    if output.status.success() {
        return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    if stderr.to_lowercase().contains("no crontab for") {
        Ok(String::new())
    } else {
        Err(CrontabError::ReadFailed(stderr.trim().to_string()))
    }
}

/// Replace the table wholesale via `crontab -`.
pub async fn write_crontab(content: &str) -> Result<(), CrontabError> {
    let bin = crontab_bin()?;
    let write = async {
        let mut child = Command::new(bin)
            .arg("-")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| CrontabError::WriteFailed(e.to_string()))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(content.as_bytes())
                .await
                .map_err(|e| CrontabError::WriteFailed(e.to_string()))?;
        }

        child
            .wait_with_output()
            .await
            .map_err(|e| CrontabError::WriteFailed(e.to_string()))
    };

    let output = tokio::time::timeout(CRONTAB_TIMEOUT, write)
        .await
        .map_err(|_| CrontabError::Timeout {
            verb: "write",
            seconds: CRONTAB_TIMEOUT.as_secs(),
        })??;

    if output.status.success() {
        Ok(())
    } else {
        Err(CrontabError::WriteFailed(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ))
    }
}

#[cfg(test)]
#[path = "crontab_tests.rs"]
mod tests;
