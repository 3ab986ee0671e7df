// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Host cron table integration.
//!
//! The runtime owns exactly one contiguous block of the user's crontab,
//! delimited by fixed sentinel lines. Nothing outside the block is modified
//! beyond normalising the trailing newline, and every mutation backs up the
//! prior table verbatim.

use chrono::Utc;
use clodputer_core::time_fmt::{backup_stamp, format_utc_seconds};
use clodputer_core::TaskRecord;
use clodputer_storage::StateRoot;
use regex::Regex;
use std::path::PathBuf;
use std::sync::OnceLock;
use thiserror::Error;
use tracing::info;

use clodputer_adapters::{crontab, process_running_by_name};

pub const CRON_SECTION_BEGIN: &str = "# >>> BEGIN CLODPUTER JOBS >>>";
pub const CRON_SECTION_END: &str = "# <<< END CLODPUTER JOBS <<<";
const CRON_SECTION_HEADER: &str = "# Managed by Clodputer. Do not edit manually.";

const CRON_MACROS: [&str; 7] = [
    "@yearly",
    "@annually",
    "@monthly",
    "@weekly",
    "@daily",
    "@midnight",
    "@hourly",
];

#[derive(Debug, Error)]
pub enum CronError {
    #[error("invalid cron expression '{expression}' for task {task}")]
    InvalidExpression { task: String, expression: String },
    #[error(transparent)]
    Crontab(#[from] crontab::CrontabError),
    #[error("failed to back up crontab: {0}")]
    Backup(std::io::Error),
}

/// Validate an expression against the union of 5/6-field syntax and the
/// macro set. `@reboot` is permitted as a field value only.
pub fn validate_cron_expression(expression: &str) -> bool {
    let expression = expression.trim();
    if expression.is_empty() {
        return false;
    }
    if CRON_MACROS.contains(&expression) {
        return true;
    }
    let fields: Vec<&str> = expression.split_whitespace().collect();
    if fields.len() != 5 && fields.len() != 6 {
        return false;
    }
    fields
        .iter()
        .all(|field| *field == "@reboot" || field_pattern().is_match(field))
}

// The literal pattern always compiles.
#[allow(clippy::unwrap_used)]
fn field_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(\*|\d+|\d+-\d+|\*/\d+|\d+(,\d+)*)(/(\d+))?$").unwrap())
}

/// Render the sentinel block for every enabled, scheduled task. Empty when
/// no task qualifies.
pub fn generate_cron_section(tasks: &[TaskRecord], root: &StateRoot) -> Result<String, CronError> {
    let jobs: Vec<&TaskRecord> = tasks.iter().filter(|task| task.is_scheduled()).collect();
    if jobs.is_empty() {
        return Ok(String::new());
    }

    let mut lines = vec![
        CRON_SECTION_BEGIN.to_string(),
        CRON_SECTION_HEADER.to_string(),
        format!("# Generated: {}", format_utc_seconds(Utc::now())),
    ];

    for task in jobs {
        let Some(schedule) = task.schedule.as_ref() else {
            continue;
        };
        if !validate_cron_expression(&schedule.expression) {
            return Err(CronError::InvalidExpression {
                task: task.name.clone(),
                expression: schedule.expression.clone(),
            });
        }

        lines.push(format!("# Task: {}", task.name));
        if let Some(ref timezone) = schedule.timezone {
            lines.push(format!("CRON_TZ={timezone}"));
        }
        lines.push(format!(
            "{} {}",
            schedule.expression,
            format_command(task, root)
        ));
        lines.push(String::new());
    }

    lines.push(CRON_SECTION_END.to_string());
    Ok(format!("{}\n", lines.join("\n").trim()))
}

/// `<env-bindings> <binary> run <name> [--priority high] >> <log> 2>&1`
fn format_command(task: &TaskRecord, root: &StateRoot) -> String {
    let mut parts: Vec<String> = Vec::new();

    if let Some(bin) = clodputer_adapters::env::agent_bin_override() {
        parts.push(format!("CLODPUTER_CLAUDE_BIN={}", shell_quote(&bin)));
    }
    if let Some(extra) = clodputer_adapters::env::extra_args_raw() {
        parts.push(format!("CLODPUTER_EXTRA_ARGS={}", shell_quote(&extra)));
    }

    parts.push(runtime_binary());
    parts.push("run".to_string());
    parts.push(task.name.clone());
    if task.priority == clodputer_core::Priority::High {
        parts.push("--priority high".to_string());
    }
    parts.push(format!(">> {} 2>&1", root.cron_log_file().display()));
    parts.join(" ")
}

fn runtime_binary() -> String {
    if let Ok(path) = which::which("clodputer") {
        return path.to_string_lossy().into_owned();
    }
    std::env::current_exe()
        .map(|path| path.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "clodputer".to_string())
}

fn shell_quote(value: &str) -> String {
    shlex::try_quote(value)
        .map(|quoted| quoted.into_owned())
        .unwrap_or_else(|_| format!("'{}'", value.replace('\'', "'\\''")))
}

/// Strip any existing sentinel block, preserving everything else and
/// normalising to a single trailing newline.
pub fn remove_existing_section(content: &str) -> String {
    let Some(begin) = content.find(CRON_SECTION_BEGIN) else {
        return normalise_trailing(content);
    };
    let Some(end_offset) = content[begin..].find(CRON_SECTION_END) else {
        return normalise_trailing(content);
    };
    let mut end = begin + end_offset + CRON_SECTION_END.len();
    if content[end..].starts_with('\n') {
        end += 1;
    }
    let mut cleaned = String::with_capacity(content.len());
    cleaned.push_str(&content[..begin]);
    cleaned.push_str(&content[end..]);
    normalise_trailing(&cleaned)
}

fn normalise_trailing(content: &str) -> String {
    let trimmed = content.trim_end_matches('\n');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{trimmed}\n")
    }
}

#[derive(Debug, Clone)]
pub struct InstallOutcome {
    pub installed: usize,
    pub backup: PathBuf,
    pub section_written: bool,
}

#[derive(Debug, Clone)]
pub struct UninstallOutcome {
    pub removed: bool,
    pub backup: Option<PathBuf>,
}

/// Install the block: back up, strip any prior block, append the fresh one.
/// Idempotent beyond the generation timestamp.
pub async fn install_cron_jobs(
    tasks: &[TaskRecord],
    root: &StateRoot,
) -> Result<InstallOutcome, CronError> {
    let section = generate_cron_section(tasks, root)?;
    let current = crontab::read_crontab().await?;
    let cleaned = remove_existing_section(&current);
    let backup = backup_crontab(root, &current)?;

    let new_content = if section.is_empty() {
        cleaned
    } else {
        format!("{cleaned}{section}")
    };
    crontab::write_crontab(&new_content).await?;

    let installed = tasks.iter().filter(|task| task.is_scheduled()).count();
    info!(installed, backup = %backup.display(), "installed cron jobs");
    Ok(InstallOutcome {
        installed,
        backup,
        section_written: !section.is_empty(),
    })
}

/// Remove the block. No-op when none is present.
pub async fn uninstall_cron_jobs(root: &StateRoot) -> Result<UninstallOutcome, CronError> {
    let current = crontab::read_crontab().await?;
    if !current.contains(CRON_SECTION_BEGIN) {
        return Ok(UninstallOutcome {
            removed: false,
            backup: None,
        });
    }
    let cleaned = remove_existing_section(&current);
    let backup = backup_crontab(root, &current)?;
    crontab::write_crontab(&cleaned).await?;
    info!(backup = %backup.display(), "removed cron jobs");
    Ok(UninstallOutcome {
        removed: true,
        backup: Some(backup),
    })
}

/// Whether the sentinel block is currently present.
pub async fn cron_section_present() -> bool {
    match crontab::read_crontab().await {
        Ok(current) => {
            current.contains(CRON_SECTION_BEGIN) && current.contains(CRON_SECTION_END)
        }
        Err(_) => false,
    }
}

/// Whether a time-based job scheduler daemon is running on the host.
pub fn is_cron_daemon_running() -> bool {
    process_running_by_name(&["cron", "crond"])
}

fn backup_crontab(root: &StateRoot, content: &str) -> Result<PathBuf, CronError> {
    let dir = root.backups_dir();
    std::fs::create_dir_all(&dir).map_err(CronError::Backup)?;
    let path = dir.join(format!("crontab-{}.bak", backup_stamp(Utc::now())));
    std::fs::write(&path, content).map_err(CronError::Backup)?;
    Ok(path)
}

#[cfg(test)]
#[path = "cron_tests.rs"]
mod tests;
