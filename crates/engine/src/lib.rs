// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! clodputer-engine: queue manager, task executor, cron integration, catch-up

pub mod catch_up;
pub mod cron;
pub mod executor;
pub mod queue;
pub mod tasks;

pub use catch_up::{catch_up_missed, detect_missed_runs, next_expected_run, MissedRun};
pub use cron::{
    cron_section_present, generate_cron_section, install_cron_jobs, is_cron_daemon_running,
    remove_existing_section, uninstall_cron_jobs, validate_cron_expression, CronError,
    InstallOutcome, UninstallOutcome, CRON_SECTION_BEGIN, CRON_SECTION_END,
};
pub use executor::{ExecutionError, ExecutionResult, ExecutionStatus, TaskExecutor};
pub use queue::{
    lockfile_status, LockStatus, QueueError, QueueManager, QueueSettings, ResourceProbe,
    ResourceSample, StatusSnapshot, SysinfoProbe,
};
pub use tasks::{TaskDir, TaskSource, TaskSourceError};
