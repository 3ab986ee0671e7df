// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! clodputer-adapters: OS-facing side effects
//!
//! Process inspection and cleanup, agent CLI invocation, crontab access,
//! and centralized environment-variable access.

pub mod agent_cli;
pub mod crontab;
pub mod env;
pub mod process;

pub use agent_cli::{build_command, extract_json, resolve_agent_bin, OutputParseError};
pub use crontab::{read_crontab, write_crontab, CrontabError};
pub use process::{
    cleanup_process_tree, pid_alive, process_running_by_name, CleanupReport, DEFAULT_GRACE_PERIOD,
    ORPHAN_NAME_FRAGMENT,
};
