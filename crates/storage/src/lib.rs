// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! clodputer-storage: every on-disk document under the state root

mod atomic;
mod env_store;
mod event_log;
mod metrics;
mod paths;
mod reports;
mod state;
mod task_state;

pub use atomic::{load_or_archive, write_atomic, StoreError};
pub use env_store::EnvStore;
pub use event_log::{EventLog, EventLogError, ARCHIVE_RETAIN_COUNT, MAX_LOG_SIZE};
pub use metrics::{MetricsStore, TaskMetrics, TaskMetricsSummary};
pub use paths::StateRoot;
pub use reports::{ReportPaths, ReportWriter};
pub use state::{StateFileError, StateFiles, MAX_STATE_SIZE};
pub use task_state::{TaskState, TaskStateStore};
