// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-(task, path) debouncing on monotonic time.
//!
//! The filesystem event source dispatches handlers on its own worker thread,
//! so the last-emitted map sits behind a mutex.

use clodputer_core::{Clock, SystemClock};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

pub struct Debouncer<C: Clock = SystemClock> {
    clock: C,
    last_emitted: Mutex<HashMap<(String, PathBuf), Instant>>,
}

impl Debouncer<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for Debouncer<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> Debouncer<C> {
    pub fn with_clock(clock: C) -> Self {
        Self {
            clock,
            last_emitted: Mutex::new(HashMap::new()),
        }
    }

    /// Whether an event for this key may be emitted now. A first event
    /// always passes; later ones pass once `window` has elapsed since the
    /// last emission. Passing updates the emission time.
    pub fn should_emit(&self, task: &str, path: &Path, window: Duration) -> bool {
        let key = (task.to_string(), path.to_path_buf());
        let now = self.clock.now();
        let mut last_emitted = self.last_emitted.lock();
        if let Some(last) = last_emitted.get(&key) {
            if now.duration_since(*last) < window {
                return false;
            }
        }
        last_emitted.insert(key, now);
        true
    }
}

#[cfg(test)]
#[path = "debounce_tests.rs"]
mod tests;
