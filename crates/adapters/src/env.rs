// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access.

/// Agent CLI binary override.
pub fn agent_bin_override() -> Option<String> {
    non_empty("CLODPUTER_CLAUDE_BIN")
}

/// Extra agent CLI arguments, shell-tokenised and appended after the fixed
/// flags. Unparseable values are ignored with a warning.
pub fn extra_args() -> Vec<String> {
    let Some(raw) = non_empty("CLODPUTER_EXTRA_ARGS") else {
        return Vec::new();
    };
    match shlex::split(&raw) {
        Some(args) => args,
        None => {
            tracing::warn!(value = %raw, "CLODPUTER_EXTRA_ARGS is not shell-parseable; ignoring");
            Vec::new()
        }
    }
}

/// Raw extra-args value, needed verbatim for cron env bindings.
pub fn extra_args_raw() -> Option<String> {
    non_empty("CLODPUTER_EXTRA_ARGS")
}

/// Tracing filter override for the internal logger (default `info`).
pub fn log_filter() -> String {
    non_empty("CLODPUTER_LOG").unwrap_or_else(|| "info".to_string())
}

/// Watcher daemon binary override used by `watch start`.
pub fn watchd_binary() -> Option<String> {
    non_empty("CLODPUTER_WATCHD_BINARY")
}

fn non_empty(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|value| !value.is_empty())
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
