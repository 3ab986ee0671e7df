// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent CLI invocation: binary resolution, argv construction, and parsing
//! of the JSON the agent writes to stdout.

use clodputer_core::AgentSpec;
use clodputer_storage::EnvStore;
use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;

use crate::env;

/// Fallback binary name when nothing else resolves.
const DEFAULT_AGENT_BIN: &str = "claude";

/// Known install locations probed after `$PATH`.
fn install_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(home) = dirs_home() {
        candidates.push(home.join(".claude/local/claude"));
    }
    candidates.push(PathBuf::from("/opt/homebrew/bin/claude"));
    candidates
}

fn dirs_home() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}

/// Resolve the agent CLI executable.
///
/// Order of precedence: `CLODPUTER_CLAUDE_BIN`, the stored descriptor,
/// `$PATH`, known install locations, then the bare name. A fresh resolution
/// is written back to the descriptor so cron-launched runs skip the search.
pub fn resolve_agent_bin(env_store: &EnvStore) -> String {
    if let Some(explicit) = env::agent_bin_override() {
        return explicit;
    }
    if let Some(stored) = env_store.agent_cli() {
        return stored;
    }
    let found = which::which(DEFAULT_AGENT_BIN)
        .ok()
        .map(|path| path.to_string_lossy().into_owned())
        .or_else(|| {
            install_candidates()
                .into_iter()
                .find(|candidate| candidate.exists())
                .map(|path| path.to_string_lossy().into_owned())
        });
    match found {
        Some(path) => {
            if let Err(e) = env_store.store_agent_cli(&path) {
                debug!(error = %e, "could not store resolved agent CLI path");
            }
            path
        }
        None => DEFAULT_AGENT_BIN.to_string(),
    }
}

/// Build the full argv for one task run: program first, then the fixed flags
/// in wire order, then operator extra args.
pub fn build_command(binary: &str, agent: &AgentSpec) -> Vec<String> {
    let mut command = vec![
        binary.to_string(),
        "-p".to_string(),
        agent.prompt.clone(),
        "--output-format".to_string(),
        "json".to_string(),
    ];

    if !agent.allowed_tools.is_empty() {
        command.push("--allowed-tools".to_string());
        command.push(agent.allowed_tools.join(","));
    }
    if !agent.disallowed_tools.is_empty() {
        command.push("--blocked-tools".to_string());
        command.push(agent.disallowed_tools.join(","));
    }
    if let Some(mode) = agent.permission_mode {
        command.push("--permission-mode".to_string());
        command.push(mode.as_str().to_string());
    }
    if let Some(ref mcp_config) = agent.mcp_config {
        command.push("--mcp-config".to_string());
        command.push(expand_tilde(mcp_config));
    }

    command.extend(env::extra_args());
    command
}

/// `~/x` → `<home>/x`; anything else passes through.
pub fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs_home() {
            return home.join(rest).to_string_lossy().into_owned();
        }
    }
    path.to_string()
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OutputParseError {
    #[error("agent produced no stdout")]
    Empty,
    #[error("invalid JSON: {0}")]
    Invalid(String),
}

/// Parse the agent's stdout as JSON.
///
/// Tolerates a surrounding triple-backtick fence: the opening fence line
/// (with an optional language tag) and trailing fence lines are stripped
/// before parsing.
pub fn extract_json(stdout: &str) -> Result<serde_json::Value, OutputParseError> {
    let mut text = stdout.trim();
    if text.is_empty() {
        return Err(OutputParseError::Empty);
    }

    let stripped;
    if text.starts_with("```") {
        let mut lines: Vec<&str> = text.lines().collect();
        lines.remove(0);
        while lines.last().is_some_and(|line| line.trim() == "```") {
            lines.pop();
        }
        stripped = lines.join("\n");
        text = stripped.trim();
    }

    serde_json::from_str(text).map_err(|e| OutputParseError::Invalid(e.to_string()))
}

#[cfg(test)]
#[path = "agent_cli_tests.rs"]
mod tests;
