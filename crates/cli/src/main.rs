// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Clodputer CLI
//!
//! Thin command surface over the engine: run tasks, inspect the queue,
//! manage the cron block, and control the watcher daemon. Cron-installed
//! jobs invoke `clodputer run <task>` from here.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod commands;

use clap::{Parser, Subcommand};
use clodputer_storage::StateRoot;

#[derive(Parser)]
#[command(name = "clodputer", version, about = "Personal automation runtime for the Claude CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enqueue a task and drain the queue
    Run {
        /// Task name
        task: String,
        /// Queue priority
        #[arg(long, default_value = "normal")]
        priority: String,
        /// Enqueue without executing
        #[arg(long)]
        enqueue_only: bool,
    },
    /// Inspect or mutate the queue
    Queue {
        #[command(subcommand)]
        command: QueueCommands,
    },
    /// Manage the cron block for scheduled tasks
    Cron {
        #[command(subcommand)]
        command: CronCommands,
    },
    /// Control the file-watcher daemon
    Watch {
        #[command(subcommand)]
        command: WatchCommands,
    },
    /// Enqueue scheduled runs missed while the runtime was down
    CatchUp,
    /// Show recent execution log events
    Logs {
        /// Number of entries to display
        #[arg(long, default_value_t = 10)]
        tail: usize,
    },
}

#[derive(Subcommand)]
enum QueueCommands {
    /// Show the running task, queued items, and recent outcomes
    Status,
    /// Remove every queued item (the running task is untouched)
    Clear,
    /// Cancel one queued item by id
    Cancel { id: String },
}

#[derive(Subcommand)]
enum CronCommands {
    /// Install the managed block for all scheduled tasks
    Install,
    /// Remove the managed block
    Uninstall,
    /// Report block presence and host scheduler state
    Status,
}

#[derive(Subcommand)]
enum WatchCommands {
    /// Start the watcher daemon in the background
    Start,
    /// Stop the watcher daemon
    Stop,
    /// Report daemon liveness
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    setup_logging();
    let cli = Cli::parse();
    let root = StateRoot::from_env();
    root.ensure()?;

    match cli.command {
        Commands::Run {
            task,
            priority,
            enqueue_only,
        } => commands::run(&root, &task, &priority, enqueue_only).await,
        Commands::Queue { command } => match command {
            QueueCommands::Status => commands::queue_status(&root),
            QueueCommands::Clear => commands::queue_clear(&root),
            QueueCommands::Cancel { id } => commands::queue_cancel(&root, &id),
        },
        Commands::Cron { command } => match command {
            CronCommands::Install => commands::cron_install(&root).await,
            CronCommands::Uninstall => commands::cron_uninstall(&root).await,
            CronCommands::Status => commands::cron_status(&root).await,
        },
        Commands::Watch { command } => match command {
            WatchCommands::Start => commands::watch_start(&root),
            WatchCommands::Stop => commands::watch_stop(&root),
            WatchCommands::Status => commands::watch_status(&root),
        },
        Commands::CatchUp => commands::catch_up(&root),
        Commands::Logs { tail } => commands::logs(&root, tail),
    }
}

fn setup_logging() {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_new(clodputer_adapters::env::log_filter())
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}
