// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `parbuild`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "parbuild",
    version,
    about = "Run build steps in parallel, respecting dependencies and resource budgets.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the task graph (TOML).
    #[arg(long, value_name = "PATH", default_value = "Parbuild.toml")]
    pub config: String,

    /// Worker-slot ceiling (overrides `[scheduler].max_workers`).
    #[arg(long, value_name = "N")]
    pub max_workers: Option<u32>,

    /// Memory ceiling in MiB (overrides `[scheduler].max_memory_mb`).
    #[arg(long, value_name = "MB")]
    pub max_memory_mb: Option<u64>,

    /// Maximum tasks running at once (overrides
    /// `[scheduler].max_concurrent_tasks`).
    #[arg(long, value_name = "N")]
    pub max_concurrent_tasks: Option<usize>,

    /// Default per-task timeout, e.g. `30m` (overrides
    /// `[scheduler].task_timeout`).
    #[arg(long, value_name = "DURATION")]
    pub task_timeout: Option<String>,

    /// Write the final run report as JSON to this path.
    #[arg(long, value_name = "PATH")]
    pub report: Option<String>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `PARBUILD_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the tasks in dependency order, but don't
    /// execute anything.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
