// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

use crate::types::PlaceholderPolicy;

/// Command-line arguments for `plandag`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "plandag",
    version,
    about = "Run a decomposed task plan as a DAG of agent calls.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the plan document (JSON, or TOML with a `.toml` extension).
    #[arg(long, value_name = "PATH")]
    pub plan: String,

    /// Path to the config file (TOML).
    ///
    /// Default: `Plandag.toml` in the current working directory. A missing
    /// default file means built-in defaults.
    #[arg(long, value_name = "PATH")]
    pub config: Option<String>,

    /// Override `[executor].max_parallel_tasks`.
    #[arg(long, value_name = "N")]
    pub workers: Option<usize>,

    /// Override `[executor].placeholder_policy`.
    #[arg(long, value_enum, value_name = "POLICY")]
    pub placeholder_policy: Option<PolicyArg>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `PLANDAG_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Print execution events to stderr as JSON lines.
    #[arg(long)]
    pub events: bool,

    /// Parse + validate, print the plan layers, but don't call any agent.
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

#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum PolicyArg {
    Lenient,
    Strict,
}

impl From<PolicyArg> for PlaceholderPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Lenient => PlaceholderPolicy::Lenient,
            PolicyArg::Strict => PlaceholderPolicy::Strict,
        }
    }
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
