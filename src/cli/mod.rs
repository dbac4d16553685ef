//! cli
//!
//! Command-line interface layer for gitrun.
//!
//! # Responsibilities
//!
//! - Parse command-line arguments and global flags
//! - Build a request struct and hand it to the library's engine
//! - Format and print results
//!
//! Per spec §1, the CLI surface itself is explicitly out of scope for the
//! core engine: this layer is a thin caller, never a second place that
//! touches a working tree. All mutation flows through
//! [`crate::repo::strategy::StrategyExecutor`] via [`crate::run::Orchestrator`].

pub mod args;
pub mod commands;

pub use args::Cli;

use anyhow::Result;

/// Run the CLI application, returning the process exit code (spec §6):
/// 0 success, 1 a run completed with failed actions, 2 configuration error,
/// 130 cancelled.
pub fn run() -> Result<i32> {
    let cli = Cli::parse_args();
    env_logger::Builder::new()
        .filter_level(if cli.debug { log::LevelFilter::Debug } else { log::LevelFilter::Info })
        .format_timestamp(None)
        .init();

    commands::dispatch(cli)
}
