//! cli::commands
//!
//! Per-subcommand handlers. [`dispatch`] is the single entry point `cli::run`
//! calls after parsing; each handler returns the process exit code it wants
//! (spec §6), and `dispatch` builds the one Tokio runtime the whole process
//! uses to drive them.

mod auth;
mod common;
mod completion;
mod discover;
mod plan;
mod run;
mod status;

use anyhow::{Context, Result};

use super::args::{Cli, Command};

/// Run the subcommand selected on the command line.
pub fn dispatch(cli: Cli) -> Result<i32> {
    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;

    match cli.command {
        Command::Plan { config, base_dir, json } => runtime.block_on(plan::run(config, base_dir, json)),
        Command::Run {
            config,
            base_dir,
            parallel,
            max_retries,
            dry_run,
            strategy,
            state,
            progress,
            force,
        } => runtime.block_on(run::run(
            config, base_dir, parallel, max_retries, dry_run, strategy, state, progress, force,
        )),
        Command::Status {
            paths,
            roots,
            skip_fetch,
            json,
        } => runtime.block_on(status::run(paths, roots, skip_fetch, json)),
        Command::Discover {
            roots,
            include,
            exclude,
            max_depth,
            json,
        } => discover::run(roots, include, exclude, max_depth, json),
        Command::Auth { action } => auth::run(action),
        Command::Completion { shell } => completion::run(shell),
    }
}
