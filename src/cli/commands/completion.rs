//! cli::commands::completion
//!
//! `gitrun completion`: emit a shell completion script to stdout via
//! `clap_complete`, generated directly from the [`crate::cli::args::Cli`]
//! definition so it can never drift from the actual argument surface.

use anyhow::Result;
use clap::CommandFactory;
use clap_complete::{generate, Shell};

use crate::cli::args::Cli;

pub fn run(shell: Shell) -> Result<i32> {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, &mut std::io::stdout());
    Ok(0)
}
