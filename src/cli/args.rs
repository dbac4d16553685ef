//! cli::args
//!
//! Command-line argument definitions using clap derive.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// gitrun - a bulk Git repository operations engine.
#[derive(Parser, Debug)]
#[command(name = "gitrun")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable debug logging.
    #[arg(long, global = true)]
    pub debug: bool,

    /// Minimal output.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Progress sink selection (spec §4.10).
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProgressFormat {
    /// One line per event; the default for a non-interactive run.
    #[default]
    Console,
    /// One line per repo, summarizing its terminal state.
    Compact,
    /// One JSON object per event on stdout.
    Json,
    /// Discard every event.
    Null,
}

/// Mutation strategy, as accepted on the command line (mirrors
/// [`crate::config::schema::Strategy`]).
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyArg {
    Reset,
    Pull,
    Fetch,
    Rebase,
    #[value(name = "clone-fresh")]
    CloneFresh,
    Skip,
}

impl From<StrategyArg> for crate::config::schema::Strategy {
    fn from(value: StrategyArg) -> Self {
        use crate::config::schema::Strategy as S;
        match value {
            StrategyArg::Reset => S::Reset,
            StrategyArg::Pull => S::Pull,
            StrategyArg::Fetch => S::Fetch,
            StrategyArg::Rebase => S::Rebase,
            StrategyArg::CloneFresh => S::CloneFresh,
            StrategyArg::Skip => S::Skip,
        }
    }
}

/// Shell for completion script generation.
pub use clap_complete::Shell;

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build and print the plan for a manifest without executing it.
    Plan {
        /// Path to the manifest. Discovered from the current directory
        /// upward when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Directory target paths are resolved relative to. Defaults to the
        /// manifest's own directory.
        #[arg(long)]
        base_dir: Option<PathBuf>,

        /// Emit the plan as JSON instead of a human-readable table.
        #[arg(long)]
        json: bool,
    },

    /// Execute the plan for a manifest: clone/update every declared
    /// repository under bounded parallelism.
    Run {
        /// Path to the manifest. Discovered from the current directory
        /// upward when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Directory target paths are resolved relative to. Defaults to the
        /// manifest's own directory.
        #[arg(long)]
        base_dir: Option<PathBuf>,

        /// Worker pool width. Overrides the manifest's `parallel`.
        #[arg(long)]
        parallel: Option<u32>,

        /// Maximum retry attempts per action. Overrides the manifest's
        /// `maxRetries`.
        #[arg(long)]
        max_retries: Option<u32>,

        /// Preview actions without mutating any working tree.
        #[arg(long)]
        dry_run: bool,

        /// Override every repo's strategy for this run.
        #[arg(long, value_enum)]
        strategy: Option<StrategyArg>,

        /// Path to a state file for resume support. Actions already recorded
        /// as terminal-success are skipped.
        #[arg(long)]
        state: Option<PathBuf>,

        /// How progress events are rendered.
        #[arg(long, value_enum, default_value = "console")]
        progress: ProgressFormat,

        /// Force `clone-fresh` to proceed even when the target directory is
        /// dirty.
        #[arg(long)]
        force: bool,
    },

    /// Inspect one or more existing working trees and print their health.
    Status {
        /// Repository paths to inspect. When omitted, every directory passed
        /// via `--root` is scanned and every discovered repo is inspected.
        paths: Vec<PathBuf>,

        /// Root directories to scan for repos when no explicit paths are given.
        #[arg(long = "root")]
        roots: Vec<PathBuf>,

        /// Skip the inspection-time `fetch` (faster, offline-safe, but
        /// ahead/behind counts may be stale).
        #[arg(long)]
        skip_fetch: bool,

        /// Emit one JSON object per repo instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Scan one or more root directories for existing Git working trees.
    Discover {
        /// Root directories to scan.
        roots: Vec<PathBuf>,

        /// Only descend into directories matching one of these globs.
        #[arg(long = "include")]
        include: Vec<String>,

        /// Never descend into directories matching one of these globs.
        #[arg(long = "exclude")]
        exclude: Vec<String>,

        /// Maximum descent depth below each root.
        #[arg(long)]
        max_depth: Option<usize>,

        /// Emit discovered repos as JSON instead of one path per line.
        #[arg(long)]
        json: bool,
    },

    /// Manage stored forge tokens.
    Auth {
        #[command(subcommand)]
        action: AuthAction,
    },

    /// Generate shell completion scripts.
    Completion {
        /// Target shell.
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// `gitrun auth` subcommands.
#[derive(Subcommand, Debug)]
pub enum AuthAction {
    /// Store a token under a named key.
    Set {
        /// Key the token is stored under, e.g. `github`.
        key: String,
        /// Token value. Read from stdin when omitted.
        token: Option<String>,
        /// Secret store provider: `file` (default) or `keychain`.
        #[arg(long, default_value = "file")]
        provider: String,
    },
    /// Print whether a token is present for a key (never the token itself).
    Status {
        key: String,
        #[arg(long, default_value = "file")]
        provider: String,
    },
    /// Remove a stored token.
    Delete {
        key: String,
        #[arg(long, default_value = "file")]
        provider: String,
    },
}
