//! gitrun - A bulk Git repository operations engine
//!
//! gitrun computes a desired action for many repositories at once — discovered
//! by walking the filesystem, listed from a forge, or declared in a YAML
//! manifest — and executes those actions concurrently under a bounded worker
//! pool with retry, resume, dry-run, and progress reporting.
//!
//! # Architecture
//!
//! - [`git`] - Subprocess git executor and pure output parsers
//! - [`repo`] - Per-repository diagnostics (`inspect`) and mutation (`strategy`)
//! - [`config`] - Hierarchical YAML manifest loader with parent inheritance
//! - [`scan`] - Filesystem scanner that discovers working trees
//! - [`plan`] - Deterministic action planning from merged inputs
//! - [`run`] - The orchestrator: worker pool, state store, progress sink
//! - [`forge`] - Abstraction over remote hosting services (GitHub/GitLab/Gitea)
//! - [`secrets`] - Secret storage abstraction for forge tokens
//! - [`cli`] - Command-line interface layer
//!
//! # Correctness invariants
//!
//! 1. Every repository with a unique target path appears in exactly one action.
//! 2. All mutations flow through the strategy executor; nothing else touches
//!    a working tree.
//! 3. Dry runs never touch the filesystem under a target path.
//! 4. A resumed run never re-executes an action already recorded as terminal.

pub mod cli;
pub mod config;
pub mod forge;
pub mod git;
pub mod plan;
pub mod repo;
pub mod run;
pub mod scan;
pub mod secrets;
