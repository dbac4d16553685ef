//! repo
//!
//! Per-repository diagnostics and mutation.
//!
//! [`inspect`] classifies the state of an existing working tree without
//! mutating it. [`strategy`] is the only module allowed to mutate a working
//! tree, applying exactly one of the strategies the planner selected for it.
//! Both modules talk to git exclusively through [`crate::git::GitExecutor`].

pub mod inspect;
pub mod strategy;

pub use inspect::{InspectError, InspectOptions, RepoHealth, Status, WorktreeState};
pub use strategy::{StrategyError, StrategyExecutor};
