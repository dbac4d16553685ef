//! run
//!
//! The Orchestrator (C8), State Store (C9), and Progress Sink (C10): the
//! component that turns a [`crate::plan::planner::Plan`] into a terminal
//! report, resuming from and checkpointing to disk as it goes.

pub mod orchestrator;
pub mod progress;
pub mod state_store;

pub use orchestrator::{Orchestrator, RunOptions, RunReport};
pub use progress::{CompactSink, ConsoleSink, JsonSink, NullSink, ProgressSink};
pub use state_store::{RunState, StateStoreError};
