//! cli::commands::run
//!
//! `gitrun run`: resolve a manifest, build a plan, and execute it under the
//! orchestrator's bounded worker pool (spec §4.8). Exit code follows the
//! terminal [`crate::run::RunReport`]: 1 if any action failed, 130 if the run
//! was cancelled (Ctrl-C), 0 otherwise.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

use super::common::{build_plan_for, locate_manifest, resolve_manifest};
use crate::cli::args::{ProgressFormat, StrategyArg};
use crate::config::schema::Strategy;
use crate::git::GitExecutor;
use crate::repo::strategy::StrategyOptions;
use crate::run::{state_store, CompactSink, ConsoleSink, JsonSink, NullSink, Orchestrator, ProgressSink, RunOptions};

#[allow(clippy::too_many_arguments)]
pub async fn run(
    config: Option<PathBuf>,
    base_dir: Option<PathBuf>,
    parallel: Option<u32>,
    max_retries: Option<u32>,
    dry_run: bool,
    strategy: Option<StrategyArg>,
    state: Option<PathBuf>,
    progress: ProgressFormat,
    force: bool,
) -> Result<i32> {
    let manifest_path = locate_manifest(config.as_deref())?;
    let mut resolved = resolve_manifest(&manifest_path, base_dir.as_deref()).await?;

    if let Some(strategy_arg) = strategy {
        let strategy: Strategy = strategy_arg.into();
        resolved.default_strategy = strategy;
        for spec in &mut resolved.repositories {
            spec.strategy = Some(strategy);
        }
    }

    let plan = build_plan_for(&resolved)?;

    let git = GitExecutor::new();
    let orchestrator = Orchestrator::new(git);

    let run_options = RunOptions {
        base_dir: resolved.base_dir.clone(),
        parallel: parallel.map(|p| p as usize).unwrap_or(resolved.parallel as usize).max(1),
        max_retries: max_retries.unwrap_or_else(|| resolved.max_retries.max(0) as u32),
        dry_run,
        strategy_options: StrategyOptions {
            force,
            discard_untracked: false,
        },
        ..RunOptions::default()
    };

    let mut run_state = match &state {
        Some(path) => state_store::load(path),
        None => state_store::RunState::default(),
    };

    let sink: Arc<dyn ProgressSink> = match progress {
        ProgressFormat::Console => Arc::new(ConsoleSink::stdout()),
        ProgressFormat::Compact => Arc::new(CompactSink::stdout()),
        ProgressFormat::Json => Arc::new(JsonSink::stdout()),
        ProgressFormat::Null => Arc::new(NullSink),
    };

    let cancel = CancellationToken::new();
    let cancel_for_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel_for_signal.cancel();
        }
    });

    let report = orchestrator
        .run(&plan, &run_options, &mut run_state, state.as_deref(), sink, &cancel)
        .await;

    if let Some(path) = &state {
        state_store::save(path, &run_state).context("failed to persist run state")?;
    }

    print_summary(&report);

    if report.cancelled {
        Ok(130)
    } else if report.has_failures() {
        Ok(1)
    } else {
        Ok(0)
    }
}

fn print_summary(report: &crate::run::RunReport) {
    let succeeded = report.succeeded().count();
    let skipped = report.skipped().count();
    let failed = report.failed().count();
    let conflicted = report.conflicted().count();
    println!("\n{succeeded} succeeded, {skipped} skipped, {failed} failed, {conflicted} conflicted");
    if report.cancelled {
        println!("run cancelled; {} action(s) were not started", report.not_started.len());
    }
}
