//! cli::commands::status
//!
//! `gitrun status`: inspect one or more existing working trees and print
//! their health, without resolving any manifest.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

use crate::git::GitExecutor;
use crate::repo::inspect::{inspect, InspectOptions, RepoHealth};
use crate::scan::{self, ScanOptions};

pub async fn run(paths: Vec<PathBuf>, roots: Vec<PathBuf>, skip_fetch: bool, json: bool) -> Result<i32> {
    let targets = if !paths.is_empty() {
        paths
    } else if !roots.is_empty() {
        scan::scan_with_options(&roots, &ScanOptions::default())
            .context("failed to scan roots")?
            .into_iter()
            .map(|r| r.path)
            .collect()
    } else {
        vec![std::env::current_dir().context("failed to read current directory")?]
    };

    let git = GitExecutor::new();
    let opts = InspectOptions {
        skip_fetch,
        ..InspectOptions::default()
    };
    let cancel = CancellationToken::new();

    for path in &targets {
        let health = inspect(&git, path, &opts, &cancel)
            .await
            .with_context(|| format!("failed to inspect '{}'", path.display()))?;
        if json {
            print_json(path, &health);
        } else {
            print_line(path, &health);
        }
    }

    Ok(0)
}

fn print_line(path: &Path, health: &RepoHealth) {
    let rec = health.recommendation().unwrap_or("-");
    println!(
        "{:<40} {:<18} branch={:<20} ahead={:<3} behind={:<3} {}",
        path.display(),
        health.status.as_str(),
        health.branch,
        health.ahead_by,
        health.behind_by,
        rec,
    );
}

fn print_json(path: &Path, health: &RepoHealth) {
    let value = serde_json::json!({
        "path": path.display().to_string(),
        "status": health.status.as_str(),
        "branch": health.branch,
        "upstream": health.upstream,
        "ahead_by": health.ahead_by,
        "behind_by": health.behind_by,
        "modified_files": health.modified_files,
        "untracked_files": health.untracked_files,
        "conflict_files": health.conflict_files,
        "staged_files": health.staged_files,
        "network_reachable": health.network_reachable,
        "recommendation": health.recommendation(),
    });
    println!("{value}");
}
