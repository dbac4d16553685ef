//! cli::commands::common
//!
//! Shared manifest discovery and plan-building logic used by the `plan` and
//! `run` commands: both need the same "locate a manifest, resolve it to a
//! flat repository list, scan what's already on disk, build a plan" pipeline,
//! differing only in what they do with the resulting [`Plan`].

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::config::schema::{RepoSpec, Strategy};
use crate::config::{self, manifest::Config};
use crate::plan::planner::{build_plan, Plan, PlanOptions};
use crate::scan::{self, ScanOptions};

/// A manifest resolved down to a flat repo list plus run-wide defaults,
/// regardless of whether it was declared `kind: repositories` or
/// `kind: workspace`.
pub struct ResolvedManifest {
    pub repositories: Vec<RepoSpec>,
    pub default_strategy: Strategy,
    pub parallel: u32,
    pub max_retries: i64,
    pub cleanup_orphans: bool,
    pub roots: Vec<PathBuf>,
    pub base_dir: PathBuf,
}

/// Find the manifest to use: the explicit `--config` path if given, otherwise
/// the nearest one found searching upward from the current directory.
pub fn locate_manifest(explicit: Option<&Path>) -> Result<PathBuf> {
    match explicit {
        Some(p) => Ok(p.to_path_buf()),
        None => {
            let cwd = std::env::current_dir().context("failed to read current directory")?;
            config::discover_manifest(&cwd)
                .context("no gitrun manifest found; pass --config or create a .gz-git.yaml")
        }
    }
}

/// Load `manifest_path` and resolve it to a flat [`ResolvedManifest`],
/// listing a forge or scanning a git-kind workspace as needed.
pub async fn resolve_manifest(manifest_path: &Path, base_dir_override: Option<&Path>) -> Result<ResolvedManifest> {
    let cfg = config::manifest::load(manifest_path)
        .with_context(|| format!("failed to load manifest '{}'", manifest_path.display()))?;

    let manifest_dir = manifest_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let base_dir = base_dir_override.map(Path::to_path_buf).unwrap_or_else(|| manifest_dir.clone());

    match cfg {
        Config::Repositories(repos_cfg) => Ok(ResolvedManifest {
            repositories: repos_cfg.repositories,
            default_strategy: repos_cfg.strategy,
            parallel: repos_cfg.parallel,
            max_retries: repos_cfg.max_retries,
            cleanup_orphans: repos_cfg.cleanup_orphans,
            roots: resolve_roots(&manifest_dir, &repos_cfg.roots),
            base_dir,
        }),
        Config::Workspace(ws_cfg) => {
            let repositories = config::resolve_workspace_config(&ws_cfg)
                .await
                .context("failed to resolve workspace")?;
            let roots = ws_cfg.workspaces.values().map(|w| w.path.clone()).collect();
            Ok(ResolvedManifest {
                repositories,
                default_strategy: Strategy::default(),
                parallel: ws_cfg.parallel,
                max_retries: 2,
                cleanup_orphans: false,
                roots,
                base_dir,
            })
        }
    }
}

fn resolve_roots(base_dir: &Path, roots: &[PathBuf]) -> Vec<PathBuf> {
    roots
        .iter()
        .map(|r| if r.is_absolute() { r.clone() } else { base_dir.join(r) })
        .collect()
}

/// Scan `resolved`'s roots for existing working trees and build a [`Plan`]
/// against them. Roots that don't exist yet are skipped rather than treated
/// as an error — a fresh checkout of an empty directory is the common case.
pub fn build_plan_for(resolved: &ResolvedManifest) -> Result<Plan> {
    let existing_roots: Vec<PathBuf> = resolved.roots.iter().filter(|r| r.is_dir()).cloned().collect();
    let scanned = if existing_roots.is_empty() {
        Vec::new()
    } else {
        scan::scan_with_options(&existing_roots, &ScanOptions::default()).context("failed to scan roots")?
    };

    let options = PlanOptions {
        default_strategy: resolved.default_strategy,
        cleanup_orphans: resolved.cleanup_orphans,
        roots: resolved.roots.clone(),
    };

    build_plan(resolved.repositories.clone(), &scanned, &resolved.base_dir, options).context("failed to build plan")
}
