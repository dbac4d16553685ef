//! plan::planner
//!
//! Builds a [`Plan`] from declared repository specs and a filesystem scan.
//! Pure and I/O-free: presence/absence is determined by comparing resolved
//! target paths against a caller-supplied scan result, never by touching the
//! filesystem directly. This mirrors the teacher's plan/execute split, where
//! the planner produces data and a later stage performs all mutation.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::action::{Action, ActionType};
use crate::config::schema::{RepoSpec, Strategy};
use crate::scan::ScannedRepo;

/// Errors building a plan.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlanError {
    /// Two enabled repo specs resolve to the same target path.
    #[error("target path '{0}' is declared by more than one repository")]
    DuplicateTargetPath(String),
}

/// Run-wide planning settings, independent of any single repository.
#[derive(Debug, Clone)]
pub struct PlanOptions {
    /// Strategy applied to repos without a per-repo override.
    pub default_strategy: Strategy,
    /// Whether directories under `roots` with no matching spec become
    /// `cleanup-orphan` actions.
    pub cleanup_orphans: bool,
    /// Root directories scanned for orphans (also used to resolve relative
    /// target paths against, for presence comparison).
    pub roots: Vec<PathBuf>,
}

impl Default for PlanOptions {
    fn default() -> Self {
        Self {
            default_strategy: Strategy::default(),
            cleanup_orphans: false,
            roots: Vec::new(),
        }
    }
}

/// An ordered, conflict-free sequence of actions plus the options it was
/// built under.
#[derive(Debug, Clone)]
pub struct Plan {
    /// The actions to execute, in stable order (cleanup-orphan actions last).
    pub actions: Vec<Action>,
    /// The options this plan was built with.
    pub options: PlanOptions,
}

impl Plan {
    /// Number of actions in the plan.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Whether the plan has no actions.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

/// Resolve a spec's target path against the first scan root, for presence
/// comparison. Absolute target paths are used as-is.
fn resolve_against_root(base_dir: &Path, relative: &Path) -> PathBuf {
    if relative.is_absolute() {
        relative.to_path_buf()
    } else {
        base_dir.join(relative)
    }
}

/// Build a plan from declared specs and a scan result.
///
/// `base_dir` anchors relative `target_path`s for presence comparison only —
/// no filesystem access happens here, the comparison is purely path
/// arithmetic against `scanned`.
pub fn build_plan(
    specs: Vec<RepoSpec>,
    scanned: &[ScannedRepo],
    base_dir: &Path,
    options: PlanOptions,
) -> Result<Plan, PlanError> {
    let mut seen_paths: HashMap<PathBuf, ()> = HashMap::new();
    let scanned_paths: HashSet<PathBuf> = scanned.iter().map(|r| r.path.clone()).collect();
    let mut claimed: HashSet<PathBuf> = HashSet::new();

    let mut actions = Vec::with_capacity(specs.len());

    for spec in specs {
        let absolute = resolve_against_root(base_dir, spec.target_path.as_path());

        if seen_paths.insert(absolute.clone(), ()).is_some() {
            return Err(PlanError::DuplicateTargetPath(
                absolute.to_string_lossy().into_owned(),
            ));
        }
        claimed.insert(absolute.clone());

        let strategy = spec.strategy.unwrap_or(options.default_strategy);

        let action_type = if !spec.enabled {
            ActionType::Skip
        } else if spec.assume_present || scanned_paths.contains(&absolute) {
            ActionType::Update
        } else {
            ActionType::Clone
        };

        actions.push(Action::new(spec, action_type, strategy));
    }

    if options.cleanup_orphans {
        for repo in scanned {
            if claimed.contains(&repo.path) {
                continue;
            }
            if !options.roots.iter().any(|root| repo.path.starts_with(root)) {
                continue;
            }
            let orphan_spec = synthetic_orphan_spec(repo);
            actions.push(Action::new(orphan_spec, ActionType::CleanupOrphan, Strategy::Skip));
        }
    }

    // Stable order: insertion order from the merged input, with
    // cleanup-orphan actions moved after everything else. `sort_by` is a
    // stable sort, so within each of the two groups the original push order
    // (declared-spec order, then scan order for orphans) is preserved.
    actions.sort_by_key(|a| a.action_type == ActionType::CleanupOrphan);

    Ok(Plan { actions, options })
}

fn synthetic_orphan_spec(repo: &ScannedRepo) -> RepoSpec {
    use crate::config::schema::{RepoName, TargetPath};
    use std::collections::HashMap;

    // Orphan names are derived from disk, so they may contain characters a
    // declared RepoName would reject; fall back to a safe placeholder rather
    // than fail plan construction over a directory we're about to flag for
    // cleanup anyway.
    let name = RepoName::new(&repo.name).unwrap_or_else(|_| {
        RepoName::new("orphan").expect("literal 'orphan' is always a valid RepoName")
    });
    let target_path = TargetPath::new(&repo.path).unwrap_or_else(|_| {
        TargetPath::new(".").expect("literal '.' is always a valid TargetPath")
    });

    RepoSpec {
        name,
        description: Some(format!("orphaned working tree at {}", repo.path.display())),
        provider: None,
        clone_url: repo.remote_urls.first().cloned(),
        additional_remotes: HashMap::new(),
        target_path,
        branch: None,
        strict_branch_checkout: false,
        strategy: Some(Strategy::Skip),
        enabled: true,
        assume_present: true,
    }
}
