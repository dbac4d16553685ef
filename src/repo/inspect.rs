//! repo::inspect
//!
//! Per-repository diagnostic: branch, upstream, ahead/behind, worktree
//! status, special states (rebase/merge), network reachability.
//!
//! This module never mutates a working tree. The only git invocation with a
//! side effect is the optional inspection-time `fetch`, which updates remote-
//! tracking refs but never touches local branches or the index.

use std::path::Path;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::git::{
    parse_origin_remote_from_config, parse_status_porcelain, ExecutionError, GitExecutor,
    ParseError,
};

/// Errors from repository inspection.
#[derive(Debug, Error)]
pub enum InspectError {
    /// The path does not contain a `.git` entry at all.
    #[error("not a git working tree: {0}")]
    NotARepository(String),

    /// A git subprocess failed in a way inspection cannot recover from.
    #[error("git execution failed: {0}")]
    Execution(#[from] ExecutionError),
}

/// Normalized worktree classification, taking special states into account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// No staged, modified, or untracked changes.
    Clean,
    /// Worktree has uncommitted changes but no conflicts.
    Dirty,
    /// Worktree has unresolved merge-conflict markers.
    Conflict,
    /// `.git/rebase-merge` or `.git/rebase-apply` is present.
    RebaseInProgress,
    /// `.git/MERGE_HEAD` is present.
    MergeInProgress,
    /// Current branch has no remote-tracking upstream configured.
    NoUpstream,
    /// Repository has no remotes at all.
    NoRemote,
    /// Inspection itself failed (not a repository, or unreadable).
    Error,
    /// State could not be determined conclusively.
    Unknown,
}

impl Status {
    /// String form used in reports and progress output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Clean => "clean",
            Status::Dirty => "dirty",
            Status::Conflict => "conflict",
            Status::RebaseInProgress => "rebase-in-progress",
            Status::MergeInProgress => "merge-in-progress",
            Status::NoUpstream => "no-upstream",
            Status::NoRemote => "no-remote",
            Status::Error => "error",
            Status::Unknown => "unknown",
        }
    }
}

/// Filesystem-detectable special state of a working tree, checked before any
/// git invocation. Mirrors the precedence rule: special states override the
/// ordinary clean/dirty/conflict classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorktreeState {
    /// No rebase or merge is in progress.
    Normal,
    /// A rebase is in progress (`rebase-merge` or `rebase-apply`).
    Rebase,
    /// A merge is in progress (`MERGE_HEAD` present).
    Merge,
}

impl WorktreeState {
    /// Detect the special state of a working tree by filesystem inspection
    /// alone; no git invocation is required.
    pub fn detect(repo_path: &Path) -> Self {
        let git_dir = repo_path.join(".git");
        if git_dir.join("rebase-merge").exists() || git_dir.join("rebase-apply").exists() {
            return WorktreeState::Rebase;
        }
        if git_dir.join("MERGE_HEAD").exists() {
            return WorktreeState::Merge;
        }
        WorktreeState::Normal
    }

    /// Whether this state represents an operation awaiting user resolution.
    pub fn is_in_progress(&self) -> bool {
        !matches!(self, WorktreeState::Normal)
    }
}

/// Options controlling how deeply an inspection goes.
#[derive(Debug, Clone)]
pub struct InspectOptions {
    /// Skip the inspection-time `fetch`. When false, a fetch is attempted
    /// with `fetch_timeout` before computing ahead/behind.
    pub skip_fetch: bool,
    /// Timeout for the inspection-time fetch.
    pub fetch_timeout: Duration,
}

impl Default for InspectOptions {
    fn default() -> Self {
        Self {
            skip_fetch: false,
            fetch_timeout: crate::git::exec::INSPECT_FETCH_TIMEOUT,
        }
    }
}

/// Diagnostic snapshot of a single repository.
#[derive(Debug, Clone)]
pub struct RepoHealth {
    /// Normalized status classification.
    pub status: Status,
    /// Current branch name, empty if detached.
    pub branch: String,
    /// Upstream remote-tracking branch, empty if unset.
    pub upstream: String,
    /// Commits ahead of upstream.
    pub ahead_by: u32,
    /// Commits behind upstream.
    pub behind_by: u32,
    /// Count of modified tracked files.
    pub modified_files: u32,
    /// Count of untracked files.
    pub untracked_files: u32,
    /// Count of files with unresolved conflicts.
    pub conflict_files: u32,
    /// Count of staged files.
    pub staged_files: u32,
    /// Duration of the inspection-time fetch, if one was attempted.
    pub fetch_duration: Option<Duration>,
    /// Whether the inspection-time fetch reached the network.
    pub network_reachable: bool,
    /// Human-readable error detail when `status == Error`.
    pub error: Option<String>,
}

impl RepoHealth {
    fn errored(message: impl Into<String>) -> Self {
        Self {
            status: Status::Error,
            branch: String::new(),
            upstream: String::new(),
            ahead_by: 0,
            behind_by: 0,
            modified_files: 0,
            untracked_files: 0,
            conflict_files: 0,
            staged_files: 0,
            fetch_duration: None,
            network_reachable: true,
            error: Some(message.into()),
        }
    }

    /// Recommended next step, per the situation rule table. `None` when the
    /// repository requires no action.
    pub fn recommendation(&self) -> Option<&'static str> {
        match self.status {
            Status::Conflict => Some("Resolve conflicts, then continue or abort"),
            Status::RebaseInProgress => Some("Continue or abort rebase"),
            Status::MergeInProgress => Some("Complete or abort merge"),
            Status::Dirty if self.ahead_by > 0 && self.behind_by > 0 => {
                Some("Stash or commit, then pull with rebase")
            }
            Status::Dirty if self.behind_by > 0 => Some("Stash or commit, then pull"),
            Status::Clean if self.ahead_by > 0 && self.behind_by > 0 => {
                Some("Pull with rebase or reset")
            }
            Status::Clean if self.behind_by > 0 => Some("Pull"),
            Status::Clean if self.ahead_by > 0 => Some("Push"),
            Status::NoUpstream => Some("Set upstream with `git branch --set-upstream-to`"),
            Status::NoRemote => Some("Add a remote"),
            _ => None,
        }
    }
}

/// Inspect a working tree and produce its [`RepoHealth`].
pub async fn inspect(
    git: &GitExecutor,
    repo_path: &Path,
    opts: &InspectOptions,
    cancel: &CancellationToken,
) -> Result<RepoHealth, InspectError> {
    let git_dir = repo_path.join(".git");
    if !git_dir.exists() {
        return Ok(RepoHealth::errored(format!(
            "not a git working tree: {}",
            repo_path.display()
        )));
    }

    match WorktreeState::detect(repo_path) {
        WorktreeState::Rebase => {
            let mut health = inspect_worktree_only(git, repo_path, cancel).await?;
            health.status = Status::RebaseInProgress;
            return Ok(health);
        }
        WorktreeState::Merge => {
            let mut health = inspect_worktree_only(git, repo_path, cancel).await?;
            health.status = Status::MergeInProgress;
            return Ok(health);
        }
        WorktreeState::Normal => {}
    }

    let branch = current_branch(git, repo_path, cancel).await?;
    let has_remote = has_any_remote(git, repo_path, cancel).await?;
    let upstream = if branch.is_empty() {
        String::new()
    } else {
        resolve_upstream(git, repo_path, &branch, cancel).await?
    };

    let mut network_reachable = true;
    let mut fetch_duration = None;
    if !opts.skip_fetch {
        let result = git
            .run_with_timeout(repo_path, &["fetch", "--quiet"], opts.fetch_timeout, cancel)
            .await;
        match result {
            Ok(output) => {
                fetch_duration = Some(output.duration);
                if !output.success() {
                    network_reachable = false;
                }
            }
            Err(ExecutionError::Timeout { .. }) => network_reachable = false,
            Err(e) => return Err(e.into()),
        }
    }

    let (ahead_by, behind_by) = if upstream.is_empty() {
        (0, 0)
    } else {
        ahead_behind(git, repo_path, &upstream, cancel).await?
    };

    let porcelain = git
        .run(repo_path, &["status", "--porcelain=v1", "--untracked-files=all"], cancel)
        .await?;
    let counts = parse_status_porcelain(&porcelain.stdout)
        .map_err(|e| InspectError::Execution(parse_error_as_execution(e)))?;

    let status = if counts.conflict > 0 {
        Status::Conflict
    } else if !has_remote {
        Status::NoRemote
    } else if upstream.is_empty() {
        Status::NoUpstream
    } else if counts.is_dirty() {
        Status::Dirty
    } else {
        Status::Clean
    };

    Ok(RepoHealth {
        status,
        branch,
        upstream,
        ahead_by,
        behind_by,
        modified_files: counts.modified,
        untracked_files: counts.untracked,
        conflict_files: counts.conflict,
        staged_files: counts.staged,
        fetch_duration,
        network_reachable,
        error: None,
    })
}

/// Inspect only enough to populate file counts, used when a special state
/// (rebase/merge) already determines the overall status.
async fn inspect_worktree_only(
    git: &GitExecutor,
    repo_path: &Path,
    cancel: &CancellationToken,
) -> Result<RepoHealth, InspectError> {
    let branch = current_branch(git, repo_path, cancel).await?;
    let porcelain = git
        .run(repo_path, &["status", "--porcelain=v1", "--untracked-files=all"], cancel)
        .await?;
    let counts = parse_status_porcelain(&porcelain.stdout)
        .map_err(|e| InspectError::Execution(parse_error_as_execution(e)))?;

    Ok(RepoHealth {
        status: Status::Unknown,
        branch,
        upstream: String::new(),
        ahead_by: 0,
        behind_by: 0,
        modified_files: counts.modified,
        untracked_files: counts.untracked,
        conflict_files: counts.conflict,
        staged_files: counts.staged,
        fetch_duration: None,
        network_reachable: true,
        error: None,
    })
}

pub(crate) async fn current_branch(
    git: &GitExecutor,
    repo_path: &Path,
    cancel: &CancellationToken,
) -> Result<String, InspectError> {
    let out = git
        .run(repo_path, &["rev-parse", "--abbrev-ref", "HEAD"], cancel)
        .await?;
    if !out.success() {
        return Ok(String::new());
    }
    let name = out.stdout.trim();
    if name.is_empty() || name == "HEAD" {
        Ok(String::new())
    } else {
        Ok(name.to_string())
    }
}

pub(crate) async fn resolve_upstream(
    git: &GitExecutor,
    repo_path: &Path,
    branch: &str,
    cancel: &CancellationToken,
) -> Result<String, InspectError> {
    let _ = branch;
    let out = git
        .run(
            repo_path,
            &["rev-parse", "--abbrev-ref", "--symbolic-full-name", "@{u}"],
            cancel,
        )
        .await?;
    if !out.success() {
        return Ok(String::new());
    }
    Ok(out.stdout.trim().to_string())
}

async fn has_any_remote(
    git: &GitExecutor,
    repo_path: &Path,
    cancel: &CancellationToken,
) -> Result<bool, InspectError> {
    let config_path = repo_path.join(".git").join("config");
    if let Ok(contents) = tokio::fs::read_to_string(&config_path).await {
        if !parse_origin_remote_from_config(&contents).is_empty() {
            return Ok(true);
        }
    }
    let out = git.run(repo_path, &["remote"], cancel).await?;
    Ok(!out.stdout.trim().is_empty())
}

async fn ahead_behind(
    git: &GitExecutor,
    repo_path: &Path,
    upstream: &str,
    cancel: &CancellationToken,
) -> Result<(u32, u32), InspectError> {
    let range = format!("{}...HEAD", upstream);
    let out = git
        .run(
            repo_path,
            &["rev-list", "--left-right", "--count", &range],
            cancel,
        )
        .await?;
    if !out.success() {
        return Ok((0, 0));
    }
    // `rev-list --left-right --count A...B` prints "<behind>\t<ahead>".
    let mut parts = out.stdout.split_whitespace();
    let behind = parts.next().and_then(|s| s.parse().ok()).unwrap_or(0);
    let ahead = parts.next().and_then(|s| s.parse().ok()).unwrap_or(0);
    Ok((ahead, behind))
}

fn parse_error_as_execution(e: ParseError) -> ExecutionError {
    ExecutionError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))
}
