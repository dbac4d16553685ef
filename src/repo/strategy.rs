//! repo::strategy
//!
//! The Strategy Executor (C4): the only module allowed to mutate a working
//! tree. Given an [`Action`] and the target directory's presence, it performs
//! exactly one mutation and produces an [`ActionResult`] — the single
//! mutating doorway, generalized from the teacher's CAS-checked `Executor`
//! to directory-state preconditions (refuse `clone-fresh` unless clean or
//! forced, refuse mutation during conflict/rebase/merge).

use std::path::Path;
use std::time::Instant;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::config::schema::{CommitCount, RepoSpec, Strategy};
use crate::git::{ExecutionError, GitExecutor};
use crate::plan::action::{Action, ActionId, ActionResult, ActionType};
use crate::repo::inspect::{current_branch, resolve_upstream, InspectError, WorktreeState};

/// Errors from applying a strategy, before being folded into an
/// [`ActionResult`] with `status=failed`.
#[derive(Debug, Error)]
pub enum StrategyError {
    /// The underlying git subprocess could not be run at all.
    #[error("git execution failed: {0}")]
    Execution(#[from] ExecutionError),

    /// Git ran but reported failure; `stderr` (possibly truncated) is kept.
    #[error("{0}")]
    GitFailed(String),

    /// `clone-fresh` was requested against a dirty tree without `force`.
    #[error("refusing clone-fresh: working tree is not clean (pass force to override)")]
    DirtyCloneFreshRefused,

    /// `cleanup-orphan` was requested against a non-clean tree without `force`.
    #[error("refusing to delete orphan: working tree is not clean (pass force to override)")]
    DirtyOrphanCleanupRefused,

    /// A pull strategy hit a non-fast-forward upstream.
    #[error("non-fast-forward; choose rebase or reset")]
    NonFastForward,

    /// No upstream is configured, so `pull`/`rebase`/`reset` cannot proceed.
    #[error("no upstream configured for branch '{0}'")]
    NoUpstream(String),

    /// Preparing the target directory failed.
    #[error("failed to prepare target directory: {0}")]
    Io(#[from] std::io::Error),
}

impl From<InspectError> for StrategyError {
    fn from(value: InspectError) -> Self {
        match value {
            InspectError::Execution(e) => StrategyError::Execution(e),
            InspectError::NotARepository(path) => {
                StrategyError::GitFailed(format!("not a git repository: {path}"))
            }
        }
    }
}

/// Options affecting otherwise-destructive strategy behavior.
#[derive(Debug, Clone, Default)]
pub struct StrategyOptions {
    /// Allow `clone-fresh` to discard a dirty working tree.
    pub force: bool,
    /// For `reset`, also discard untracked files (`git clean -fd`).
    pub discard_untracked: bool,
}

/// Applies exactly one strategy mutation per call.
#[derive(Debug, Clone)]
pub struct StrategyExecutor {
    git: GitExecutor,
}

impl StrategyExecutor {
    /// Build an executor around a [`GitExecutor`].
    pub fn new(git: GitExecutor) -> Self {
        Self { git }
    }

    /// Apply `action`'s strategy against `target_dir`, producing a terminal
    /// [`ActionResult`]. Never returns `Err`: any failure is folded into a
    /// `status=failed` result with the failure message.
    pub async fn apply(
        &self,
        action: &Action,
        target_dir: &Path,
        options: &StrategyOptions,
        cancel: &CancellationToken,
    ) -> ActionResult {
        let start = Instant::now();
        let id = action.id;

        if action.action_type == ActionType::CleanupOrphan {
            return self.apply_cleanup_orphan(id, target_dir, options, cancel, start).await;
        }

        if !target_dir.exists() {
            return self.apply_absent(id, &action.spec, action.strategy, target_dir, cancel, start).await;
        }

        self.apply_present(id, &action.spec, action.strategy, target_dir, options, cancel, start)
            .await
    }

    /// Delete a directory flagged as an orphan (present on disk, not
    /// referenced by any repo spec in the plan). Refuses to delete a
    /// non-clean working tree (dirty, mid-rebase, mid-merge, or conflicted)
    /// unless `force` is set; `force` never overrides the in-progress-rebase
    /// or in-progress-merge refusal's underlying cause, it just permits
    /// deleting the directory outright once that state is taken into
    /// account as "non-clean" alongside a plain dirty tree.
    async fn apply_cleanup_orphan(
        &self,
        id: ActionId,
        target_dir: &Path,
        options: &StrategyOptions,
        cancel: &CancellationToken,
        start: Instant,
    ) -> ActionResult {
        if !target_dir.exists() {
            return ActionResult::skipped(id, "orphan directory already absent");
        }

        let worktree_state = WorktreeState::detect(target_dir);
        let non_clean = if worktree_state.is_in_progress() {
            true
        } else {
            match self.git.run(target_dir, &["status", "--porcelain=v1"], cancel).await {
                Ok(out) => !out.stdout.trim().is_empty(),
                Err(e) => return ActionResult::failed(id, start.elapsed(), StrategyError::from(e).to_string()),
            }
        };

        if non_clean && !options.force {
            return ActionResult::failed(id, start.elapsed(), StrategyError::DirtyOrphanCleanupRefused.to_string());
        }

        match std::fs::remove_dir_all(target_dir) {
            Ok(()) => ActionResult::success(id, start.elapsed(), "removed orphaned working tree"),
            Err(e) => ActionResult::failed(id, start.elapsed(), StrategyError::from(e).to_string()),
        }
    }

    async fn apply_absent(
        &self,
        id: ActionId,
        spec: &RepoSpec,
        strategy: Strategy,
        target_dir: &Path,
        cancel: &CancellationToken,
        start: Instant,
    ) -> ActionResult {
        if strategy == Strategy::Skip {
            return ActionResult::skipped(id, "target directory absent, strategy is skip");
        }

        match self.clone_repo(spec, target_dir, cancel).await {
            Ok(commits) => {
                let mut result = ActionResult::success(
                    id,
                    start.elapsed(),
                    format!("cloned {}", spec.clone_url.as_deref().unwrap_or("<assume-present>")),
                );
                if let Some(count) = commits {
                    result = result.with_commits_pulled(count);
                }
                result
            }
            Err(e) => ActionResult::failed(id, start.elapsed(), e.to_string()),
        }
    }

    async fn apply_present(
        &self,
        id: ActionId,
        spec: &RepoSpec,
        strategy: Strategy,
        target_dir: &Path,
        options: &StrategyOptions,
        cancel: &CancellationToken,
        start: Instant,
    ) -> ActionResult {
        let worktree_state = WorktreeState::detect(target_dir);
        if worktree_state.is_in_progress() {
            let label = match worktree_state {
                WorktreeState::Rebase => "rebase in progress",
                WorktreeState::Merge => "merge in progress",
                WorktreeState::Normal => unreachable!(),
            };
            return ActionResult::conflict(id, start.elapsed(), label);
        }

        match self.has_unresolved_conflicts(target_dir, cancel).await {
            Ok(true) => {
                return ActionResult::conflict(id, start.elapsed(), "unresolved merge conflicts in working tree");
            }
            Ok(false) => {}
            Err(e) => return ActionResult::failed(id, start.elapsed(), e.to_string()),
        }

        let outcome = match strategy {
            Strategy::Skip => Ok(StrategyOutcome::Skipped("strategy is skip".to_string())),
            Strategy::Fetch => self.do_fetch(target_dir, cancel).await,
            Strategy::Reset => self.do_reset(target_dir, options, cancel).await,
            Strategy::Pull => self.do_pull(target_dir, cancel).await,
            Strategy::Rebase => self.do_rebase(target_dir, cancel).await,
            Strategy::CloneFresh => self.do_clone_fresh(spec, target_dir, options, cancel).await,
        };

        match outcome {
            Ok(StrategyOutcome::Success { message, commits_pulled }) => {
                let mut result = ActionResult::success(id, start.elapsed(), message);
                if let Some(c) = commits_pulled {
                    result = result.with_commits_pulled(c);
                }
                result
            }
            Ok(StrategyOutcome::UpToDate) => ActionResult::up_to_date(id, start.elapsed()),
            Ok(StrategyOutcome::Skipped(message)) => ActionResult::skipped(id, message),
            Ok(StrategyOutcome::Conflict(message)) => ActionResult::conflict(id, start.elapsed(), message),
            Err(e) => ActionResult::failed(id, start.elapsed(), e.to_string()),
        }
    }

    async fn has_unresolved_conflicts(
        &self,
        target_dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<bool, StrategyError> {
        let out = self
            .git
            .run(target_dir, &["status", "--porcelain=v1"], cancel)
            .await?;
        let counts = crate::git::parse_status_porcelain(&out.stdout)
            .map_err(|e| StrategyError::GitFailed(e.to_string()))?;
        Ok(counts.conflict > 0)
    }

    async fn clone_repo(
        &self,
        spec: &RepoSpec,
        target_dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<Option<CommitCount>, StrategyError> {
        let url = spec
            .clone_url
            .as_deref()
            .ok_or_else(|| StrategyError::GitFailed("assume_present repo has no clone_url to clone from".to_string()))?;

        let parent = target_dir
            .parent()
            .ok_or_else(|| StrategyError::GitFailed("target directory has no parent".to_string()))?;
        std::fs::create_dir_all(parent)?;

        let dest = target_dir.to_string_lossy().into_owned();
        let out = self.git.run(parent, &["clone", url, &dest], cancel).await?;
        if !out.success() {
            return Err(StrategyError::GitFailed(truncate(out.stderr)));
        }

        if let Some(branch) = &spec.branch {
            let checkout = self
                .git
                .run(target_dir, &["checkout", branch], cancel)
                .await?;
            if !checkout.success() {
                if spec.strict_branch_checkout {
                    return Err(StrategyError::GitFailed(truncate(checkout.stderr)));
                }
            }
        }

        for (name, url) in &spec.additional_remotes {
            let _ = self
                .git
                .run(target_dir, &["remote", "add", name, url], cancel)
                .await?;
        }

        let count_out = self
            .git
            .run(target_dir, &["rev-list", "--count", "HEAD"], cancel)
            .await?;
        let count = count_out
            .success()
            .then(|| count_out.stdout.trim().parse::<u32>().ok())
            .flatten()
            .map(CommitCount);

        Ok(count)
    }

    async fn do_fetch(
        &self,
        target_dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<StrategyOutcome, StrategyError> {
        let out = self.git.run(target_dir, &["fetch"], cancel).await?;
        if !out.success() {
            return Err(StrategyError::GitFailed(truncate(out.stderr)));
        }
        Ok(StrategyOutcome::Success {
            message: "fetched from remote".to_string(),
            commits_pulled: Some(CommitCount::ZERO),
        })
    }

    async fn do_reset(
        &self,
        target_dir: &Path,
        options: &StrategyOptions,
        cancel: &CancellationToken,
    ) -> Result<StrategyOutcome, StrategyError> {
        let branch = current_branch(&self.git, target_dir, cancel).await?;
        let upstream = resolve_upstream(&self.git, target_dir, &branch, cancel).await?;
        if upstream.is_empty() {
            return Err(StrategyError::NoUpstream(branch));
        }

        let before = self.head_oid(target_dir, cancel).await?;

        let fetch = self.git.run(target_dir, &["fetch", "--all"], cancel).await?;
        if !fetch.success() {
            return Err(StrategyError::GitFailed(truncate(fetch.stderr)));
        }

        let reset = self
            .git
            .run(target_dir, &["reset", "--hard", &upstream], cancel)
            .await?;
        if !reset.success() {
            return Err(StrategyError::GitFailed(truncate(reset.stderr)));
        }

        if options.discard_untracked {
            let _ = self.git.run(target_dir, &["clean", "-fd"], cancel).await?;
        }

        let after = self.head_oid(target_dir, cancel).await?;
        if before == after {
            return Ok(StrategyOutcome::UpToDate);
        }

        let commits = self.count_commits_between(target_dir, &before, &after, cancel).await;
        Ok(StrategyOutcome::Success {
            message: format!("reset {} -> {}", short(&before), short(&after)),
            commits_pulled: commits,
        })
    }

    async fn do_pull(
        &self,
        target_dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<StrategyOutcome, StrategyError> {
        let branch = current_branch(&self.git, target_dir, cancel).await?;
        let upstream = resolve_upstream(&self.git, target_dir, &branch, cancel).await?;
        if upstream.is_empty() {
            return Err(StrategyError::NoUpstream(branch));
        }

        let before = self.head_oid(target_dir, cancel).await?;

        let fetch = self.git.run(target_dir, &["fetch"], cancel).await?;
        if !fetch.success() {
            return Err(StrategyError::GitFailed(truncate(fetch.stderr)));
        }

        let merge = self
            .git
            .run(target_dir, &["merge", "--ff-only", &upstream], cancel)
            .await?;
        if !merge.success() {
            if merge.stderr.contains("non-fast-forward") || merge.stdout.contains("not possible to fast-forward") {
                return Err(StrategyError::NonFastForward);
            }
            return Err(StrategyError::GitFailed(truncate(merge.stderr)));
        }

        let after = self.head_oid(target_dir, cancel).await?;
        if before == after {
            return Ok(StrategyOutcome::UpToDate);
        }

        let commits = self.count_commits_between(target_dir, &before, &after, cancel).await;
        Ok(StrategyOutcome::Success {
            message: format!("fast-forwarded {} -> {}", short(&before), short(&after)),
            commits_pulled: commits,
        })
    }

    async fn do_rebase(
        &self,
        target_dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<StrategyOutcome, StrategyError> {
        let branch = current_branch(&self.git, target_dir, cancel).await?;
        let upstream = resolve_upstream(&self.git, target_dir, &branch, cancel).await?;
        if upstream.is_empty() {
            return Err(StrategyError::NoUpstream(branch));
        }

        let before = self.head_oid(target_dir, cancel).await?;

        let fetch = self.git.run(target_dir, &["fetch"], cancel).await?;
        if !fetch.success() {
            return Err(StrategyError::GitFailed(truncate(fetch.stderr)));
        }

        let rebase = self.git.run(target_dir, &["rebase", &upstream], cancel).await?;
        if !rebase.success() {
            // Leave the worktree in its mid-rebase state; do not `--abort`.
            return Ok(StrategyOutcome::Conflict(truncate(rebase.stderr)));
        }

        let after = self.head_oid(target_dir, cancel).await?;
        if before == after {
            return Ok(StrategyOutcome::UpToDate);
        }

        let commits = self.count_commits_between(target_dir, &before, &after, cancel).await;
        Ok(StrategyOutcome::Success {
            message: format!("rebased {} -> {}", short(&before), short(&after)),
            commits_pulled: commits,
        })
    }

    async fn do_clone_fresh(
        &self,
        spec: &RepoSpec,
        target_dir: &Path,
        options: &StrategyOptions,
        cancel: &CancellationToken,
    ) -> Result<StrategyOutcome, StrategyError> {
        if !options.force {
            let out = self
                .git
                .run(target_dir, &["status", "--porcelain=v1"], cancel)
                .await?;
            if !out.stdout.trim().is_empty() {
                return Err(StrategyError::DirtyCloneFreshRefused);
            }
        }

        std::fs::remove_dir_all(target_dir)?;
        let commits = self.clone_repo(spec, target_dir, cancel).await?;
        Ok(StrategyOutcome::Success {
            message: "removed and re-cloned".to_string(),
            commits_pulled: commits,
        })
    }

    async fn head_oid(&self, target_dir: &Path, cancel: &CancellationToken) -> Result<String, StrategyError> {
        let out = self.git.run(target_dir, &["rev-parse", "HEAD"], cancel).await?;
        Ok(out.stdout.trim().to_string())
    }

    async fn count_commits_between(
        &self,
        target_dir: &Path,
        before: &str,
        after: &str,
        cancel: &CancellationToken,
    ) -> Option<CommitCount> {
        if before.is_empty() || after.is_empty() {
            return None;
        }
        let range = format!("{before}..{after}");
        let out = self
            .git
            .run(target_dir, &["rev-list", "--count", &range], cancel)
            .await
            .ok()?;
        if !out.success() {
            return None;
        }
        out.stdout.trim().parse::<u32>().ok().map(CommitCount)
    }
}

enum StrategyOutcome {
    Success {
        message: String,
        commits_pulled: Option<CommitCount>,
    },
    UpToDate,
    Skipped(String),
    Conflict(String),
}

fn short(oid: &str) -> &str {
    &oid[..oid.len().min(8)]
}

fn truncate(s: String) -> String {
    const MAX: usize = 2000;
    if s.len() <= MAX {
        s
    } else {
        let mut t: String = s.chars().take(MAX).collect();
        t.push_str("... (truncated)");
        t
    }
}
