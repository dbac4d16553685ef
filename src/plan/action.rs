//! plan::action
//!
//! The data model shared by the Planner and the Strategy Executor: a unit of
//! work (`Action`) and its terminal outcome (`ActionResult`).

use std::time::Duration;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::schema::{CommitCount, RepoSpec, Strategy, TargetPath};

/// What kind of work an [`Action`] represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionType {
    /// The target path does not exist yet; it must be cloned.
    Clone,
    /// The target path exists and should be brought up to date.
    Update,
    /// Explicitly excluded from mutation (disabled, or strategy is `skip`).
    Skip,
    /// A directory under a scan root with no matching `RepoSpec`.
    CleanupOrphan,
}

/// A stable identifier for an [`Action`], derived from its target path and
/// type so that re-planning the same inputs reproduces the same ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActionId(pub [u8; 32]);

impl ActionId {
    fn compute(target_path: &TargetPath, action_type: ActionType) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(target_path.as_path().to_string_lossy().as_bytes());
        hasher.update([0u8]);
        hasher.update(format!("{:?}", action_type).as_bytes());
        let digest = hasher.finalize();
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&digest);
        ActionId(bytes)
    }

    /// Render as a hex string, suitable as a `RunState` map key.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl std::fmt::Display for ActionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// A single unit of planned work against one target path.
#[derive(Debug, Clone)]
pub struct Action {
    /// Stable id, derived from `target_path` and `action_type`.
    pub id: ActionId,
    /// The repository this action concerns.
    pub spec: RepoSpec,
    /// What kind of work this is.
    pub action_type: ActionType,
    /// The mutation strategy to apply (meaningless for `Skip`/`CleanupOrphan`).
    pub strategy: Strategy,
}

impl Action {
    /// Construct an action, computing its stable id.
    pub fn new(spec: RepoSpec, action_type: ActionType, strategy: Strategy) -> Self {
        let id = ActionId::compute(&spec.target_path, action_type);
        Self {
            id,
            spec,
            action_type,
            strategy,
        }
    }
}

/// The terminal outcome of executing (or dry-running) an [`Action`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionStatus {
    /// The mutation completed as intended.
    Success,
    /// No mutation was necessary; the repo already matched the desired state.
    UpToDate,
    /// The action was not attempted (disabled, strategy `skip`, or dry-run).
    Skipped,
    /// The action was attempted and failed.
    Failed,
    /// The working tree is in a state (conflict, mid-rebase, mid-merge) that
    /// precludes mutation.
    Conflict,
}

impl ActionStatus {
    /// Whether this status should prevent a resumed run from re-executing
    /// the action (spec: success, skipped, up-to-date are terminal-resumable).
    pub fn is_resumable_terminal(&self) -> bool {
        matches!(
            self,
            ActionStatus::Success | ActionStatus::Skipped | ActionStatus::UpToDate
        )
    }
}

/// The recorded outcome of an [`Action`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResult {
    /// The id of the action this result belongs to.
    pub action_id: ActionId,
    /// Terminal status.
    pub status: ActionStatus,
    /// Human-readable detail, e.g. "fast-forwarded 4 commits" or a truncated
    /// stderr on failure.
    pub message: Option<String>,
    /// Machine-readable error detail, set only on `Failed`/`Conflict`.
    pub error: Option<String>,
    /// Wall-clock time spent executing this action.
    pub duration: Duration,
    /// Commits pulled into the local branch, when known.
    pub commits_pulled: Option<CommitCount>,
    /// Commits pushed, when known (gitrun never pushes automatically today,
    /// so this is always `None` or zero; kept for forward compatibility with
    /// a future push-capable strategy).
    pub commits_pushed: Option<CommitCount>,
}

impl ActionResult {
    /// Build a successful result.
    pub fn success(action_id: ActionId, duration: Duration, message: impl Into<String>) -> Self {
        Self {
            action_id,
            status: ActionStatus::Success,
            message: Some(message.into()),
            error: None,
            duration,
            commits_pulled: None,
            commits_pushed: None,
        }
    }

    /// Build an up-to-date result (no mutation necessary).
    pub fn up_to_date(action_id: ActionId, duration: Duration) -> Self {
        Self {
            action_id,
            status: ActionStatus::UpToDate,
            message: Some("already up to date".to_string()),
            error: None,
            duration,
            commits_pulled: None,
            commits_pushed: None,
        }
    }

    /// Build a skipped result.
    pub fn skipped(action_id: ActionId, message: impl Into<String>) -> Self {
        Self {
            action_id,
            status: ActionStatus::Skipped,
            message: Some(message.into()),
            error: None,
            duration: Duration::ZERO,
            commits_pulled: None,
            commits_pushed: None,
        }
    }

    /// Build a failed result, truncating `error` to a reasonable length.
    pub fn failed(action_id: ActionId, duration: Duration, error: impl Into<String>) -> Self {
        let error = truncate(error.into(), 2000);
        Self {
            action_id,
            status: ActionStatus::Failed,
            message: Some(error.clone()),
            error: Some(error),
            duration,
            commits_pulled: None,
            commits_pushed: None,
        }
    }

    /// Build a conflict result.
    pub fn conflict(action_id: ActionId, duration: Duration, message: impl Into<String>) -> Self {
        Self {
            action_id,
            status: ActionStatus::Conflict,
            message: Some(message.into()),
            error: None,
            duration,
            commits_pulled: None,
            commits_pushed: None,
        }
    }

    /// Attach a commit-pulled count.
    pub fn with_commits_pulled(mut self, count: CommitCount) -> Self {
        self.commits_pulled = Some(count);
        self
    }
}

fn truncate(s: String, max_len: usize) -> String {
    if s.len() <= max_len {
        s
    } else {
        let mut truncated: String = s.chars().take(max_len).collect();
        truncated.push_str("... (truncated)");
        truncated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{RepoName, TargetPath};
    use std::collections::HashMap;

    fn spec(name: &str) -> RepoSpec {
        RepoSpec {
            name: RepoName::new(name).unwrap(),
            description: None,
            provider: None,
            clone_url: Some(format!("https://example.com/{name}.git")),
            additional_remotes: HashMap::new(),
            target_path: TargetPath::new(name).unwrap(),
            branch: None,
            strict_branch_checkout: false,
            strategy: None,
            enabled: true,
            assume_present: false,
        }
    }

    #[test]
    fn action_id_is_stable_across_identical_inputs() {
        let a = Action::new(spec("foo"), ActionType::Clone, Strategy::Reset);
        let b = Action::new(spec("foo"), ActionType::Clone, Strategy::Pull);
        // strategy does not feed the id, only target_path + action_type
        assert_eq!(a.id, b.id);
    }

    #[test]
    fn action_id_differs_by_action_type() {
        let a = Action::new(spec("foo"), ActionType::Clone, Strategy::Reset);
        let b = Action::new(spec("foo"), ActionType::Update, Strategy::Reset);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn action_id_differs_by_target_path() {
        let a = Action::new(spec("foo"), ActionType::Clone, Strategy::Reset);
        let b = Action::new(spec("bar"), ActionType::Clone, Strategy::Reset);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn resumable_terminal_statuses() {
        assert!(ActionStatus::Success.is_resumable_terminal());
        assert!(ActionStatus::Skipped.is_resumable_terminal());
        assert!(ActionStatus::UpToDate.is_resumable_terminal());
        assert!(!ActionStatus::Failed.is_resumable_terminal());
        assert!(!ActionStatus::Conflict.is_resumable_terminal());
    }

    #[test]
    fn failed_result_truncates_long_error() {
        let id = Action::new(spec("foo"), ActionType::Update, Strategy::Reset).id;
        let long = "x".repeat(5000);
        let result = ActionResult::failed(id, Duration::from_secs(1), long);
        assert!(result.error.unwrap().len() < 2100);
    }
}
