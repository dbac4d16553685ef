//! run::orchestrator
//!
//! The Orchestrator (C8): turns a [`Plan`] into a [`RunReport`] under bounded
//! parallelism, with resume-on-repeat, retry-with-backoff, dry-run preview,
//! progress fan-out, and cooperative cancellation (spec §4.8, §5).
//!
//! Concurrency is bounded with a [`tokio::sync::Semaphore`] rather than a
//! fixed-size thread pool, generalized from the teacher's single-repo
//! `engine::runner` lifecycle (on_start -> execute -> on_complete) to many
//! repos in flight at once. Cancellation threads a single
//! [`CancellationToken`] through every in-flight `git` subprocess, the same
//! token `GitExecutor::run_with_timeout` and `StrategyExecutor::apply`
//! already select on.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::config::schema::Strategy;
use crate::git::GitExecutor;
use crate::plan::action::{Action, ActionId, ActionResult, ActionStatus, ActionType};
use crate::plan::planner::Plan;
use crate::repo::inspect::{self, InspectOptions, RepoHealth, Status};
use crate::repo::strategy::{StrategyExecutor, StrategyOptions};

use super::progress::ProgressSink;
use super::state_store::{self, RunState};

/// Settings for a single orchestrator run, independent of plan construction.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Directory relative target paths are resolved against.
    pub base_dir: PathBuf,
    /// Worker pool width. Values below 1 are treated as 1 (the manifest
    /// loader rejects `parallel=0` earlier, at config-validation time).
    pub parallel: usize,
    /// Maximum retry attempts per action beyond the first; 0 means exactly
    /// one attempt.
    pub max_retries: u32,
    /// Dry-run: no mutation, informational results only.
    pub dry_run: bool,
    /// Flags passed through to the strategy executor's mutating paths.
    pub strategy_options: StrategyOptions,
    /// Base backoff duration for retry scheduling.
    pub retry_base_backoff: Duration,
    /// Upper bound on retry backoff.
    pub retry_max_backoff: Duration,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("."),
            parallel: 5,
            max_retries: 2,
            dry_run: false,
            strategy_options: StrategyOptions::default(),
            retry_base_backoff: Duration::from_secs(1),
            retry_max_backoff: Duration::from_secs(30),
        }
    }
}

/// A terminal report for a run: every action's outcome, plus cancellation
/// bookkeeping for actions that never got a chance to start.
#[derive(Debug, Default)]
pub struct RunReport {
    /// Every action's terminal result, in completion order (not plan order —
    /// use [`RunReport::results`] sorted by caller if plan order is needed).
    pub results: Vec<ActionResult>,
    /// Whether the run was cut short by cancellation.
    pub cancelled: bool,
    /// Actions that were never dispatched because cancellation was observed
    /// before their turn came up.
    pub not_started: Vec<ActionId>,
}

impl RunReport {
    /// Successful or already-up-to-date actions.
    pub fn succeeded(&self) -> impl Iterator<Item = &ActionResult> {
        self.results
            .iter()
            .filter(|r| matches!(r.status, ActionStatus::Success | ActionStatus::UpToDate))
    }

    /// Actions skipped outright (disabled, `skip` strategy, or dry-run).
    pub fn skipped(&self) -> impl Iterator<Item = &ActionResult> {
        self.results.iter().filter(|r| r.status == ActionStatus::Skipped)
    }

    /// Actions that failed.
    pub fn failed(&self) -> impl Iterator<Item = &ActionResult> {
        self.results.iter().filter(|r| r.status == ActionStatus::Failed)
    }

    /// Actions blocked by an unresolved conflict/rebase/merge.
    pub fn conflicted(&self) -> impl Iterator<Item = &ActionResult> {
        self.results.iter().filter(|r| r.status == ActionStatus::Conflict)
    }

    /// Whether the run should be reported to the caller as a failure (spec
    /// §6 exit code 1: at least one action failed).
    pub fn has_failures(&self) -> bool {
        self.results.iter().any(|r| r.status == ActionStatus::Failed)
    }
}

fn resolve_target(base_dir: &Path, spec: &crate::config::schema::RepoSpec) -> PathBuf {
    let p = spec.target_path.as_path();
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base_dir.join(p)
    }
}

/// Executes a [`Plan`] under bounded parallelism.
pub struct Orchestrator {
    git: GitExecutor,
    strategy: StrategyExecutor,
}

impl Orchestrator {
    /// Build an orchestrator around a [`GitExecutor`].
    pub fn new(git: GitExecutor) -> Self {
        let strategy = StrategyExecutor::new(git.clone());
        Self { git, strategy }
    }

    /// Run `plan` to completion (or until cancelled).
    ///
    /// `state` is consulted before each action (to skip ones already
    /// terminal-resumable) and updated after each completion. If
    /// `state_store_path` is set, the state is checkpointed to disk after
    /// every completion — at minimum before returning on cancellation.
    ///
    /// Non-cleanup actions all run before any `cleanup-orphan` action is
    /// dispatched (spec §4.8: cleanup gated until the rest of the plan has
    /// terminated).
    pub async fn run(
        &self,
        plan: &Plan,
        options: &RunOptions,
        state: &mut RunState,
        state_store_path: Option<&Path>,
        sink: Arc<dyn ProgressSink>,
        cancel: &CancellationToken,
    ) -> RunReport {
        let (main, cleanup): (Vec<Action>, Vec<Action>) = plan
            .actions
            .iter()
            .cloned()
            .partition(|a| a.action_type != ActionType::CleanupOrphan);

        let mut report = RunReport::default();

        self.run_phase(&main, options, state, state_store_path, &sink, cancel, &mut report)
            .await;

        if cancel.is_cancelled() {
            report.cancelled = true;
            report.not_started.extend(cleanup.iter().map(|a| a.id));
            return report;
        }

        self.run_phase(&cleanup, options, state, state_store_path, &sink, cancel, &mut report)
            .await;

        if cancel.is_cancelled() {
            report.cancelled = true;
        }
        report
    }

    async fn run_phase(
        &self,
        actions: &[Action],
        run_options: &RunOptions,
        state: &mut RunState,
        state_store_path: Option<&Path>,
        sink: &Arc<dyn ProgressSink>,
        cancel: &CancellationToken,
        report: &mut RunReport,
    ) {
        if actions.is_empty() {
            return;
        }

        let parallel = run_options.parallel.max(1);
        let semaphore = Arc::new(Semaphore::new(parallel));
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<ActionResult>();

        let mut dispatched = 0usize;

        for action in actions {
            if cancel.is_cancelled() {
                break;
            }

            if let Some(saved) = state.get(action.id).filter(|r| r.status.is_resumable_terminal()) {
                let saved = saved.clone();
                sink.on_start(action);
                sink.on_complete(&saved);
                dispatched += 1;
                checkpoint(state, state_store_path, saved.clone());
                report.results.push(saved);
                continue;
            }

            sink.on_start(action);
            dispatched += 1;

            let action_owned = action.clone();
            let target_dir = resolve_target(&run_options.base_dir, &action_owned.spec);
            let strategy_executor = self.strategy.clone();
            let git = self.git.clone();
            let run_opts = run_options.clone();
            let sink_clone = Arc::clone(sink);
            let cancel_clone = cancel.clone();
            let semaphore_clone = Arc::clone(&semaphore);
            let tx_clone = tx.clone();

            tokio::spawn(async move {
                let _permit = semaphore_clone.acquire_owned().await;
                let result = execute_with_retry(
                    &strategy_executor,
                    &git,
                    &action_owned,
                    &target_dir,
                    &run_opts,
                    sink_clone.as_ref(),
                    &cancel_clone,
                )
                .await;
                sink_clone.on_complete(&result);
                let _ = tx_clone.send(result);
            });
        }
        drop(tx);

        while let Some(result) = rx.recv().await {
            checkpoint(state, state_store_path, result.clone());
            report.results.push(result);
        }

        if cancel.is_cancelled() {
            let not_started: Vec<ActionId> = actions.iter().skip(dispatched).map(|a| a.id).collect();
            report.not_started.extend(not_started);
        }
    }
}

fn checkpoint(state: &mut RunState, path: Option<&Path>, result: ActionResult) {
    state.record(result);
    if let Some(path) = path {
        if let Err(e) = state_store::save(path, state) {
            log::warn!("failed to checkpoint run state: {e}");
        }
    }
}

async fn execute_with_retry(
    strategy_executor: &StrategyExecutor,
    git: &GitExecutor,
    action: &Action,
    target_dir: &Path,
    run_opts: &RunOptions,
    sink: &dyn ProgressSink,
    cancel: &CancellationToken,
) -> ActionResult {
    if run_opts.dry_run {
        return dry_run_preview(action, target_dir, git, cancel).await;
    }

    let attempts = run_opts.max_retries + 1;
    let mut last = None;

    for attempt in 1..=attempts {
        if cancel.is_cancelled() {
            return last.unwrap_or_else(|| ActionResult::failed(action.id, Duration::ZERO, "cancelled"));
        }

        let result = strategy_executor
            .apply(action, target_dir, &run_opts.strategy_options, cancel)
            .await;

        if attempt == attempts || !is_retryable(&result) {
            return result;
        }

        let backoff = compute_backoff(attempt, run_opts.retry_base_backoff, run_opts.retry_max_backoff, action.id);
        sink.on_progress(action, &format!("retry {attempt}"), attempt as f32 / attempts as f32);
        last = Some(result);

        tokio::select! {
            _ = cancel.cancelled() => return last.unwrap(),
            _ = tokio::time::sleep(backoff) => {}
        }
    }

    last.expect("loop runs at least once")
}

/// Classify a failed result as transient (worth retrying) or not.
///
/// Conflicts are never retried — they require human resolution, not time.
/// Authentication/permission failures are not retried either, since a retry
/// cannot change credentials the caller didn't supply. Everything else that
/// looks network-shaped (DNS, connection, TLS handshake, timeout) is retried.
fn is_retryable(result: &ActionResult) -> bool {
    if result.status != ActionStatus::Failed {
        return false;
    }
    let message = result.error.as_deref().unwrap_or_default().to_lowercase();

    const NON_RETRYABLE: &[&str] = &[
        "authentication failed",
        "permission denied",
        "403",
        "could not read username",
        "could not read password",
        "invalid credentials",
        "access denied",
    ];
    if NON_RETRYABLE.iter().any(|m| message.contains(m)) {
        return false;
    }

    const RETRYABLE: &[&str] = &[
        "could not resolve host",
        "connection refused",
        "connection reset",
        "connection timed out",
        "network is unreachable",
        "could not connect",
        "ssl",
        "tls",
        "timed out",
        "timeout",
        "temporary failure in name resolution",
        "unable to access",
        "early eof",
        "the remote end hung up unexpectedly",
    ];
    RETRYABLE.iter().any(|m| message.contains(m))
}

/// Deterministic exponential backoff with bounded jitter.
///
/// Jitter is derived from the action id and attempt number via a
/// SplitMix64-style mix rather than a real RNG: retries only need to avoid a
/// thundering herd, not unpredictability, and a deterministic function keeps
/// behavior reproducible in tests.
fn compute_backoff(attempt: u32, base: Duration, max: Duration, id: ActionId) -> Duration {
    let exp = 1u32 << attempt.min(16);
    let raw = base.saturating_mul(exp).min(max);

    let mut seed = u64::from_le_bytes(id.0[0..8].try_into().expect("8 bytes"));
    seed = seed.wrapping_add(attempt as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    seed ^= seed >> 33;
    let unit = (seed % 2001) as f64 / 1000.0 - 1.0; // in [-1.0, 1.0]
    let jitter = unit * 0.1; // +/- 10%

    let millis = raw.as_millis() as f64;
    let jittered = (millis + millis * jitter).max(0.0);
    Duration::from_millis(jittered as u64)
}

async fn dry_run_preview(action: &Action, target_dir: &Path, git: &GitExecutor, cancel: &CancellationToken) -> ActionResult {
    let start = std::time::Instant::now();

    if action.action_type == ActionType::CleanupOrphan {
        if !target_dir.exists() {
            return ActionResult::skipped(action.id, "orphan directory already absent");
        }
        return ActionResult::success(action.id, start.elapsed(), "would remove orphaned working tree");
    }

    if !target_dir.exists() {
        if action.strategy == Strategy::Skip {
            return ActionResult::skipped(action.id, "target directory absent, strategy is skip");
        }
        let message = format!(
            "would clone {}",
            action.spec.clone_url.as_deref().unwrap_or("<assume-present>")
        );
        return ActionResult::success(action.id, start.elapsed(), message);
    }

    let opts = InspectOptions {
        skip_fetch: true,
        ..InspectOptions::default()
    };
    match inspect::inspect(git, target_dir, &opts, cancel).await {
        Ok(health) => ActionResult::success(action.id, start.elapsed(), describe_would(action.strategy, &health)),
        Err(e) => ActionResult::failed(action.id, start.elapsed(), e.to_string()),
    }
}

fn describe_would(strategy: Strategy, health: &RepoHealth) -> String {
    if matches!(health.status, Status::Conflict | Status::RebaseInProgress | Status::MergeInProgress) {
        return format!("would report conflict ({})", health.status.as_str());
    }
    match strategy {
        Strategy::Skip => "would skip".to_string(),
        Strategy::Fetch => "would fetch".to_string(),
        Strategy::CloneFresh => "would remove and re-clone".to_string(),
        Strategy::Reset | Strategy::Pull | Strategy::Rebase => {
            if health.behind_by == 0 {
                "would report up-to-date".to_string()
            } else {
                format!("would pull {} commit(s)", health.behind_by)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{RepoName, RepoSpec, Strategy, TargetPath};
    use crate::plan::planner::PlanOptions;
    use crate::run::progress::ProgressSink;
    use std::collections::HashMap as Map;
    use std::process::Command;
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn spec(name: &str, target: &Path, clone_url: String) -> RepoSpec {
        RepoSpec {
            name: RepoName::new(name).unwrap(),
            description: None,
            provider: None,
            clone_url: Some(clone_url),
            additional_remotes: Map::new(),
            target_path: TargetPath::new(target).unwrap(),
            branch: None,
            strict_branch_checkout: false,
            strategy: Some(Strategy::Fetch),
            enabled: true,
            assume_present: false,
        }
    }

    fn init_bare_remote(path: &Path) {
        std::fs::create_dir_all(path).unwrap();
        let status = Command::new("git").args(["init", "--quiet", "--bare"]).current_dir(path).status().unwrap();
        assert!(status.success());
    }

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<String>>,
    }

    impl RecordingSink {
        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }
    }

    impl ProgressSink for RecordingSink {
        fn on_start(&self, action: &Action) {
            self.events
                .lock()
                .unwrap()
                .push(format!("start:{}", action.spec.target_path.as_path().display()));
        }
        fn on_progress(&self, action: &Action, message: &str, _fraction: f32) {
            self.events
                .lock()
                .unwrap()
                .push(format!("progress:{}:{message}", action.spec.target_path.as_path().display()));
        }
        fn on_complete(&self, result: &ActionResult) {
            self.events.lock().unwrap().push(format!("complete:{}", result.action_id.to_hex()));
        }
    }

    #[test]
    fn is_retryable_classifies_network_errors_as_retryable() {
        let id = Action::new(
            spec("a", Path::new("a"), "https://example.com/a.git".into()),
            ActionType::Update,
            Strategy::Fetch,
        )
        .id;
        let r = ActionResult::failed(id, Duration::ZERO, "Could not resolve host: example.com");
        assert!(is_retryable(&r));
    }

    #[test]
    fn is_retryable_excludes_auth_failures() {
        let id = Action::new(
            spec("a", Path::new("a"), "https://example.com/a.git".into()),
            ActionType::Update,
            Strategy::Fetch,
        )
        .id;
        let r = ActionResult::failed(id, Duration::ZERO, "remote: Authentication failed for ...");
        assert!(!is_retryable(&r));
    }

    #[test]
    fn is_retryable_excludes_conflicts() {
        let id = Action::new(
            spec("a", Path::new("a"), "https://example.com/a.git".into()),
            ActionType::Update,
            Strategy::Fetch,
        )
        .id;
        let r = ActionResult::conflict(id, Duration::ZERO, "unresolved conflict");
        assert!(!is_retryable(&r));
    }

    #[test]
    fn backoff_grows_exponentially_and_is_capped() {
        let id = ActionId([7u8; 32]);
        let base = Duration::from_millis(100);
        let max = Duration::from_secs(1);
        let b1 = compute_backoff(1, base, max, id);
        let b2 = compute_backoff(2, base, max, id);
        let b5 = compute_backoff(5, base, max, id);
        assert!(b2 > b1);
        assert!(b5 <= max + Duration::from_millis(1));
    }

    #[test]
    fn backoff_is_deterministic_for_same_inputs() {
        let id = ActionId([3u8; 32]);
        let a = compute_backoff(2, Duration::from_millis(50), Duration::from_secs(5), id);
        let b = compute_backoff(2, Duration::from_millis(50), Duration::from_secs(5), id);
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn resumed_action_is_skipped_without_dispatch() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("nonexistent-target");
        let action = Action::new(
            spec("a", &target, "https://example.invalid/a.git".to_string()),
            ActionType::Update,
            Strategy::Fetch,
        );

        let mut state = RunState::default();
        state.record(ActionResult::up_to_date(action.id, Duration::ZERO));

        let plan = Plan {
            actions: vec![action],
            options: PlanOptions::default(),
        };

        let orchestrator = Orchestrator::new(GitExecutor::new());
        let sink = Arc::new(RecordingSink::default());
        let cancel = CancellationToken::new();
        let options = RunOptions {
            base_dir: dir.path().to_path_buf(),
            parallel: 1,
            max_retries: 0,
            ..RunOptions::default()
        };

        let report = orchestrator
            .run(&plan, &options, &mut state, None, sink.clone() as Arc<dyn ProgressSink>, &cancel)
            .await;

        assert_eq!(report.results.len(), 1);
        assert_eq!(report.results[0].status, ActionStatus::UpToDate);
        // Never touched the (nonexistent) filesystem target.
        assert!(!target.exists());
    }

    #[tokio::test]
    async fn dispatch_order_matches_plan_order_when_serial() {
        let dir = TempDir::new().unwrap();
        let remote = dir.path().join("remote");
        init_bare_remote(&remote);

        let mut actions = Vec::new();
        for name in ["a", "b", "c"] {
            let target = dir.path().join(name);
            let status = Command::new("git")
                .args(["clone", "--quiet", remote.to_str().unwrap(), target.to_str().unwrap()])
                .status()
                .unwrap();
            assert!(status.success());
            actions.push(Action::new(
                spec(name, &target, remote.to_string_lossy().into_owned()),
                ActionType::Update,
                Strategy::Fetch,
            ));
        }

        let plan = Plan {
            actions,
            options: PlanOptions::default(),
        };

        let orchestrator = Orchestrator::new(GitExecutor::new());
        let sink = Arc::new(RecordingSink::default());
        let cancel = CancellationToken::new();
        let options = RunOptions {
            base_dir: dir.path().to_path_buf(),
            parallel: 1,
            ..RunOptions::default()
        };
        let mut state = RunState::default();

        let _ = orchestrator
            .run(&plan, &options, &mut state, None, sink.clone() as Arc<dyn ProgressSink>, &cancel)
            .await;

        let starts: Vec<&String> = sink.events().iter().filter(|e| e.starts_with("start:")).collect();
        assert_eq!(starts.len(), 3);
        assert!(starts[0].ends_with("/a"));
        assert!(starts[1].ends_with("/b"));
        assert!(starts[2].ends_with("/c"));
    }

    #[tokio::test]
    async fn cleanup_orphan_actions_wait_for_the_rest_of_the_plan() {
        let dir = TempDir::new().unwrap();
        let remote = dir.path().join("remote");
        init_bare_remote(&remote);

        let target = dir.path().join("main-repo");
        let status = Command::new("git")
            .args(["clone", "--quiet", remote.to_str().unwrap(), target.to_str().unwrap()])
            .status()
            .unwrap();
        assert!(status.success());

        let main_action = Action::new(
            spec("main-repo", &target, remote.to_string_lossy().into_owned()),
            ActionType::Update,
            Strategy::Fetch,
        );
        let orphan_spec = RepoSpec {
            strategy: Some(Strategy::Skip),
            ..spec("orphan", &dir.path().join("orphan"), "".to_string())
        };
        let orphan_action = Action::new(orphan_spec, ActionType::CleanupOrphan, Strategy::Skip);

        let plan = Plan {
            actions: vec![main_action, orphan_action],
            options: PlanOptions::default(),
        };

        let orchestrator = Orchestrator::new(GitExecutor::new());
        let sink = Arc::new(RecordingSink::default());
        let cancel = CancellationToken::new();
        let options = RunOptions {
            base_dir: dir.path().to_path_buf(),
            parallel: 2,
            ..RunOptions::default()
        };
        let mut state = RunState::default();

        let _ = orchestrator
            .run(&plan, &options, &mut state, None, sink.clone() as Arc<dyn ProgressSink>, &cancel)
            .await;

        let events = sink.events();
        let last_main_complete = events.iter().rposition(|e| e.starts_with("complete:")).unwrap();
        let orphan_start = events.iter().position(|e| e.starts_with("start:") && e.ends_with("orphan")).unwrap();
        assert!(orphan_start > last_main_complete);
    }

    #[tokio::test]
    async fn dry_run_never_mutates_the_target() {
        let dir = TempDir::new().unwrap();
        let remote = dir.path().join("remote");
        init_bare_remote(&remote);
        let target = dir.path().join("repo");
        let status = Command::new("git")
            .args(["clone", "--quiet", remote.to_str().unwrap(), target.to_str().unwrap()])
            .status()
            .unwrap();
        assert!(status.success());
        let head_before = std::fs::read(target.join(".git").join("HEAD")).unwrap();

        let action = Action::new(
            spec("repo", &target, remote.to_string_lossy().into_owned()),
            ActionType::Update,
            Strategy::Reset,
        );
        let plan = Plan {
            actions: vec![action],
            options: PlanOptions::default(),
        };

        let orchestrator = Orchestrator::new(GitExecutor::new());
        let sink = Arc::new(RecordingSink::default());
        let cancel = CancellationToken::new();
        let options = RunOptions {
            base_dir: dir.path().to_path_buf(),
            dry_run: true,
            ..RunOptions::default()
        };
        let mut state = RunState::default();

        let report = orchestrator
            .run(&plan, &options, &mut state, None, sink.clone() as Arc<dyn ProgressSink>, &cancel)
            .await;

        assert_eq!(report.results.len(), 1);
        assert_eq!(report.results[0].status, ActionStatus::Success);
        let head_after = std::fs::read(target.join(".git").join("HEAD")).unwrap();
        assert_eq!(head_before, head_after);
    }

    #[tokio::test]
    async fn pre_cancelled_token_dispatches_nothing() {
        let dir = TempDir::new().unwrap();
        let action = Action::new(
            spec("a", &dir.path().join("a"), "https://example.invalid/a.git".to_string()),
            ActionType::Clone,
            Strategy::Reset,
        );
        let plan = Plan {
            actions: vec![action.clone()],
            options: PlanOptions::default(),
        };

        let orchestrator = Orchestrator::new(GitExecutor::new());
        let sink = Arc::new(RecordingSink::default());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let options = RunOptions {
            base_dir: dir.path().to_path_buf(),
            ..RunOptions::default()
        };
        let mut state = RunState::default();

        let report = orchestrator
            .run(&plan, &options, &mut state, None, sink.clone() as Arc<dyn ProgressSink>, &cancel)
            .await;

        assert!(report.cancelled);
        assert_eq!(report.not_started, vec![action.id]);
        assert!(report.results.is_empty());
    }
}
