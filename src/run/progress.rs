//! run::progress
//!
//! The Progress Sink (C10): a polymorphic observer the orchestrator fans
//! events out to, one call per lifecycle transition. Per action, the
//! orchestrator guarantees `on_start` precedes any `on_progress` which
//! precedes `on_complete`; ordering across different actions is only
//! guaranteed when `parallel == 1`. Implementations are responsible for
//! their own internal thread-safety — the orchestrator calls them from
//! however many worker tasks are in flight.
//!
//! Grounded in the teacher's `ui::output` verbosity-gated printer, widened
//! from a single global stream to an explicit multi-format trait so a
//! consumer (CLI flag, CI log, a future TUI) can choose how it wants events
//! rendered without the orchestrator knowing about any of them.

use std::collections::HashMap;
use std::io::Write as _;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::plan::action::{Action, ActionId, ActionResult};

/// Observer interface the orchestrator drives, once per action lifecycle
/// transition.
pub trait ProgressSink: Send + Sync {
    /// An action has been dispatched to a worker.
    fn on_start(&self, action: &Action);
    /// An action is still in flight; `fraction` is a rough `0.0..=1.0` hint
    /// (e.g. retry attempt / max attempts), not a byte-accurate progress bar.
    fn on_progress(&self, action: &Action, message: &str, fraction: f32);
    /// An action reached a terminal status.
    fn on_complete(&self, result: &ActionResult);
}

/// Discards every event. The default for non-interactive, non-verbose runs.
#[derive(Debug, Default)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn on_start(&self, _action: &Action) {}
    fn on_progress(&self, _action: &Action, _message: &str, _fraction: f32) {}
    fn on_complete(&self, _result: &ActionResult) {}
}

/// One line per event (`start`, `progress`, `complete`), no ANSI — the
/// default for a terminal that isn't a TTY (redirected to a file, CI logs).
pub struct ConsoleSink<W: std::io::Write + Send> {
    out: Mutex<W>,
}

impl ConsoleSink<std::io::Stdout> {
    /// A console sink writing to stdout.
    pub fn stdout() -> Self {
        Self {
            out: Mutex::new(std::io::stdout()),
        }
    }
}

impl<W: std::io::Write + Send> ConsoleSink<W> {
    /// A console sink writing to an arbitrary writer (tests use this with a
    /// `Vec<u8>`).
    pub fn new(writer: W) -> Self {
        Self { out: Mutex::new(writer) }
    }
}

impl<W: std::io::Write + Send> ProgressSink for ConsoleSink<W> {
    fn on_start(&self, action: &Action) {
        let mut out = self.out.lock().expect("console sink lock poisoned");
        let _ = writeln!(
            out,
            "start   {} ({:?})",
            action.spec.target_path.as_path().display(),
            action.action_type
        );
    }

    fn on_progress(&self, action: &Action, message: &str, _fraction: f32) {
        let mut out = self.out.lock().expect("console sink lock poisoned");
        let _ = writeln!(out, "..      {} {message}", action.spec.target_path.as_path().display());
    }

    fn on_complete(&self, result: &ActionResult) {
        let mut out = self.out.lock().expect("console sink lock poisoned");
        let detail = result.message.as_deref().unwrap_or("");
        let _ = writeln!(out, "done    {} {:?} {detail}", result.action_id, result.status);
    }
}

/// One line per repo, emitted only on completion — the default for an
/// interactive terminal that doesn't want a line per retry.
pub struct CompactSink<W: std::io::Write + Send> {
    out: Mutex<W>,
    labels: Mutex<HashMap<ActionId, PathBuf>>,
}

impl CompactSink<std::io::Stdout> {
    /// A compact sink writing to stdout.
    pub fn stdout() -> Self {
        Self {
            out: Mutex::new(std::io::stdout()),
            labels: Mutex::new(HashMap::new()),
        }
    }
}

impl<W: std::io::Write + Send> CompactSink<W> {
    /// A compact sink writing to an arbitrary writer.
    pub fn new(writer: W) -> Self {
        Self {
            out: Mutex::new(writer),
            labels: Mutex::new(HashMap::new()),
        }
    }
}

impl<W: std::io::Write + Send> ProgressSink for CompactSink<W> {
    fn on_start(&self, action: &Action) {
        self.labels
            .lock()
            .expect("compact sink lock poisoned")
            .insert(action.id, action.spec.target_path.as_path().to_path_buf());
    }

    fn on_progress(&self, _action: &Action, _message: &str, _fraction: f32) {}

    fn on_complete(&self, result: &ActionResult) {
        let label = self
            .labels
            .lock()
            .expect("compact sink lock poisoned")
            .get(&result.action_id)
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| result.action_id.to_hex());
        let mut out = self.out.lock().expect("compact sink lock poisoned");
        let _ = writeln!(out, "{label}: {:?}", result.status);
    }
}

/// One JSON object per event, newline-delimited — for machine consumers
/// (spec §4.10: a `--json` mode is a required output format).
pub struct JsonSink<W: std::io::Write + Send> {
    out: Mutex<W>,
}

impl JsonSink<std::io::Stdout> {
    /// A JSON sink writing to stdout.
    pub fn stdout() -> Self {
        Self {
            out: Mutex::new(std::io::stdout()),
        }
    }
}

impl<W: std::io::Write + Send> JsonSink<W> {
    /// A JSON sink writing to an arbitrary writer.
    pub fn new(writer: W) -> Self {
        Self { out: Mutex::new(writer) }
    }

    fn emit(&self, value: serde_json::Value) {
        let mut out = self.out.lock().expect("json sink lock poisoned");
        let _ = writeln!(out, "{value}");
    }
}

impl<W: std::io::Write + Send> ProgressSink for JsonSink<W> {
    fn on_start(&self, action: &Action) {
        self.emit(serde_json::json!({
            "event": "start",
            "action_id": action.id.to_hex(),
            "target_path": action.spec.target_path.as_path().display().to_string(),
            "action_type": format!("{:?}", action.action_type),
        }));
    }

    fn on_progress(&self, action: &Action, message: &str, fraction: f32) {
        self.emit(serde_json::json!({
            "event": "progress",
            "action_id": action.id.to_hex(),
            "message": message,
            "fraction": fraction,
        }));
    }

    fn on_complete(&self, result: &ActionResult) {
        self.emit(serde_json::json!({
            "event": "complete",
            "action_id": result.action_id.to_hex(),
            "status": format!("{:?}", result.status),
            "message": result.message,
            "duration_ms": result.duration.as_millis(),
        }));
    }
}

// A live-updating terminal table (a "tui" output format) is out of scope:
// the orchestrator only needs a trait object to fan events out to, and
// rendering a redrawing table is a consumer-side concern layered on top of
// this trait, not something this crate implements.

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{RepoName, RepoSpec, Strategy, TargetPath};
    use crate::plan::action::{Action, ActionType};
    use std::collections::HashMap as Map;
    use std::time::Duration;

    fn action() -> Action {
        let spec = RepoSpec {
            name: RepoName::new("demo").unwrap(),
            description: None,
            provider: None,
            clone_url: Some("https://example.com/demo.git".to_string()),
            additional_remotes: Map::new(),
            target_path: TargetPath::new("demo").unwrap(),
            branch: None,
            strict_branch_checkout: false,
            strategy: None,
            enabled: true,
            assume_present: false,
        };
        Action::new(spec, ActionType::Clone, Strategy::Reset)
    }

    #[test]
    fn null_sink_does_nothing_observable() {
        let sink = NullSink;
        let a = action();
        sink.on_start(&a);
        sink.on_progress(&a, "retry 1", 0.5);
        sink.on_complete(&ActionResult::success(a.id, Duration::ZERO, "ok"));
    }

    #[test]
    fn console_sink_writes_one_line_per_event() {
        let buf = Vec::new();
        let sink = ConsoleSink::new(buf);
        let a = action();
        sink.on_start(&a);
        sink.on_complete(&ActionResult::success(a.id, Duration::ZERO, "cloned"));
        let out = sink.out.lock().unwrap();
        let text = String::from_utf8_lossy(&out);
        assert_eq!(text.lines().count(), 2);
        assert!(text.contains("start"));
        assert!(text.contains("done"));
    }

    #[test]
    fn compact_sink_labels_completion_with_target_path() {
        let buf = Vec::new();
        let sink = CompactSink::new(buf);
        let a = action();
        sink.on_start(&a);
        sink.on_complete(&ActionResult::success(a.id, Duration::ZERO, "cloned"));
        let out = sink.out.lock().unwrap();
        let text = String::from_utf8_lossy(&out);
        assert!(text.contains("demo"));
        assert!(text.contains("Success"));
    }

    #[test]
    fn json_sink_emits_parseable_lines() {
        let buf = Vec::new();
        let sink = JsonSink::new(buf);
        let a = action();
        sink.on_start(&a);
        sink.on_progress(&a, "retry 1", 0.5);
        sink.on_complete(&ActionResult::success(a.id, Duration::ZERO, "cloned"));

        let out = sink.out.lock().unwrap();
        let text = String::from_utf8_lossy(&out);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        for line in &lines {
            let value: serde_json::Value = serde_json::from_str(line).unwrap();
            assert!(value.get("event").is_some());
        }
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["event"], "start");
    }

    #[test]
    fn sink_is_usable_concurrently() {
        let sink = std::sync::Arc::new(ConsoleSink::stdout());
        let a = std::sync::Arc::new(action());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let sink = sink.clone();
                let a = a.clone();
                std::thread::spawn(move || sink.on_progress(&a, "tick", 0.0))
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
    }

    #[allow(dead_code)]
    fn assert_sink_is_send_sync<T: ProgressSink>() {}
}
