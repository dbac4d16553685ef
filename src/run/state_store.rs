//! run::state_store
//!
//! The State Store (C9): persists per-action completion so a later run can
//! resume without re-executing actions already recorded as terminal (spec
//! §4.9). Grounded in the teacher's atomic-write convention — write to a
//! sibling temp file, then rename into place on the same filesystem — but
//! storing a flat JSON map rather than the teacher's git-ref event chain: a
//! resume checkpoint has no audit-trail requirement, just idempotent replay.

use std::collections::HashMap;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::plan::action::{ActionId, ActionResult};

/// Errors persisting a [`RunState`] to disk.
#[derive(Debug, Error)]
pub enum StateStoreError {
    /// Writing the temp file failed.
    #[error("failed to write state file '{path}': {source}")]
    Write {
        /// Path that could not be written.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Renaming the temp file into place failed.
    #[error("failed to finalize state file '{path}': {source}")]
    Rename {
        /// Destination path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Per-action completion records, keyed by the action's hex id.
///
/// `unknown` preserves any top-level keys this build doesn't recognize, so a
/// newer writer's fields survive a round-trip through an older reader (spec
/// §4.9: "forward-compatible: unknown fields are preserved on round-trip").
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RunState {
    actions: HashMap<String, ActionResult>,
    #[serde(flatten)]
    unknown: HashMap<String, serde_json::Value>,
}

impl RunState {
    /// Look up a prior result by action id.
    pub fn get(&self, id: ActionId) -> Option<&ActionResult> {
        self.actions.get(&id.to_hex())
    }

    /// Record (or overwrite) a result.
    pub fn record(&mut self, result: ActionResult) {
        self.actions.insert(result.action_id.to_hex(), result);
    }

    /// Number of recorded actions.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Whether no actions have been recorded.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

/// Load a [`RunState`] from `path`.
///
/// A missing file yields an empty state silently (there is nothing to
/// resume from yet). A file that exists but fails to parse yields an empty
/// state plus a logged warning rather than aborting the run — a corrupted
/// checkpoint should degrade to "start over", not crash the caller.
pub fn load(path: &Path) -> RunState {
    match std::fs::read_to_string(path) {
        Ok(contents) => match serde_json::from_str(&contents) {
            Ok(state) => state,
            Err(e) => {
                log::warn!(
                    "state file '{}' could not be parsed ({e}); resuming with empty state",
                    path.display()
                );
                RunState::default()
            }
        },
        Err(_) => RunState::default(),
    }
}

/// Atomically persist `state` to `path`.
///
/// Writes to a sibling `.tmp` file and renames it over the destination, so a
/// reader never observes a partially-written file.
pub fn save(path: &Path, state: &RunState) -> Result<(), StateStoreError> {
    let json = serde_json::to_string_pretty(state).expect("RunState serialization cannot fail");

    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|source| StateStoreError::Write {
            path: path.to_path_buf(),
            source,
        })?;
    }

    let tmp_path = path.with_extension("tmp");
    let mut file = std::fs::File::create(&tmp_path).map_err(|source| StateStoreError::Write {
        path: tmp_path.clone(),
        source,
    })?;
    file.write_all(json.as_bytes())
        .and_then(|_| file.sync_all())
        .map_err(|source| StateStoreError::Write {
            path: tmp_path.clone(),
            source,
        })?;
    drop(file);

    std::fs::rename(&tmp_path, path).map_err(|source| StateStoreError::Rename {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{RepoName, TargetPath};
    use std::collections::HashMap as Map;
    use std::time::Duration;
    use tempfile::TempDir;

    fn action_id() -> ActionId {
        use crate::config::schema::RepoSpec;
        use crate::plan::action::{Action, ActionType};
        use crate::config::schema::Strategy;

        let spec = RepoSpec {
            name: RepoName::new("a").unwrap(),
            description: None,
            provider: None,
            clone_url: Some("https://example.com/a.git".to_string()),
            additional_remotes: Map::new(),
            target_path: TargetPath::new("a").unwrap(),
            branch: None,
            strict_branch_checkout: false,
            strategy: None,
            enabled: true,
            assume_present: false,
        };
        Action::new(spec, ActionType::Clone, Strategy::Reset).id
    }

    #[test]
    fn missing_file_yields_empty_state() {
        let dir = TempDir::new().unwrap();
        let state = load(&dir.path().join("does-not-exist.json"));
        assert!(state.is_empty());
    }

    #[test]
    fn corrupt_file_yields_empty_state_not_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{ not valid json").unwrap();
        let state = load(&path);
        assert!(state.is_empty());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");

        let id = action_id();
        let mut state = RunState::default();
        state.record(ActionResult::success(id, Duration::from_secs(2), "ok"));

        save(&path, &state).unwrap();
        let loaded = load(&path);
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.get(id).unwrap().message.as_deref(), Some("ok"));
    }

    #[test]
    fn save_leaves_no_tmp_file_behind() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        save(&path, &RunState::default()).unwrap();
        assert!(!path.with_extension("tmp").exists());
        assert!(path.exists());
    }

    #[test]
    fn unknown_fields_survive_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(
            &path,
            r#"{"actions": {}, "schema_version": 2, "written_by": "future-gitrun"}"#,
        )
        .unwrap();

        let state = load(&path);
        save(&path, &state).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("future-gitrun"));
        assert!(contents.contains("schema_version"));
    }
}
