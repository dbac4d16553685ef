//! config::schema
//!
//! Typed representations of the manifest YAML schema (spec §6) plus the
//! validated domain newtypes built from it.
//!
//! Raw `*Yaml` structs mirror the wire format field-for-field (including its
//! `camelCase` spelling) and stay permissive; [`RepoSpec`] and friends are
//! the validated, canonicalized types the rest of the engine consumes.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors constructing validated domain types from raw manifest values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// A repository name contained a disallowed character or sequence.
    #[error("invalid repository name '{0}': {1}")]
    InvalidRepoName(String, &'static str),

    /// `clone_url` was empty and `assume_present` was not set.
    #[error("repository '{0}' has no clone_url and assume_present is false")]
    MissingCloneUrl(String),

    /// An unrecognized strategy string.
    #[error("unknown strategy: '{0}'")]
    UnknownStrategy(String),
}

/// A validated repository name.
///
/// Per spec: no `..`, no leading `.`, no whitespace, none of `` ~^:?*[ ``.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RepoName(String);

impl RepoName {
    /// Validate and construct a repository name.
    pub fn new(name: impl Into<String>) -> Result<Self, SchemaError> {
        let name = name.into();
        Self::validate(&name).map_err(|reason| SchemaError::InvalidRepoName(name.clone(), reason))?;
        Ok(Self(name))
    }

    fn validate(name: &str) -> Result<(), &'static str> {
        if name.is_empty() {
            return Err("name cannot be empty");
        }
        if name.starts_with('.') {
            return Err("name cannot start with '.'");
        }
        if name.contains("..") {
            return Err("name cannot contain '..'");
        }
        if name.chars().any(|c| c.is_whitespace()) {
            return Err("name cannot contain whitespace");
        }
        const INVALID_CHARS: [char; 7] = ['~', '^', ':', '?', '*', '[', '\\'];
        if name.chars().any(|c| INVALID_CHARS.contains(&c)) {
            return Err("name contains a disallowed character");
        }
        Ok(())
    }

    /// Borrow as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RepoName {
    type Error = SchemaError;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RepoName> for String {
    fn from(value: RepoName) -> Self {
        value.0
    }
}

impl std::fmt::Display for RepoName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A lexically-cleaned relative target path.
///
/// Unlike `Path::canonicalize`, this does not touch the filesystem (the
/// target directory may not exist yet for a clone action); it only resolves
/// `.` and `..` components so that two manifests spelling the same directory
/// differently compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "PathBuf", into = "PathBuf")]
pub struct TargetPath(PathBuf);

impl TargetPath {
    /// Clean and construct a target path.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, SchemaError> {
        Ok(Self(clean_path(path.as_ref())))
    }

    /// Borrow the underlying path.
    pub fn as_path(&self) -> &Path {
        &self.0
    }
}

impl TryFrom<PathBuf> for TargetPath {
    type Error = SchemaError;
    fn try_from(value: PathBuf) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TargetPath> for PathBuf {
    fn from(value: TargetPath) -> Self {
        value.0
    }
}

fn clean_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !matches!(out.components().last(), Some(Component::Normal(_)) | None)
                    || out.as_os_str().is_empty()
                {
                    out.push("..");
                } else {
                    out.pop();
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// A non-negative commit count, used for `ahead_by`/`behind_by` and
/// `commits_pulled`/`commits_pushed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct CommitCount(pub u32);

impl CommitCount {
    /// Zero commits.
    pub const ZERO: CommitCount = CommitCount(0);
}

impl std::fmt::Display for CommitCount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The mutation applied to an existing working tree (spec §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Fetch, then hard reset onto upstream.
    Reset,
    /// Fetch, fast-forward merge; fails on non-fast-forward.
    Pull,
    /// Fetch only; never touches the working tree.
    Fetch,
    /// Fetch, then rebase onto upstream.
    Rebase,
    /// Remove the directory and clone fresh.
    CloneFresh,
    /// No-op.
    Skip,
}

impl Strategy {
    /// Parse a strategy from its wire-format string (also accepts `clone-fresh`
    /// and `clonefresh` spellings for leniency with hand-written manifests).
    pub fn parse(s: &str) -> Result<Self, SchemaError> {
        match s {
            "reset" => Ok(Strategy::Reset),
            "pull" => Ok(Strategy::Pull),
            "fetch" => Ok(Strategy::Fetch),
            "rebase" => Ok(Strategy::Rebase),
            "clone-fresh" | "clonefresh" => Ok(Strategy::CloneFresh),
            "skip" => Ok(Strategy::Skip),
            other => Err(SchemaError::UnknownStrategy(other.to_string())),
        }
    }
}

impl Default for Strategy {
    fn default() -> Self {
        Strategy::Reset
    }
}

/// A declared repository target, validated from a raw [`RepoSpecYaml`].
#[derive(Debug, Clone)]
pub struct RepoSpec {
    /// Repository name; derived from `clone_url` when omitted in YAML.
    pub name: RepoName,
    /// Optional human-readable description.
    pub description: Option<String>,
    /// Optional forge/provider tag (informational).
    pub provider: Option<String>,
    /// Clone URL; `None` only when `assume_present` is true.
    pub clone_url: Option<String>,
    /// Additional named remotes to configure after clone.
    pub additional_remotes: HashMap<String, String>,
    /// Where this repository lives relative to a scan/plan root.
    pub target_path: TargetPath,
    /// Branch to check out after clone/update.
    pub branch: Option<String>,
    /// Whether a missing `branch` after checkout is a hard failure.
    pub strict_branch_checkout: bool,
    /// Per-repo strategy override; `None` inherits the plan default.
    pub strategy: Option<Strategy>,
    /// Whether this repo participates in the plan at all.
    pub enabled: bool,
    /// When true, skip any clone attempt (repo is assumed to exist on disk).
    pub assume_present: bool,
}

impl RepoSpec {
    /// Validate and build a [`RepoSpec`] from its raw YAML counterpart.
    pub fn from_yaml(raw: RepoSpecYaml) -> Result<Self, SchemaError> {
        if raw.url.is_none() && !raw.assume_present {
            let label = raw.name.clone().unwrap_or_default();
            return Err(SchemaError::MissingCloneUrl(label));
        }

        let name = match raw.name {
            Some(n) => RepoName::new(n)?,
            None => {
                let url = raw.url.as_deref().unwrap_or_default();
                let derived = crate::git::extract_repo_name_from_url(url)
                    .unwrap_or_else(|_| "repo".to_string());
                RepoName::new(derived)?
            }
        };

        let target_path = match raw.path {
            Some(p) => TargetPath::new(p)?,
            None => TargetPath::new(name.as_str())?,
        };

        let strategy = raw.strategy.as_deref().map(Strategy::parse).transpose()?;

        Ok(RepoSpec {
            name,
            description: None,
            provider: None,
            clone_url: raw.url,
            additional_remotes: raw.additional_remotes.unwrap_or_default(),
            target_path,
            branch: raw.branch,
            strict_branch_checkout: raw.strict_branch_checkout.unwrap_or(false),
            strategy,
            enabled: raw.enabled.unwrap_or(true),
            assume_present: raw.assume_present,
        })
    }
}

/// Raw per-repository entry as it appears under `repositories:` in YAML.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RepoSpecYaml {
    /// Clone URL (required unless `assume_present`).
    pub url: Option<String>,
    /// Explicit name; derived from `url` when absent.
    pub name: Option<String>,
    /// Target path; defaults to `name`.
    pub path: Option<String>,
    /// Branch to check out.
    pub branch: Option<String>,
    /// Per-repo strategy override.
    pub strategy: Option<String>,
    /// Additional remotes, name -> URL.
    #[serde(rename = "additionalRemotes")]
    pub additional_remotes: Option<HashMap<String, String>>,
    /// Per-repo override of `strictBranchCheckout`.
    #[serde(rename = "strictBranchCheckout")]
    pub strict_branch_checkout: Option<bool>,
    /// Whether this repo is active; defaults to true.
    #[serde(default)]
    pub enabled: Option<bool>,
    /// Skip clone, assume the directory already exists.
    #[serde(default, rename = "assumePresent")]
    pub assume_present: bool,
}

/// Raw `kind: repositories` document.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RepositoriesYaml {
    /// Manifest schema version (informational).
    pub version: Option<u32>,
    /// Free-form metadata, passed through unchanged.
    #[serde(default)]
    pub metadata: HashMap<String, serde_yaml::Value>,
    /// Path to a parent manifest to inherit from.
    pub parent: Option<String>,
    /// Active profile name (workspace-kind concept, tolerated here too).
    pub profile: Option<String>,
    /// Default mutation strategy for repos without an override.
    pub strategy: Option<String>,
    /// Worker pool width.
    pub parallel: Option<u32>,
    #[serde(rename = "maxRetries")]
    /// Maximum retry attempts per action.
    pub max_retries: Option<i64>,
    #[serde(rename = "strictBranchCheckout")]
    /// Default value of `strict_branch_checkout` for repos without an override.
    pub strict_branch_checkout: Option<bool>,
    #[serde(rename = "cleanupOrphans")]
    /// Whether orphaned directories under `roots` should be flagged.
    pub cleanup_orphans: Option<bool>,
    /// Root directories searched for orphans when `cleanup_orphans` is set.
    pub roots: Option<Vec<String>>,
    /// The declared repositories.
    #[serde(default)]
    pub repositories: Vec<RepoSpecYaml>,
}

/// Source for a `forge`-typed workspace.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ForgeSourceYaml {
    /// `github`, `gitlab`, or `gitea`.
    pub provider: Option<String>,
    /// Organization or group to list.
    pub org: Option<String>,
    /// Individual user to list (mutually exclusive with `org` in practice).
    pub user: Option<String>,
    #[serde(rename = "baseURL")]
    /// Custom API base URL (self-hosted instances).
    pub base_url: Option<String>,
    /// Auth token, possibly `${VAR}`-expanded.
    pub token: Option<String>,
    #[serde(rename = "includeSubgroups")]
    /// Whether to recurse into subgroups (GitLab) / sub-orgs.
    pub include_subgroups: Option<bool>,
    #[serde(rename = "subgroupMode")]
    /// `flat` or `nested` path derivation for subgroup repos.
    pub subgroup_mode: Option<String>,
    #[serde(rename = "flatSeparator")]
    /// Separator used when `subgroup_mode = flat`.
    pub flat_separator: Option<String>,
}

/// A single workspace entry under `workspaces:`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct WorkspaceYaml {
    /// Local path for this workspace.
    pub path: String,
    /// `forge`, `git`, or `config`; inferred if omitted.
    #[serde(rename = "type")]
    pub kind: Option<String>,
    /// Profile name to resolve forge settings from.
    pub profile: Option<String>,
    /// Inline forge source, used when `kind == forge`.
    pub source: Option<ForgeSourceYaml>,
}

/// Raw `kind: workspace` document.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct WorkspaceConfigYaml {
    /// Manifest schema version (informational).
    pub version: Option<u32>,
    /// Path to a parent manifest to inherit from.
    pub parent: Option<String>,
    /// Active profile name.
    pub profile: Option<String>,
    /// Worker pool width.
    pub parallel: Option<u32>,
    #[serde(rename = "cloneProto")]
    /// `ssh` or `https`, the default clone protocol for forge-derived repos.
    pub clone_proto: Option<String>,
    #[serde(rename = "sshPort")]
    /// Non-default SSH port; 0 means "use 22".
    pub ssh_port: Option<u16>,
    /// Named workspaces, keyed by workspace name.
    #[serde(default)]
    pub workspaces: HashMap<String, WorkspaceYaml>,
    /// Named profiles, keyed by profile name.
    #[serde(default)]
    pub profiles: HashMap<String, ForgeSourceYaml>,
}
