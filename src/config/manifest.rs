//! config::manifest
//!
//! Hierarchical YAML manifest loading: parent inheritance, cycle detection,
//! `kind` discrimination, environment expansion, and validation (spec §4.5).

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::schema::{
    ForgeSourceYaml, RepoSpec, RepoSpecYaml, RepositoriesYaml, SchemaError, Strategy,
    WorkspaceConfigYaml, WorkspaceYaml,
};

/// Errors from manifest loading.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// The manifest file could not be read.
    #[error("failed to read manifest '{path}': {source}")]
    ReadError {
        /// Path that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The manifest file is not valid YAML.
    #[error("failed to parse manifest '{path}': {message}")]
    ParseError {
        /// Path that failed to parse.
        path: PathBuf,
        /// Error detail from the YAML parser.
        message: String,
    },

    /// A repository or workspace value failed schema validation.
    #[error("invalid manifest value: {0}")]
    Schema(#[from] SchemaError),

    /// A `parent` chain revisits an already-loaded manifest.
    #[error("cycle detected loading manifest chain: {0} was already visited")]
    Cycle(PathBuf),

    /// Two repositories resolve to the same `target_path` with different URLs.
    #[error(
        "target path '{path}' is claimed by both '{url_a}' and '{url_b}'"
    )]
    ConflictingTargetPath {
        /// The colliding target path.
        path: PathBuf,
        /// First source's clone URL.
        url_a: String,
        /// Second source's clone URL.
        url_b: String,
    },

    /// `cleanup_orphans: true` was set without any `roots`.
    #[error("cleanup_orphans requires at least one root")]
    CleanupOrphansWithoutRoots,

    /// `max_retries` was negative.
    #[error("max_retries must be >= 0, got {0}")]
    NegativeMaxRetries(i64),

    /// `parallel` was zero.
    #[error("parallel must be >= 1, got 0")]
    ZeroParallel,
}

/// The resolved, merged configuration for a `repositories`-kind manifest.
#[derive(Debug, Clone)]
pub struct RepositoriesConfig {
    /// Default mutation strategy for repos without a per-repo override.
    pub strategy: Strategy,
    /// Worker pool width.
    pub parallel: u32,
    /// Maximum retry attempts per action.
    pub max_retries: i64,
    /// Default `strict_branch_checkout` for repos without an override.
    pub strict_branch_checkout: bool,
    /// Whether orphan cleanup is enabled.
    pub cleanup_orphans: bool,
    /// Roots searched for orphans when cleanup is enabled.
    pub roots: Vec<PathBuf>,
    /// The resolved repository list.
    pub repositories: Vec<RepoSpec>,
}

impl Default for RepositoriesConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::default(),
            parallel: 5,
            max_retries: 2,
            strict_branch_checkout: false,
            cleanup_orphans: false,
            roots: Vec::new(),
            repositories: Vec::new(),
        }
    }
}

/// How repository target paths are derived from a forge listing when a
/// workspace recurses into subgroups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubgroupMode {
    /// No subgroup recursion: use only the repo's final name.
    #[default]
    None,
    /// Replace `/` with `flat_separator`.
    Flat,
    /// Preserve the subgroup path structure.
    Nested,
}

/// Resolved forge-listing settings, after precedence resolution.
#[derive(Debug, Clone, Default)]
pub struct ForgeSource {
    /// `github`, `gitlab`, or `gitea`.
    pub provider: Option<String>,
    /// Organization to list.
    pub org: Option<String>,
    /// User to list.
    pub user: Option<String>,
    /// Custom API base URL.
    pub base_url: Option<String>,
    /// Auth token, environment-expanded.
    pub token: Option<String>,
    /// Whether to recurse into subgroups.
    pub include_subgroups: bool,
    /// Subgroup target-path derivation mode.
    pub subgroup_mode: SubgroupMode,
    /// Separator used in flat mode.
    pub flat_separator: String,
}

impl ForgeSource {
    fn from_yaml(raw: &ForgeSourceYaml) -> Self {
        Self {
            provider: raw.provider.clone().map(|s| expand_env(&s)),
            org: raw.org.clone().map(|s| expand_env(&s)),
            user: raw.user.clone().map(|s| expand_env(&s)),
            base_url: raw.base_url.clone().map(|s| expand_env(&s)),
            token: raw.token.clone().map(|s| expand_env(&s)),
            include_subgroups: raw.include_subgroups.unwrap_or(false),
            subgroup_mode: match raw.subgroup_mode.as_deref() {
                Some("flat") => SubgroupMode::Flat,
                Some("nested") => SubgroupMode::Nested,
                _ => SubgroupMode::None,
            },
            flat_separator: raw.flat_separator.clone().unwrap_or_else(|| "-".to_string()),
        }
    }

    /// Merge `other` as a lower-precedence fallback: fields unset here are
    /// filled in from `other`.
    fn merged_with(mut self, other: &ForgeSource) -> Self {
        self.provider = self.provider.or_else(|| other.provider.clone());
        self.org = self.org.or_else(|| other.org.clone());
        self.user = self.user.or_else(|| other.user.clone());
        self.base_url = self.base_url.or_else(|| other.base_url.clone());
        self.token = self.token.or_else(|| other.token.clone());
        self
    }
}

/// A workspace's declared collection kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkspaceKind {
    /// List repositories from a forge.
    Forge,
    /// Scan a local directory at depth 1.
    Git,
    /// Recursively load a nested manifest.
    Config,
}

/// A single resolved workspace entry.
#[derive(Debug, Clone)]
pub struct Workspace {
    /// Local path for this workspace.
    pub path: PathBuf,
    /// Workspace kind.
    pub kind: WorkspaceKind,
    /// Forge source, resolved through the precedence chain (only for `Forge`).
    pub source: Option<ForgeSource>,
}

/// The resolved, merged configuration for a `workspace`-kind manifest.
#[derive(Debug, Clone, Default)]
pub struct WorkspaceConfig {
    /// Worker pool width.
    pub parallel: u32,
    /// Default clone protocol (`ssh` or `https`).
    pub clone_proto: Option<String>,
    /// Non-default SSH port; `None` means the protocol default.
    pub ssh_port: Option<u16>,
    /// Resolved workspaces, keyed by name.
    pub workspaces: HashMap<String, Workspace>,
    /// Named profiles.
    pub profiles: HashMap<String, ForgeSource>,
}

/// The two manifest kinds.
#[derive(Debug, Clone)]
pub enum Config {
    /// A flat list of repositories plus run settings.
    Repositories(RepositoriesConfig),
    /// Named workspaces resolved from forges, directories, or nested configs.
    Workspace(WorkspaceConfig),
}

/// Expand `${VAR}` and `$VAR` references in a string from the process
/// environment. Unresolvable variables are left as empty strings, matching
/// `shellexpand`'s default behavior for env expansion.
fn expand_env(input: &str) -> String {
    shellexpand::env(input)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| input.to_string())
}

/// Load a manifest from `path`, resolving its `parent` chain.
pub fn load(path: &Path) -> Result<Config, ManifestError> {
    let mut visited = HashSet::new();
    load_inner(path, &mut visited)
}

fn load_inner(path: &Path, visited: &mut HashSet<PathBuf>) -> Result<Config, ManifestError> {
    let canonical = canonicalize_best_effort(path);
    if !visited.insert(canonical.clone()) {
        return Err(ManifestError::Cycle(canonical));
    }

    let contents = fs::read_to_string(path).map_err(|e| ManifestError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;

    let raw: serde_yaml::Value =
        serde_yaml::from_str(&contents).map_err(|e| ManifestError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    match detect_kind(&raw) {
        DocKind::Workspace => load_workspace(path, &contents, visited).map(Config::Workspace),
        DocKind::Repositories => {
            load_repositories(path, &contents, visited).map(Config::Repositories)
        }
    }
}

enum DocKind {
    Repositories,
    Workspace,
}

fn detect_kind(raw: &serde_yaml::Value) -> DocKind {
    if let Some(kind) = raw.get("kind").and_then(|v| v.as_str()) {
        return match kind {
            "workspace" => DocKind::Workspace,
            _ => DocKind::Repositories,
        };
    }
    if raw.get("workspaces").is_some() || raw.get("profiles").is_some() {
        return DocKind::Workspace;
    }
    DocKind::Repositories
}

fn resolve_parent_path(current_file: &Path, parent: &str) -> PathBuf {
    let expanded = shellexpand::full(parent)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| parent.to_string());
    let expanded_path = PathBuf::from(expanded);
    if expanded_path.is_absolute() {
        return expanded_path;
    }
    current_file
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(expanded_path)
}

fn canonicalize_best_effort(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

fn load_repositories(
    path: &Path,
    contents: &str,
    visited: &mut HashSet<PathBuf>,
) -> Result<RepositoriesConfig, ManifestError> {
    let raw: RepositoriesYaml =
        serde_yaml::from_str(contents).map_err(|e| ManifestError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    let mut resolved = if let Some(parent_ref) = &raw.parent {
        let parent_path = resolve_parent_path(path, parent_ref);
        match load_inner(&parent_path, visited)? {
            Config::Repositories(parent_cfg) => parent_cfg,
            Config::Workspace(_) => RepositoriesConfig::default(),
        }
    } else {
        RepositoriesConfig::default()
    };

    if let Some(s) = &raw.strategy {
        resolved.strategy = Strategy::parse(s)?;
    }
    if let Some(p) = raw.parallel {
        resolved.parallel = p;
    }
    if let Some(m) = raw.max_retries {
        resolved.max_retries = m;
    }
    if let Some(s) = raw.strict_branch_checkout {
        resolved.strict_branch_checkout = s;
    }
    if let Some(c) = raw.cleanup_orphans {
        resolved.cleanup_orphans = c;
    }
    if let Some(roots) = &raw.roots {
        // Lists REPLACE rather than append.
        resolved.roots = roots.iter().map(|r| PathBuf::from(expand_env(r))).collect();
    }
    if !raw.repositories.is_empty() {
        resolved.repositories = raw
            .repositories
            .into_iter()
            .map(expand_repo_spec_env)
            .map(RepoSpec::from_yaml)
            .collect::<Result<Vec<_>, _>>()?;
    }

    validate_repositories(&resolved)?;
    Ok(resolved)
}

fn expand_repo_spec_env(mut raw: RepoSpecYaml) -> RepoSpecYaml {
    raw.url = raw.url.map(|s| expand_env(&s));
    raw.path = raw.path.map(|s| expand_env(&s));
    raw.branch = raw.branch.map(|s| expand_env(&s));
    raw
}

fn validate_repositories(cfg: &RepositoriesConfig) -> Result<(), ManifestError> {
    if cfg.parallel == 0 {
        return Err(ManifestError::ZeroParallel);
    }
    if cfg.max_retries < 0 {
        return Err(ManifestError::NegativeMaxRetries(cfg.max_retries));
    }
    if cfg.cleanup_orphans && cfg.roots.is_empty() {
        return Err(ManifestError::CleanupOrphansWithoutRoots);
    }

    let mut seen: HashMap<PathBuf, String> = HashMap::new();
    for repo in &cfg.repositories {
        let path = repo.target_path.as_path().to_path_buf();
        let url = repo.clone_url.clone().unwrap_or_default();
        if let Some(existing_url) = seen.get(&path) {
            if existing_url != &url {
                return Err(ManifestError::ConflictingTargetPath {
                    path,
                    url_a: existing_url.clone(),
                    url_b: url,
                });
            }
        } else {
            seen.insert(path, url);
        }
    }

    Ok(())
}

fn load_workspace(
    path: &Path,
    contents: &str,
    visited: &mut HashSet<PathBuf>,
) -> Result<WorkspaceConfig, ManifestError> {
    let raw: WorkspaceConfigYaml =
        serde_yaml::from_str(contents).map_err(|e| ManifestError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    let mut resolved = if let Some(parent_ref) = &raw.parent {
        let parent_path = resolve_parent_path(path, parent_ref);
        match load_inner(&parent_path, visited)? {
            Config::Workspace(parent_cfg) => parent_cfg,
            Config::Repositories(_) => WorkspaceConfig {
                parallel: 5,
                ..Default::default()
            },
        }
    } else {
        WorkspaceConfig {
            parallel: 5,
            ..Default::default()
        }
    };

    if let Some(p) = raw.parallel {
        resolved.parallel = p;
    }
    if raw.clone_proto.is_some() {
        resolved.clone_proto = raw.clone_proto.clone();
    }
    if raw.ssh_port.is_some() {
        resolved.ssh_port = raw.ssh_port;
    }

    // Profiles are a map: UNION, child wins on key collision.
    for (name, profile_yaml) in &raw.profiles {
        resolved
            .profiles
            .insert(name.clone(), ForgeSource::from_yaml(profile_yaml));
    }

    let active_profile = raw
        .profile
        .clone()
        .and_then(|name| resolved.profiles.get(&name).cloned());

    for (name, ws_yaml) in &raw.workspaces {
        resolved
            .workspaces
            .insert(name.clone(), resolve_workspace(ws_yaml, &resolved.profiles, &active_profile));
    }

    if resolved.parallel == 0 {
        return Err(ManifestError::ZeroParallel);
    }

    Ok(resolved)
}

fn resolve_workspace(
    raw: &WorkspaceYaml,
    profiles: &HashMap<String, ForgeSource>,
    active_profile: &Option<ForgeSource>,
) -> Workspace {
    let kind = match raw.kind.as_deref() {
        Some("forge") => WorkspaceKind::Forge,
        Some("git") => WorkspaceKind::Git,
        Some("config") => WorkspaceKind::Config,
        _ if raw.source.is_some() => WorkspaceKind::Forge,
        _ => WorkspaceKind::Git,
    };

    let source = if kind == WorkspaceKind::Forge {
        let inline = raw
            .source
            .as_ref()
            .map(ForgeSource::from_yaml)
            .unwrap_or_default();
        let ws_profile = raw.profile.as_ref().and_then(|p| profiles.get(p));

        // Precedence: workspace source > workspace profile > active profile.
        let mut merged = inline;
        if let Some(p) = ws_profile {
            merged = merged.merged_with(p);
        }
        if let Some(p) = active_profile {
            merged = merged.merged_with(p);
        }
        Some(merged)
    } else {
        None
    };

    Workspace {
        path: PathBuf::from(expand_env(&raw.path)),
        kind,
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn loads_flat_repositories() {
        let dir = TempDir::new().unwrap();
        let path = write(
            dir.path(),
            "repos.yaml",
            r#"
kind: repositories
strategy: pull
parallel: 3
repositories:
  - url: https://github.com/org/a.git
  - url: https://github.com/org/b.git
    path: ./custom/b
"#,
        );
        let cfg = match load(&path).unwrap() {
            Config::Repositories(cfg) => cfg,
            _ => panic!("expected repositories kind"),
        };
        assert_eq!(cfg.strategy, Strategy::Pull);
        assert_eq!(cfg.parallel, 3);
        assert_eq!(cfg.repositories.len(), 2);
        assert_eq!(cfg.repositories[0].name.as_str(), "a");
        assert_eq!(cfg.repositories[1].target_path.as_path(), Path::new("custom/b"));
    }

    #[test]
    fn parent_inheritance_merges_scalars_and_replaces_lists() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "base.yaml",
            r#"
kind: repositories
parallel: 8
strategy: pull
repositories:
  - url: https://github.com/org/from-base.git
"#,
        );
        let child = write(
            dir.path(),
            "child.yaml",
            r#"
kind: repositories
parent: ./base.yaml
strategy: reset
repositories:
  - url: https://github.com/org/from-child.git
"#,
        );
        let cfg = match load(&child).unwrap() {
            Config::Repositories(cfg) => cfg,
            _ => panic!("expected repositories kind"),
        };
        assert_eq!(cfg.strategy, Strategy::Reset);
        assert_eq!(cfg.parallel, 8);
        assert_eq!(cfg.repositories.len(), 1);
        assert_eq!(cfg.repositories[0].name.as_str(), "from-child");
    }

    #[test]
    fn cycle_is_detected() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "a.yaml",
            "kind: repositories\nparent: ./b.yaml\n",
        );
        let b = write(
            dir.path(),
            "b.yaml",
            "kind: repositories\nparent: ./a.yaml\n",
        );
        let err = load(&b).unwrap_err();
        assert!(matches!(err, ManifestError::Cycle(_)));
    }

    #[test]
    fn duplicate_target_path_with_different_url_is_error() {
        let dir = TempDir::new().unwrap();
        let path = write(
            dir.path(),
            "repos.yaml",
            r#"
kind: repositories
repositories:
  - url: https://github.com/org/a.git
    path: ./shared
  - url: https://github.com/org/b.git
    path: ./shared
"#,
        );
        let err = load(&path).unwrap_err();
        assert!(matches!(err, ManifestError::ConflictingTargetPath { .. }));
    }

    #[test]
    fn cleanup_orphans_without_roots_is_error() {
        let dir = TempDir::new().unwrap();
        let path = write(
            dir.path(),
            "repos.yaml",
            "kind: repositories\ncleanupOrphans: true\n",
        );
        let err = load(&path).unwrap_err();
        assert!(matches!(err, ManifestError::CleanupOrphansWithoutRoots));
    }

    #[test]
    fn negative_max_retries_is_error() {
        let dir = TempDir::new().unwrap();
        let path = write(
            dir.path(),
            "repos.yaml",
            "kind: repositories\nmaxRetries: -1\n",
        );
        let err = load(&path).unwrap_err();
        assert!(matches!(err, ManifestError::NegativeMaxRetries(-1)));
    }

    #[test]
    fn workspace_kind_detected_by_content() {
        let dir = TempDir::new().unwrap();
        let path = write(
            dir.path(),
            "ws.yaml",
            r#"
workspaces:
  foo:
    path: ./foo
    type: git
"#,
        );
        let cfg = match load(&path).unwrap() {
            Config::Workspace(cfg) => cfg,
            _ => panic!("expected workspace kind"),
        };
        assert_eq!(cfg.workspaces.len(), 1);
        assert_eq!(cfg.workspaces["foo"].kind, WorkspaceKind::Git);
    }

    #[test]
    fn forge_source_precedence_workspace_over_profile() {
        let dir = TempDir::new().unwrap();
        let path = write(
            dir.path(),
            "ws.yaml",
            r#"
kind: workspace
profile: work
workspaces:
  foo:
    path: ./foo
    type: forge
    source:
      provider: github
      org: myorg
profiles:
  work:
    provider: gitlab
    org: other-org
"#,
        );
        let cfg = match load(&path).unwrap() {
            Config::Workspace(cfg) => cfg,
            _ => panic!("expected workspace kind"),
        };
        let source = cfg.workspaces["foo"].source.as_ref().unwrap();
        assert_eq!(source.provider.as_deref(), Some("github"));
        assert_eq!(source.org.as_deref(), Some("myorg"));
    }

    #[test]
    fn env_var_expansion_in_repo_url() {
        std::env::set_var("GITRUN_TEST_HOST", "example.com");
        let dir = TempDir::new().unwrap();
        let path = write(
            dir.path(),
            "repos.yaml",
            "kind: repositories\nrepositories:\n  - url: https://${GITRUN_TEST_HOST}/org/a.git\n",
        );
        let cfg = match load(&path).unwrap() {
            Config::Repositories(cfg) => cfg,
            _ => panic!("expected repositories kind"),
        };
        assert_eq!(
            cfg.repositories[0].clone_url.as_deref(),
            Some("https://example.com/org/a.git")
        );
        std::env::remove_var("GITRUN_TEST_HOST");
    }
}
