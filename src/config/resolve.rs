//! config::resolve
//!
//! The bridge between a resolved [`Workspace`] (whichever of the three
//! kinds) and the [`RepoSpec`] list the Planner consumes (spec §4.5):
//!
//! - `forge`: invokes a [`ForgeClient`] to list repositories, then derives
//!   each repo's target path per `include_subgroups`/`subgroup_mode`.
//! - `git`: scans the workspace directory at depth 1 for subdirectories
//!   containing `.git`, reading the `origin` remote from each.
//! - `config`: recursively loads a nested manifest at
//!   `{workspace.path}/.gz-git.{yaml,yml}`, falling back to a `git`-kind scan
//!   when no nested manifest is present.

use std::path::{Path, PathBuf};

use thiserror::Error;

use super::manifest::{self, Config, ForgeSource, ManifestError, SubgroupMode, Workspace, WorkspaceKind};
use super::schema::{RepoName, RepoSpec, SchemaError, TargetPath};
use crate::forge::{create_forge, ForgeError, ForgeRepo};
use crate::git::parse_origin_remote_from_config;

/// Errors resolving a forge workspace into repo specs.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The workspace is not `kind: forge`.
    #[error("workspace is not a forge workspace")]
    NotAForgeWorkspace,

    /// Neither `org` nor `user` was set on the forge source.
    #[error("forge workspace requires either 'org' or 'user'")]
    MissingOrgOrUser,

    /// The forge provider could not be created or the listing call failed.
    #[error("forge error: {0}")]
    Forge(#[from] ForgeError),

    /// A listed repo produced an invalid [`RepoSpec`] field.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Reading the workspace directory failed.
    #[error("failed to read workspace directory '{path}': {source}")]
    Io {
        /// The directory that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Loading a nested `config`-kind workspace's manifest failed.
    #[error("failed to load nested config workspace manifest: {0}")]
    NestedManifest(#[from] ManifestError),
}

/// List a `forge`-kind workspace's repositories and convert them into
/// [`RepoSpec`]s rooted at `workspace.path`. `clone_proto` comes from the
/// enclosing [`super::manifest::WorkspaceConfig`] (`ssh` or `https`; `None`
/// defaults to HTTPS).
pub async fn resolve_forge_workspace(
    workspace: &Workspace,
    clone_proto: Option<&str>,
) -> Result<Vec<RepoSpec>, ResolveError> {
    if workspace.kind != WorkspaceKind::Forge {
        return Err(ResolveError::NotAForgeWorkspace);
    }
    let source = workspace.source.as_ref().ok_or(ResolveError::NotAForgeWorkspace)?;

    let provider_name = source.provider.as_deref().unwrap_or("github");
    let client = create_forge(provider_name, source.token.clone(), source.base_url.clone())?;

    let repos = if let Some(org) = &source.org {
        client.list_org_repos(org, source.include_subgroups).await?
    } else if let Some(user) = &source.user {
        client.list_user_repos(user).await?
    } else {
        return Err(ResolveError::MissingOrgOrUser);
    };

    repos
        .into_iter()
        .map(|repo| to_repo_spec(&repo, workspace, source, clone_proto))
        .collect()
}

/// Scan a `git`-kind workspace: every depth-1 subdirectory containing
/// `.git` becomes a `RepoSpec` with `assume_present: true` (it already
/// exists on disk by definition) and `clone_url` read from its `origin`
/// remote, when one is configured.
pub fn resolve_git_workspace(workspace: &Workspace) -> Result<Vec<RepoSpec>, ResolveError> {
    if workspace.kind != WorkspaceKind::Git {
        return Err(ResolveError::NotAForgeWorkspace);
    }

    let mut specs = Vec::new();
    let entries = match std::fs::read_dir(&workspace.path) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(specs),
        Err(e) => {
            return Err(ResolveError::Io {
                path: workspace.path.clone(),
                source: e,
            })
        }
    };

    let mut dirs: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    dirs.sort();

    for dir in dirs {
        if !dir.join(".git").exists() {
            continue;
        }
        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let clone_url = read_origin_url(&dir);
        let repo_name = match RepoName::new(&name) {
            Ok(n) => n,
            Err(_) => continue,
        };
        let target_path = TargetPath::new(&dir)?;
        specs.push(RepoSpec {
            name: repo_name,
            description: None,
            provider: None,
            clone_url,
            additional_remotes: std::collections::HashMap::new(),
            target_path,
            branch: None,
            strict_branch_checkout: false,
            strategy: None,
            enabled: true,
            assume_present: true,
        });
    }

    Ok(specs)
}

fn read_origin_url(repo_dir: &Path) -> Option<String> {
    let config_text = std::fs::read_to_string(repo_dir.join(".git").join("config")).ok()?;
    let url = parse_origin_remote_from_config(&config_text);
    if url.is_empty() {
        None
    } else {
        Some(url)
    }
}

/// Resolve a `config`-kind workspace: recursively load a nested manifest at
/// `{workspace.path}/.gz-git.yaml` or `.yml`. If neither exists, fall back to
/// a `git`-kind scan of the same directory (spec §4.5).
///
/// A nested manifest that is itself `workspace`-kind is resolved with
/// [`resolve_workspace_config`] via `Box::pin`, since this function and that
/// one are mutually recursive through arbitrarily deep `config` chains.
pub fn resolve_config_workspace<'a>(
    workspace: &'a Workspace,
    _clone_proto: Option<&'a str>,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Vec<RepoSpec>, ResolveError>> + Send + 'a>> {
    Box::pin(async move {
        if workspace.kind != WorkspaceKind::Config {
            return Err(ResolveError::NotAForgeWorkspace);
        }

        for candidate in [".gz-git.yaml", ".gz-git.yml"] {
            let nested_path = workspace.path.join(candidate);
            if !nested_path.exists() {
                continue;
            }
            return match manifest::load(&nested_path)? {
                Config::Repositories(cfg) => Ok(cfg.repositories),
                Config::Workspace(nested) => resolve_workspace_config(&nested).await,
            };
        }

        resolve_git_workspace(&Workspace {
            path: workspace.path.clone(),
            kind: WorkspaceKind::Git,
            source: None,
        })
    })
}

/// Resolve every workspace in a [`manifest::WorkspaceConfig`] into a single,
/// concatenated `RepoSpec` list. Forge and config workspaces are resolved
/// sequentially (each may itself make network calls or recurse); git
/// workspaces are pure filesystem work.
pub async fn resolve_workspace_config(cfg: &manifest::WorkspaceConfig) -> Result<Vec<RepoSpec>, ResolveError> {
    let mut all = Vec::new();
    for workspace in cfg.workspaces.values() {
        let specs = match workspace.kind {
            WorkspaceKind::Forge => resolve_forge_workspace(workspace, cfg.clone_proto.as_deref()).await?,
            WorkspaceKind::Git => resolve_git_workspace(workspace)?,
            WorkspaceKind::Config => resolve_config_workspace(workspace, cfg.clone_proto.as_deref()).await?,
        };
        all.extend(specs);
    }
    Ok(all)
}

fn to_repo_spec(
    repo: &ForgeRepo,
    workspace: &Workspace,
    source: &ForgeSource,
    clone_proto: Option<&str>,
) -> Result<RepoSpec, SchemaError> {
    let clone_url = choose_clone_url(repo, clone_proto);
    let relative = derive_relative_path(repo, source);
    let target_path = TargetPath::new(workspace.path.join(relative))?;
    let name = RepoName::new(&repo.name)?;

    Ok(RepoSpec {
        name,
        description: None,
        provider: source.provider.clone(),
        clone_url: Some(clone_url),
        additional_remotes: std::collections::HashMap::new(),
        target_path,
        branch: None,
        strict_branch_checkout: false,
        strategy: None,
        enabled: !repo.archived,
        assume_present: false,
    })
}

fn choose_clone_url(repo: &ForgeRepo, clone_proto: Option<&str>) -> String {
    match clone_proto {
        Some("ssh") => repo.ssh_url.clone().unwrap_or_else(|| repo.clone_url.clone()),
        _ => repo.clone_url.clone(),
    }
}

fn derive_relative_path(repo: &ForgeRepo, source: &ForgeSource) -> PathBuf {
    match source.subgroup_mode {
        SubgroupMode::None => PathBuf::from(&repo.name),
        SubgroupMode::Flat => PathBuf::from(repo.full_name.replace('/', &source.flat_separator)),
        SubgroupMode::Nested => PathBuf::from(&repo.full_name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::manifest::ForgeSource;

    fn repo(full_name: &str) -> ForgeRepo {
        let name = full_name.rsplit('/').next().unwrap().to_string();
        ForgeRepo {
            name,
            full_name: full_name.to_string(),
            clone_url: format!("https://example.com/{full_name}.git"),
            ssh_url: Some(format!("git@example.com:{full_name}.git")),
            default_branch: "main".to_string(),
            archived: false,
            fork: false,
            private: false,
            stars: 0,
            language: None,
            pushed_at: None,
        }
    }

    fn workspace() -> Workspace {
        Workspace {
            path: PathBuf::from("/base/ws"),
            kind: WorkspaceKind::Forge,
            source: Some(ForgeSource::default()),
        }
    }

    #[test]
    fn none_mode_uses_bare_repo_name() {
        let r = repo("group/subgroup/widgets");
        let source = ForgeSource::default();
        let rel = derive_relative_path(&r, &source);
        assert_eq!(rel, PathBuf::from("widgets"));
    }

    #[test]
    fn flat_mode_joins_full_name_with_separator() {
        let r = repo("group/subgroup/widgets");
        let source = ForgeSource {
            subgroup_mode: SubgroupMode::Flat,
            flat_separator: "-".to_string(),
            ..ForgeSource::default()
        };
        let rel = derive_relative_path(&r, &source);
        assert_eq!(rel, PathBuf::from("group-subgroup-widgets"));
    }

    #[test]
    fn nested_mode_preserves_path_structure() {
        let r = repo("group/subgroup/widgets");
        let source = ForgeSource {
            subgroup_mode: SubgroupMode::Nested,
            ..ForgeSource::default()
        };
        let rel = derive_relative_path(&r, &source);
        assert_eq!(rel, PathBuf::from("group/subgroup/widgets"));
    }

    #[test]
    fn ssh_proto_prefers_ssh_url() {
        let r = repo("acme/widgets");
        assert_eq!(choose_clone_url(&r, Some("ssh")), "git@example.com:acme/widgets.git");
    }

    #[test]
    fn default_proto_uses_https_clone_url() {
        let r = repo("acme/widgets");
        assert_eq!(choose_clone_url(&r, None), "https://example.com/acme/widgets.git");
    }

    #[tokio::test]
    async fn non_forge_workspace_is_rejected() {
        let ws = Workspace {
            path: PathBuf::from("/base"),
            kind: WorkspaceKind::Git,
            source: None,
        };
        let err = resolve_forge_workspace(&ws, None).await.unwrap_err();
        assert!(matches!(err, ResolveError::NotAForgeWorkspace));
    }

    #[tokio::test]
    async fn missing_org_and_user_is_rejected() {
        let ws = workspace();
        let err = resolve_forge_workspace(&ws, None).await.unwrap_err();
        assert!(matches!(err, ResolveError::MissingOrgOrUser));
    }

    fn init_git_repo_with_origin(path: &Path, origin: Option<&str>) {
        std::fs::create_dir_all(path).unwrap();
        let status = std::process::Command::new("git")
            .args(["init", "--quiet"])
            .current_dir(path)
            .status()
            .unwrap();
        assert!(status.success());
        if let Some(url) = origin {
            let status = std::process::Command::new("git")
                .args(["remote", "add", "origin", url])
                .current_dir(path)
                .status()
                .unwrap();
            assert!(status.success());
        }
    }

    #[test]
    fn git_workspace_scans_depth_one_dirs_with_dot_git() {
        let dir = tempfile::TempDir::new().unwrap();
        init_git_repo_with_origin(&dir.path().join("a"), Some("https://example.com/a.git"));
        std::fs::create_dir_all(dir.path().join("not-a-repo")).unwrap();

        let ws = Workspace {
            path: dir.path().to_path_buf(),
            kind: WorkspaceKind::Git,
            source: None,
        };
        let specs = resolve_git_workspace(&ws).unwrap();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].name.as_str(), "a");
        assert_eq!(specs[0].clone_url.as_deref(), Some("https://example.com/a.git"));
        assert!(specs[0].assume_present);
    }

    #[test]
    fn git_workspace_on_missing_directory_returns_empty() {
        let ws = Workspace {
            path: PathBuf::from("/nonexistent/path/that/does/not/exist"),
            kind: WorkspaceKind::Git,
            source: None,
        };
        let specs = resolve_git_workspace(&ws).unwrap();
        assert!(specs.is_empty());
    }

    #[tokio::test]
    async fn config_workspace_falls_back_to_git_scan_without_nested_manifest() {
        let dir = tempfile::TempDir::new().unwrap();
        init_git_repo_with_origin(&dir.path().join("b"), None);

        let ws = Workspace {
            path: dir.path().to_path_buf(),
            kind: WorkspaceKind::Config,
            source: None,
        };
        let specs = resolve_config_workspace(&ws, None).await.unwrap();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].name.as_str(), "b");
    }

    #[tokio::test]
    async fn config_workspace_loads_nested_manifest_when_present() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(".gz-git.yaml"),
            "kind: repositories\nrepositories:\n  - url: https://example.com/nested.git\n",
        )
        .unwrap();

        let ws = Workspace {
            path: dir.path().to_path_buf(),
            kind: WorkspaceKind::Config,
            source: None,
        };
        let specs = resolve_config_workspace(&ws, None).await.unwrap();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].name.as_str(), "nested");
    }
}
