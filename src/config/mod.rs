//! config
//!
//! Manifest schema, hierarchical loading, and upward directory discovery.

pub mod discover;
pub mod manifest;
pub mod resolve;
pub mod schema;

pub use discover::{discover_manifest, DiscoverError, MANIFEST_FILE_NAMES};
pub use manifest::{
    Config, ForgeSource, ManifestError, RepositoriesConfig, SubgroupMode, Workspace,
    WorkspaceConfig, WorkspaceKind,
};
pub use resolve::{
    resolve_config_workspace, resolve_forge_workspace, resolve_git_workspace,
    resolve_workspace_config, ResolveError,
};
pub use schema::{CommitCount, RepoName, RepoSpec, SchemaError, Strategy, TargetPath};
