//! forge::traits
//!
//! The `ForgeClient` trait and the data it deals in: listing repositories
//! owned by a user/org/group on a remote hosting service, so the Manifest
//! Loader can turn a `workspace: {kind: forge}` block into declared
//! `RepoSpec`s without the caller needing to know which forge it's talking
//! to. Generalized from the teacher's PR-centric `Forge` trait (create/
//! update/merge a single pull request against one known repo) to the
//! read-only, many-repos-at-once listing this crate actually needs —
//! gitrun does not open pull requests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors a forge client can produce.
#[derive(Debug, Clone, Error)]
pub enum ForgeError {
    /// Authentication is required but not available.
    #[error("authentication required")]
    AuthRequired,

    /// Authentication failed (invalid token, expired, insufficient permissions).
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The requested org/user/repo does not exist, or isn't visible to us.
    #[error("not found: {0}")]
    NotFound(String),

    /// The forge's rate limit was hit.
    #[error("rate limited")]
    RateLimited,

    /// The forge responded with an unexpected status or body.
    #[error("API error: {status} - {message}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Forge-reported error message, or a generic description.
        message: String,
    },

    /// The request could not be sent at all (DNS, TCP, TLS).
    #[error("network error: {0}")]
    NetworkError(String),

    /// This provider is not compiled into this build.
    #[error("not implemented: {0}")]
    NotImplemented(String),
}

/// A repository as reported by a forge listing.
#[derive(Debug, Clone, PartialEq)]
pub struct ForgeRepo {
    /// Repository name (no owner prefix).
    pub name: String,
    /// `owner/name`, or the equivalent nested path for a GitLab subgroup.
    pub full_name: String,
    /// HTTPS clone URL.
    pub clone_url: String,
    /// SSH clone URL, when the forge reports one.
    pub ssh_url: Option<String>,
    /// The repository's default branch.
    pub default_branch: String,
    /// Whether the repository is archived (read-only upstream).
    pub archived: bool,
    /// Whether the repository is a fork.
    pub fork: bool,
    /// Whether the repository is private.
    pub private: bool,
    /// Star count, when the forge reports one.
    pub stars: u64,
    /// Primary language, when the forge reports one.
    pub language: Option<String>,
    /// Last push timestamp, when the forge reports one.
    pub pushed_at: Option<DateTime<Utc>>,
}

/// Lists repositories from a remote forge. One implementation per provider
/// (GitHub, GitLab, Gitea); the Manifest Loader's `workspace: {kind: forge}`
/// resolution is the only caller.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` to allow use across async tasks.
#[async_trait]
pub trait ForgeClient: Send + Sync {
    /// Provider name, e.g. `"github"`.
    fn name(&self) -> &'static str;

    /// List every repository owned by an organization/group.
    ///
    /// # Errors
    ///
    /// - `AuthFailed` if the token is invalid or lacks permissions
    /// - `NotFound` if the org doesn't exist or isn't visible
    /// - `RateLimited` if the forge's rate limit was hit mid-pagination
    async fn list_org_repos(&self, org: &str, include_subgroups: bool) -> Result<Vec<ForgeRepo>, ForgeError>;

    /// List every repository owned by a user.
    async fn list_user_repos(&self, user: &str) -> Result<Vec<ForgeRepo>, ForgeError>;

    /// Fetch a single repository by `owner/name`.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the repository doesn't exist or isn't visible
    async fn get_repo(&self, full_name: &str) -> Result<ForgeRepo, ForgeError>;
}
