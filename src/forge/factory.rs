//! forge::factory
//!
//! Forge selection and creation: turns a provider name (from a manifest's
//! `workspace.source.provider`) plus resolved credentials into a boxed
//! `ForgeClient`, so the Manifest Loader doesn't need to import specific
//! forge implementations directly.

use super::github::{parse_github_url, GitHubForge};
use super::traits::{ForgeClient, ForgeError};

#[cfg(feature = "gitlab")]
use super::gitlab::{parse_gitlab_url, GitLabForge};
#[cfg(feature = "gitea")]
use super::gitea::GiteaForge;

/// Supported forge providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForgeProvider {
    /// GitHub (always available).
    GitHub,
    /// GitLab (requires the `gitlab` feature).
    #[cfg(feature = "gitlab")]
    GitLab,
    /// Gitea (requires the `gitea` feature).
    #[cfg(feature = "gitea")]
    Gitea,
}

impl ForgeProvider {
    /// Providers enabled in the current build configuration.
    pub fn all() -> &'static [ForgeProvider] {
        &[
            ForgeProvider::GitHub,
            #[cfg(feature = "gitlab")]
            ForgeProvider::GitLab,
            #[cfg(feature = "gitea")]
            ForgeProvider::Gitea,
        ]
    }

    /// The provider name as used in manifests (`workspace.source.provider`).
    pub fn name(&self) -> &'static str {
        match self {
            ForgeProvider::GitHub => "github",
            #[cfg(feature = "gitlab")]
            ForgeProvider::GitLab => "gitlab",
            #[cfg(feature = "gitea")]
            ForgeProvider::Gitea => "gitea",
        }
    }

    /// Parse a provider from a manifest string, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "github" => Some(ForgeProvider::GitHub),
            #[cfg(feature = "gitlab")]
            "gitlab" => Some(ForgeProvider::GitLab),
            #[cfg(feature = "gitea")]
            "gitea" => Some(ForgeProvider::Gitea),
            _ => None,
        }
    }
}

impl std::fmt::Display for ForgeProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Detect the forge provider from a remote URL (used when inferring a
/// scanned repo's provider for reporting, not for manifest resolution,
/// which always has an explicit `provider` field).
pub fn detect_provider(remote_url: &str) -> Option<ForgeProvider> {
    if parse_github_url(remote_url).is_some() {
        return Some(ForgeProvider::GitHub);
    }

    #[cfg(feature = "gitlab")]
    if parse_gitlab_url(remote_url).is_some() {
        return Some(ForgeProvider::GitLab);
    }

    None
}

/// Create a forge client for `provider_name`, optionally authenticated and
/// against a custom `api_base` (GitHub Enterprise, self-hosted GitLab, or
/// any Gitea instance — Gitea has no canonical public host, so its
/// `api_base` is required).
///
/// # Errors
///
/// - `ForgeError::NotFound` if the provider name is unrecognized
/// - `ForgeError::NotImplemented` if the provider is known but this build
///   was compiled without its feature, or if `api_base` is required but
///   missing (Gitea)
pub fn create_forge(
    provider_name: &str,
    token: Option<String>,
    api_base: Option<String>,
) -> Result<Box<dyn ForgeClient>, ForgeError> {
    let provider = resolve_provider(provider_name)?;
    create_forge_for_provider(provider, token, api_base)
}

fn resolve_provider(name: &str) -> Result<ForgeProvider, ForgeError> {
    if let Some(provider) = ForgeProvider::parse(name) {
        return Ok(provider);
    }

    if is_known_but_disabled(name) {
        return Err(ForgeError::NotImplemented(format!(
            "forge '{name}' is not enabled in this build; rebuild with `--features {name}` to enable it"
        )));
    }

    Err(ForgeError::NotFound(format!(
        "unknown forge provider '{name}'. Available providers: {}",
        available_providers_string()
    )))
}

fn is_known_but_disabled(name: &str) -> bool {
    match name.to_lowercase().as_str() {
        #[cfg(not(feature = "gitlab"))]
        "gitlab" => true,
        #[cfg(not(feature = "gitea"))]
        "gitea" => true,
        _ => false,
    }
}

fn create_forge_for_provider(
    provider: ForgeProvider,
    token: Option<String>,
    api_base: Option<String>,
) -> Result<Box<dyn ForgeClient>, ForgeError> {
    match provider {
        ForgeProvider::GitHub => {
            let forge = match api_base {
                Some(base) => GitHubForge::with_api_base(token, base),
                None => GitHubForge::new(token),
            };
            Ok(Box::new(forge))
        }
        #[cfg(feature = "gitlab")]
        ForgeProvider::GitLab => {
            let forge = match api_base {
                Some(base) => GitLabForge::with_api_base(token, base),
                None => GitLabForge::new(token),
            };
            Ok(Box::new(forge))
        }
        #[cfg(feature = "gitea")]
        ForgeProvider::Gitea => {
            let base = api_base.ok_or_else(|| {
                ForgeError::NotFound("gitea requires an explicit api base URL (no canonical public host)".to_string())
            })?;
            Ok(Box::new(GiteaForge::new(token, base)))
        }
    }
}

fn available_providers_string() -> String {
    ForgeProvider::all().iter().map(|p| p.name()).collect::<Vec<_>>().join(", ")
}

/// Valid forge names for configuration validation, including providers not
/// compiled into this build, so manifests can reference `gitea`/`gitlab`
/// before the corresponding feature is enabled and fail later with an
/// actionable `NotImplemented`, not at parse time.
pub fn valid_forge_names() -> &'static [&'static str] {
    &["github", "gitlab", "gitea"]
}
