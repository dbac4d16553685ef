//! forge::github
//!
//! GitHub forge implementation, listing repositories via the REST API.
//!
//! # Authentication
//!
//! API calls take an optional Personal Access Token (PAT). Unauthenticated
//! requests work for public orgs/users but hit GitHub's lower anonymous
//! rate limit.
//!
//! # Rate Limiting
//!
//! Returns `ForgeError::RateLimited` when the limit is hit; this crate does
//! not retry forge-listing calls itself (the orchestrator's retry policy is
//! for git operations, not manifest resolution).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;

use super::traits::{ForgeClient, ForgeError, ForgeRepo};

/// Default GitHub API base URL.
const DEFAULT_API_BASE: &str = "https://api.github.com";

/// User-Agent header value for API requests.
const USER_AGENT_VALUE: &str = "gitrun";

/// Max page size GitHub's repo-listing endpoints accept.
const PER_PAGE: u32 = 100;

/// GitHub forge implementation.
#[derive(Debug, Clone)]
pub struct GitHubForge {
    client: Client,
    token: Option<String>,
    api_base: String,
}

impl GitHubForge {
    /// A GitHub forge client, optionally authenticated.
    pub fn new(token: Option<String>) -> Self {
        Self {
            client: Client::new(),
            token,
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }

    /// A GitHub forge client against a custom API base (GitHub Enterprise).
    pub fn with_api_base(token: Option<String>, api_base: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            token,
            api_base: api_base.into(),
        }
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(token) = &self.token {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {token}")).expect("invalid token format"),
            );
        }
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
        headers.insert("X-GitHub-Api-Version", HeaderValue::from_static("2022-11-28"));
        headers
    }

    async fn handle_response<T: for<'de> Deserialize<'de>>(&self, response: Response) -> Result<T, ForgeError> {
        let status = response.status();
        if status.is_success() {
            response.json().await.map_err(|e| ForgeError::ApiError {
                status: status.as_u16(),
                message: format!("failed to parse response: {e}"),
            })
        } else {
            self.handle_error_response(response, status).await
        }
    }

    async fn handle_error_response<T>(&self, response: Response, status: StatusCode) -> Result<T, ForgeError> {
        let message = match response.json::<GitHubErrorResponse>().await {
            Ok(err) => err.message,
            Err(_) => "unknown error".to_string(),
        };

        Err(match status {
            StatusCode::UNAUTHORIZED => ForgeError::AuthFailed("invalid or expired token".into()),
            StatusCode::FORBIDDEN => ForgeError::AuthFailed(format!("permission denied: {message}")),
            StatusCode::NOT_FOUND => ForgeError::NotFound(message),
            StatusCode::TOO_MANY_REQUESTS => ForgeError::RateLimited,
            _ if status.is_server_error() => ForgeError::ApiError {
                status: status.as_u16(),
                message: format!("GitHub server error: {message}"),
            },
            _ => ForgeError::ApiError {
                status: status.as_u16(),
                message,
            },
        })
    }

    async fn paginated_repos(&self, url_for_page: impl Fn(u32) -> String) -> Result<Vec<ForgeRepo>, ForgeError> {
        let mut all = Vec::new();
        let mut page: u32 = 1;
        loop {
            let url = url_for_page(page);
            let response = self
                .client
                .get(&url)
                .headers(self.headers())
                .send()
                .await
                .map_err(|e| ForgeError::NetworkError(e.to_string()))?;
            let items: Vec<GitHubRepoItem> = self.handle_response(response).await?;
            let count = items.len();
            all.extend(items.into_iter().map(ForgeRepo::from));
            if count < PER_PAGE as usize {
                break;
            }
            page += 1;
        }
        Ok(all)
    }
}

#[async_trait]
impl ForgeClient for GitHubForge {
    fn name(&self) -> &'static str {
        "github"
    }

    async fn list_org_repos(&self, org: &str, _include_subgroups: bool) -> Result<Vec<ForgeRepo>, ForgeError> {
        self.paginated_repos(|page| {
            format!(
                "{}/orgs/{}/repos?type=all&per_page={}&page={}",
                self.api_base, org, PER_PAGE, page
            )
        })
        .await
    }

    async fn list_user_repos(&self, user: &str) -> Result<Vec<ForgeRepo>, ForgeError> {
        self.paginated_repos(|page| {
            format!(
                "{}/users/{}/repos?type=owner&per_page={}&page={}",
                self.api_base, user, PER_PAGE, page
            )
        })
        .await
    }

    async fn get_repo(&self, full_name: &str) -> Result<ForgeRepo, ForgeError> {
        let url = format!("{}/repos/{}", self.api_base, full_name);
        let response = self
            .client
            .get(&url)
            .headers(self.headers())
            .send()
            .await
            .map_err(|e| ForgeError::NetworkError(e.to_string()))?;
        let item: GitHubRepoItem = self.handle_response(response).await?;
        Ok(item.into())
    }
}

#[derive(Debug, Deserialize)]
struct GitHubErrorResponse {
    message: String,
}

#[derive(Debug, Deserialize)]
struct GitHubRepoItem {
    name: String,
    full_name: String,
    clone_url: String,
    ssh_url: Option<String>,
    default_branch: Option<String>,
    archived: bool,
    fork: bool,
    private: bool,
    stargazers_count: u64,
    language: Option<String>,
    pushed_at: Option<DateTime<Utc>>,
}

impl From<GitHubRepoItem> for ForgeRepo {
    fn from(item: GitHubRepoItem) -> Self {
        ForgeRepo {
            name: item.name,
            full_name: item.full_name,
            clone_url: item.clone_url,
            ssh_url: item.ssh_url,
            default_branch: item.default_branch.unwrap_or_else(|| "main".to_string()),
            archived: item.archived,
            fork: item.fork,
            private: item.private,
            stars: item.stargazers_count,
            language: item.language,
            pushed_at: item.pushed_at,
        }
    }
}

/// Parse a GitHub remote URL into `(owner, repo)`. Supports SSH
/// (`git@github.com:owner/repo.git`) and HTTPS forms.
pub fn parse_github_url(url: &str) -> Option<(String, String)> {
    if let Some(rest) = url.strip_prefix("git@github.com:") {
        let rest = rest.strip_suffix(".git").unwrap_or(rest);
        let parts: Vec<&str> = rest.splitn(2, '/').collect();
        if parts.len() == 2 {
            return Some((parts[0].to_string(), parts[1].to_string()));
        }
    }

    if let Some(rest) = url
        .strip_prefix("https://github.com/")
        .or_else(|| url.strip_prefix("http://github.com/"))
    {
        let rest = rest.strip_suffix(".git").unwrap_or(rest);
        let parts: Vec<&str> = rest.splitn(2, '/').collect();
        if parts.len() == 2 && !parts[1].is_empty() {
            return Some((parts[0].to_string(), parts[1].to_string()));
        }
    }

    None
}
