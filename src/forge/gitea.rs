//! forge::gitea
//!
//! Gitea forge implementation, listing repositories via the v1 REST API.
//! Gated behind the `gitea` feature. Gitea's API is close enough to
//! GitHub's that this mirrors [`super::github::GitHubForge`]'s shape with
//! different field names and a token header.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;

use super::traits::{ForgeClient, ForgeError, ForgeRepo};

const PER_PAGE: u32 = 50;

/// Gitea forge implementation. `api_base` must point at a specific
/// instance (e.g. `https://gitea.example.com/api/v1`) — unlike GitHub and
/// GitLab, Gitea has no single canonical public host.
#[derive(Debug, Clone)]
pub struct GiteaForge {
    client: Client,
    token: Option<String>,
    api_base: String,
}

impl GiteaForge {
    /// A Gitea forge client against a specific instance, optionally
    /// authenticated.
    pub fn new(token: Option<String>, api_base: impl Into<String>) -> Self {
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
                HeaderValue::from_str(&format!("token {token}")).expect("invalid token format"),
            );
        }
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
        let message = match response.json::<GiteaErrorResponse>().await {
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
                message: format!("Gitea server error: {message}"),
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
            let items: Vec<GiteaRepoItem> = self.handle_response(response).await?;
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
impl ForgeClient for GiteaForge {
    fn name(&self) -> &'static str {
        "gitea"
    }

    async fn list_org_repos(&self, org: &str, _include_subgroups: bool) -> Result<Vec<ForgeRepo>, ForgeError> {
        self.paginated_repos(|page| {
            format!("{}/orgs/{}/repos?limit={}&page={}", self.api_base, org, PER_PAGE, page)
        })
        .await
    }

    async fn list_user_repos(&self, user: &str) -> Result<Vec<ForgeRepo>, ForgeError> {
        self.paginated_repos(|page| {
            format!("{}/users/{}/repos?limit={}&page={}", self.api_base, user, PER_PAGE, page)
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
        let item: GiteaRepoItem = self.handle_response(response).await?;
        Ok(item.into())
    }
}

#[derive(Debug, Deserialize)]
struct GiteaErrorResponse {
    message: String,
}

#[derive(Debug, Deserialize)]
struct GiteaRepoItem {
    name: String,
    full_name: String,
    clone_url: String,
    ssh_url: Option<String>,
    default_branch: Option<String>,
    archived: bool,
    fork: bool,
    private: bool,
    stars_count: u64,
    language: Option<String>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
}

impl From<GiteaRepoItem> for ForgeRepo {
    fn from(item: GiteaRepoItem) -> Self {
        ForgeRepo {
            name: item.name,
            full_name: item.full_name,
            clone_url: item.clone_url,
            ssh_url: item.ssh_url,
            default_branch: item.default_branch.unwrap_or_else(|| "main".to_string()),
            archived: item.archived,
            fork: item.fork,
            private: item.private,
            stars: item.stars_count,
            language: item.language.filter(|s| !s.is_empty()),
            pushed_at: item.updated_at,
        }
    }
}
