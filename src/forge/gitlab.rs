//! forge::gitlab
//!
//! GitLab forge implementation, listing projects via the v4 REST API.
//! Gated behind the `gitlab` feature.
//!
//! GitLab groups nest (a group can own subgroups, which own projects), so
//! `list_org_repos`'s `include_subgroups` flag maps directly to the API's
//! own `include_subgroups` query parameter rather than requiring a client-
//! side recursive walk.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, PRIVATE_TOKEN};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;

use super::traits::{ForgeClient, ForgeError, ForgeRepo};

/// Default GitLab API base URL.
const DEFAULT_API_BASE: &str = "https://gitlab.com/api/v4";

const PER_PAGE: u32 = 100;

/// GitLab forge implementation.
#[derive(Debug, Clone)]
pub struct GitLabForge {
    client: Client,
    token: Option<String>,
    api_base: String,
}

impl GitLabForge {
    /// A GitLab forge client, optionally authenticated.
    pub fn new(token: Option<String>) -> Self {
        Self {
            client: Client::new(),
            token,
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }

    /// A GitLab forge client against a custom API base (self-hosted GitLab).
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
            headers.insert(PRIVATE_TOKEN, HeaderValue::from_str(token).expect("invalid token format"));
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
        let message = match response.json::<GitLabErrorResponse>().await {
            Ok(err) => err.message.unwrap_or_else(|| err.error.unwrap_or_default()),
            Err(_) => "unknown error".to_string(),
        };

        Err(match status {
            StatusCode::UNAUTHORIZED => ForgeError::AuthFailed("invalid or expired token".into()),
            StatusCode::FORBIDDEN => ForgeError::AuthFailed(format!("permission denied: {message}")),
            StatusCode::NOT_FOUND => ForgeError::NotFound(message),
            StatusCode::TOO_MANY_REQUESTS => ForgeError::RateLimited,
            _ if status.is_server_error() => ForgeError::ApiError {
                status: status.as_u16(),
                message: format!("GitLab server error: {message}"),
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
            let items: Vec<GitLabProjectItem> = self.handle_response(response).await?;
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
impl ForgeClient for GitLabForge {
    fn name(&self) -> &'static str {
        "gitlab"
    }

    async fn list_org_repos(&self, org: &str, include_subgroups: bool) -> Result<Vec<ForgeRepo>, ForgeError> {
        let group = urlencoding_path_segment(org);
        self.paginated_repos(|page| {
            format!(
                "{}/groups/{}/projects?include_subgroups={}&per_page={}&page={}",
                self.api_base, group, include_subgroups, PER_PAGE, page
            )
        })
        .await
    }

    async fn list_user_repos(&self, user: &str) -> Result<Vec<ForgeRepo>, ForgeError> {
        self.paginated_repos(|page| {
            format!("{}/users/{}/projects?per_page={}&page={}", self.api_base, user, PER_PAGE, page)
        })
        .await
    }

    async fn get_repo(&self, full_name: &str) -> Result<ForgeRepo, ForgeError> {
        let id = urlencoding_path_segment(full_name);
        let url = format!("{}/projects/{}", self.api_base, id);
        let response = self
            .client
            .get(&url)
            .headers(self.headers())
            .send()
            .await
            .map_err(|e| ForgeError::NetworkError(e.to_string()))?;
        let item: GitLabProjectItem = self.handle_response(response).await?;
        Ok(item.into())
    }
}

/// GitLab's API takes namespaced paths (`group/project`) URL-encoded as a
/// single path segment.
fn urlencoding_path_segment(s: &str) -> String {
    s.replace('/', "%2F")
}

#[derive(Debug, Deserialize)]
struct GitLabErrorResponse {
    message: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GitLabProjectItem {
    name: String,
    path_with_namespace: String,
    http_url_to_repo: String,
    ssh_url_to_repo: Option<String>,
    default_branch: Option<String>,
    archived: bool,
    #[serde(default)]
    forked_from_project: Option<serde_json::Value>,
    visibility: String,
    star_count: u64,
    #[serde(default)]
    last_activity_at: Option<DateTime<Utc>>,
}

impl From<GitLabProjectItem> for ForgeRepo {
    fn from(item: GitLabProjectItem) -> Self {
        ForgeRepo {
            name: item.name,
            full_name: item.path_with_namespace,
            clone_url: item.http_url_to_repo,
            ssh_url: item.ssh_url_to_repo,
            default_branch: item.default_branch.unwrap_or_else(|| "main".to_string()),
            archived: item.archived,
            fork: item.forked_from_project.is_some(),
            private: item.visibility != "public",
            stars: item.star_count,
            language: None,
            pushed_at: item.last_activity_at,
        }
    }
}

/// Parse a GitLab remote URL into `(owner_path, project)`. Supports nested
/// groups: `git@gitlab.com:group/subgroup/project.git`.
pub fn parse_gitlab_url(url: &str) -> Option<(String, String)> {
    if let Some(rest) = url.strip_prefix("git@gitlab.com:") {
        return parse_gitlab_path(rest);
    }

    if let Some(rest) = url
        .strip_prefix("https://gitlab.com/")
        .or_else(|| url.strip_prefix("http://gitlab.com/"))
    {
        return parse_gitlab_path(rest);
    }

    None
}

fn parse_gitlab_path(path: &str) -> Option<(String, String)> {
    let path = path.strip_suffix(".git").unwrap_or(path);
    let parts: Vec<&str> = path.split('/').collect();
    if parts.len() < 2 {
        return None;
    }
    let project = parts.last()?.to_string();
    if project.is_empty() {
        return None;
    }
    let owner = parts[..parts.len() - 1].join("/");
    if owner.is_empty() {
        return None;
    }
    Some((owner, project))
}

#[cfg(test)]
mod tests {
    use super::*;

    mod parse_gitlab_url_tests {
        use super::*;

        #[test]
        fn ssh_with_git_suffix() {
            let result = parse_gitlab_url("git@gitlab.com:mygroup/myproject.git");
            assert_eq!(result, Some(("mygroup".to_string(), "myproject".to_string())));
        }

        #[test]
        fn nested_groups() {
            let result = parse_gitlab_url("git@gitlab.com:group/subgroup/project.git");
            assert_eq!(result, Some(("group/subgroup".to_string(), "project".to_string())));
        }

        #[test]
        fn non_gitlab_url_is_rejected() {
            assert!(parse_gitlab_url("git@github.com:owner/repo.git").is_none());
        }

        #[test]
        fn invalid_format() {
            assert!(parse_gitlab_url("https://gitlab.com/owner").is_none());
        }
    }

    #[test]
    fn urlencoding_path_segment_replaces_slashes() {
        assert_eq!(urlencoding_path_segment("group/subgroup/project"), "group%2Fsubgroup%2Fproject");
    }

    #[test]
    fn project_item_private_when_not_public() {
        let item = GitLabProjectItem {
            name: "widgets".to_string(),
            path_with_namespace: "acme/widgets".to_string(),
            http_url_to_repo: "https://gitlab.com/acme/widgets.git".to_string(),
            ssh_url_to_repo: None,
            default_branch: Some("main".to_string()),
            archived: false,
            forked_from_project: None,
            visibility: "private".to_string(),
            star_count: 3,
            last_activity_at: None,
        };
        let repo: ForgeRepo = item.into();
        assert!(repo.private);
        assert!(!repo.fork);
    }

    #[test]
    fn client_name_is_gitlab() {
        let forge = GitLabForge::new(None);
        assert_eq!(forge.name(), "gitlab");
    }
}
