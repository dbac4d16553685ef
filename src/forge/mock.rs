//! forge::mock
//!
//! Deterministic in-memory `ForgeClient` for tests: no network, fixed
//! repository lists, optional configured failures.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::traits::{ForgeClient, ForgeError, ForgeRepo};

/// Mock forge for testing. Thread-safe via internal `Arc<Mutex<...>>`.
#[derive(Debug, Clone)]
pub struct MockForge {
    inner: Arc<Mutex<MockForgeInner>>,
}

#[derive(Debug, Default)]
struct MockForgeInner {
    /// Repos keyed by owning org or user name.
    owned: HashMap<String, Vec<ForgeRepo>>,
    /// Repos keyed by `full_name`, for `get_repo`.
    by_full_name: HashMap<String, ForgeRepo>,
    fail_on: Option<FailOn>,
    calls: Vec<MockCall>,
}

/// Configure the mock to fail on a specific call.
#[derive(Debug, Clone)]
pub enum FailOn {
    /// Fail `list_org_repos` with the given error.
    ListOrgRepos(ForgeError),
    /// Fail `list_user_repos` with the given error.
    ListUserRepos(ForgeError),
    /// Fail `get_repo` with the given error.
    GetRepo(ForgeError),
}

/// A recorded call, for test assertions on what the caller requested.
#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    /// `list_org_repos(org, include_subgroups)`.
    ListOrgRepos { org: String, include_subgroups: bool },
    /// `list_user_repos(user)`.
    ListUserRepos { user: String },
    /// `get_repo(full_name)`.
    GetRepo { full_name: String },
}

impl MockForge {
    /// An empty mock forge with no repos registered.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockForgeInner::default())),
        }
    }

    /// Register repos owned by `org_or_user`, returned by both
    /// `list_org_repos` and `list_user_repos` for that name, and indexable
    /// individually by `get_repo`.
    pub fn with_repos(org_or_user: impl Into<String>, repos: Vec<ForgeRepo>) -> Self {
        let forge = Self::new();
        forge.add_repos(org_or_user, repos);
        forge
    }

    /// Register additional repos owned by `org_or_user`.
    pub fn add_repos(&self, org_or_user: impl Into<String>, repos: Vec<ForgeRepo>) {
        let mut inner = self.inner.lock().unwrap();
        let key = org_or_user.into();
        for repo in &repos {
            inner.by_full_name.insert(repo.full_name.clone(), repo.clone());
        }
        inner.owned.entry(key).or_default().extend(repos);
    }

    /// Configure the mock to fail on a specific call.
    pub fn fail_on(self, fail_on: FailOn) -> Self {
        self.inner.lock().unwrap().fail_on = Some(fail_on);
        self
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<MockCall> {
        self.inner.lock().unwrap().calls.clone()
    }

    fn record(&self, call: MockCall) {
        self.inner.lock().unwrap().calls.push(call);
    }
}

impl Default for MockForge {
    fn default() -> Self {
        Self::new()
    }
}

fn clone_error(e: &ForgeError) -> ForgeError {
    e.clone()
}

#[async_trait]
impl ForgeClient for MockForge {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn list_org_repos(&self, org: &str, include_subgroups: bool) -> Result<Vec<ForgeRepo>, ForgeError> {
        self.record(MockCall::ListOrgRepos {
            org: org.to_string(),
            include_subgroups,
        });
        let inner = self.inner.lock().unwrap();
        if let Some(FailOn::ListOrgRepos(e)) = &inner.fail_on {
            return Err(clone_error(e));
        }
        Ok(inner.owned.get(org).cloned().unwrap_or_default())
    }

    async fn list_user_repos(&self, user: &str) -> Result<Vec<ForgeRepo>, ForgeError> {
        self.record(MockCall::ListUserRepos { user: user.to_string() });
        let inner = self.inner.lock().unwrap();
        if let Some(FailOn::ListUserRepos(e)) = &inner.fail_on {
            return Err(clone_error(e));
        }
        Ok(inner.owned.get(user).cloned().unwrap_or_default())
    }

    async fn get_repo(&self, full_name: &str) -> Result<ForgeRepo, ForgeError> {
        self.record(MockCall::GetRepo {
            full_name: full_name.to_string(),
        });
        let inner = self.inner.lock().unwrap();
        if let Some(FailOn::GetRepo(e)) = &inner.fail_on {
            return Err(clone_error(e));
        }
        inner
            .by_full_name
            .get(full_name)
            .cloned()
            .ok_or_else(|| ForgeError::NotFound(full_name.to_string()))
    }
}
