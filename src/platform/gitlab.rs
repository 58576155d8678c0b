//! GitLab platform service implementation

use crate::error::{Error, Result};
use crate::platform::PlatformService;
use crate::types::{ForkTarget, NewPullRequest, Platform, PlatformConfig, PullRequest};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Developer access level; the minimum that can push branches
const DEVELOPER_ACCESS: u32 = 30;

/// GitLab service using reqwest
pub struct GitLabService {
    client: Client,
    token: String,
    api_base: String,
    config: PlatformConfig,
    project_path: String,
}

#[derive(Deserialize)]
struct MergeRequest {
    iid: u64,
    web_url: String,
    source_branch: String,
    target_branch: String,
    title: String,
    #[serde(default)]
    source_project_id: u64,
    #[serde(default)]
    target_project_id: u64,
}

impl From<MergeRequest> for PullRequest {
    fn from(mr: MergeRequest) -> Self {
        Self {
            number: mr.iid,
            html_url: mr.web_url,
            base_ref: mr.target_branch,
            head_ref: mr.source_branch,
            title: mr.title,
        }
    }
}

#[derive(Deserialize)]
struct Namespace {
    full_path: String,
}

#[derive(Deserialize)]
struct AccessLevel {
    access_level: u32,
}

#[derive(Deserialize, Default)]
struct Permissions {
    project_access: Option<AccessLevel>,
    group_access: Option<AccessLevel>,
}

#[derive(Deserialize)]
struct Project {
    id: u64,
    http_url_to_repo: String,
    namespace: Namespace,
    #[serde(default)]
    permissions: Option<Permissions>,
}

#[derive(Deserialize)]
struct User {
    id: u64,
    username: String,
}

#[derive(Serialize)]
struct CreateMrPayload<'a> {
    source_branch: &'a str,
    target_branch: &'a str,
    title: &'a str,
    description: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    target_project_id: Option<u64>,
}

/// Default request timeout in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 30;

impl GitLabService {
    /// Create a new GitLab service
    pub fn new(token: String, owner: String, repo: String, host: Option<String>) -> Self {
        let host = host.unwrap_or_else(|| "gitlab.com".to_string());
        let project_path = format!("{owner}/{repo}");

        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            token,
            api_base: format!("https://{host}/api/v4"),
            config: PlatformConfig {
                platform: Platform::GitLab,
                owner,
                repo,
                host: if host == "gitlab.com" {
                    None
                } else {
                    Some(host)
                },
            },
            project_path,
        }
    }

    /// Point the client at a different API root (e.g. a test server)
    #[must_use]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    fn encode(path: &str) -> String {
        urlencoding::encode(path).into_owned()
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        request.header("PRIVATE-TOKEN", &self.token)
    }

    async fn send_json<T: for<'de> Deserialize<'de>>(&self, request: RequestBuilder) -> Result<T> {
        Ok(self
            .authed(request)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| Error::GitLabApi(e.to_string()))?
            .json()
            .await?)
    }

    async fn project(&self, path: &str) -> Result<Project> {
        let url = self.api_url(&format!("/projects/{}", Self::encode(path)));
        self.send_json(self.client.get(&url)).await
    }

    async fn current_user(&self) -> Result<User> {
        self.send_json(self.client.get(self.api_url("/user"))).await
    }

    fn mr_url(&self, pr_number: u64) -> String {
        self.api_url(&format!(
            "/projects/{}/merge_requests/{pr_number}",
            Self::encode(&self.project_path)
        ))
    }
}

#[async_trait]
impl PlatformService for GitLabService {
    async fn find_existing_pr(
        &self,
        head_branch: &str,
        head_owner: Option<&str>,
    ) -> Result<Option<PullRequest>> {
        // MRs from forks are listed on the target project too, so the branch
        // name alone can match someone else's fork
        let fork_id = match head_owner {
            Some(owner) => {
                let fork = self.project(&format!("{owner}/{}", self.config.repo)).await?;
                Some(fork.id)
            }
            None => None,
        };
        let url = self.api_url(&format!(
            "/projects/{}/merge_requests",
            Self::encode(&self.project_path)
        ));

        let mrs: Vec<MergeRequest> = self
            .send_json(
                self.client
                    .get(&url)
                    .query(&[("source_branch", head_branch), ("state", "opened")]),
            )
            .await?;

        Ok(mrs
            .into_iter()
            .find(|mr| match fork_id {
                Some(id) => mr.source_project_id == id,
                None => mr.source_project_id == mr.target_project_id,
            })
            .map(PullRequest::from))
    }

    async fn create_pr(&self, request: &NewPullRequest) -> Result<PullRequest> {
        // Fork MRs are created on the source project and aimed at upstream
        let (source_path, target_project_id) = match &request.head_owner {
            Some(owner) => {
                let upstream = self.project(&self.project_path).await?;
                (format!("{owner}/{}", self.config.repo), Some(upstream.id))
            }
            None => (self.project_path.clone(), None),
        };

        let url = self.api_url(&format!(
            "/projects/{}/merge_requests",
            Self::encode(&source_path)
        ));
        let payload = CreateMrPayload {
            source_branch: &request.head,
            target_branch: &request.base,
            title: &request.title,
            description: &request.body,
            target_project_id,
        };

        let mr: MergeRequest = self
            .send_json(self.client.post(&url).json(&payload))
            .await?;
        Ok(mr.into())
    }

    async fn has_push_access(&self) -> Result<bool> {
        let project = self.project(&self.project_path).await?;
        let permissions = project.permissions.unwrap_or_default();
        let level = [permissions.project_access, permissions.group_access]
            .into_iter()
            .flatten()
            .map(|a| a.access_level)
            .max()
            .unwrap_or(0);
        debug!("access level on {}: {level}", self.project_path);
        Ok(level >= DEVELOPER_ACCESS)
    }

    async fn ensure_fork(&self) -> Result<ForkTarget> {
        let user = self.current_user().await?;
        let fork_path = format!("{}/{}", user.username, self.config.repo);

        let url = self.api_url(&format!("/projects/{}", Self::encode(&fork_path)));
        let existing = self.authed(self.client.get(&url)).send().await?;
        let fork: Project = if existing.status() == StatusCode::NOT_FOUND {
            let fork_url = self.api_url(&format!(
                "/projects/{}/fork",
                Self::encode(&self.project_path)
            ));
            self.send_json(self.client.post(&fork_url)).await?
        } else {
            existing
                .error_for_status()
                .map_err(|e| Error::GitLabApi(e.to_string()))?
                .json()
                .await?
        };

        Ok(ForkTarget {
            owner: fork.namespace.full_path,
            clone_url: fork.http_url_to_repo,
        })
    }

    async fn request_reviewers(&self, pr_number: u64, reviewers: &[String]) -> Result<()> {
        let mut reviewer_ids = Vec::with_capacity(reviewers.len());
        for username in reviewers {
            let users: Vec<User> = self
                .send_json(
                    self.client
                        .get(self.api_url("/users"))
                        .query(&[("username", username.as_str())]),
                )
                .await?;
            match users.into_iter().next() {
                Some(user) => reviewer_ids.push(user.id),
                None => return Err(Error::GitLabApi(format!("unknown reviewer: {username}"))),
            }
        }

        self.authed(
            self.client
                .put(self.mr_url(pr_number))
                .json(&serde_json::json!({ "reviewer_ids": reviewer_ids })),
        )
        .send()
        .await?
        .error_for_status()
        .map_err(|e| Error::GitLabApi(e.to_string()))?;
        Ok(())
    }

    async fn add_labels(&self, pr_number: u64, labels: &[String]) -> Result<()> {
        self.authed(
            self.client
                .put(self.mr_url(pr_number))
                .json(&serde_json::json!({ "add_labels": labels.join(",") })),
        )
        .send()
        .await?
        .error_for_status()
        .map_err(|e| Error::GitLabApi(e.to_string()))?;
        Ok(())
    }

    fn config(&self) -> &PlatformConfig {
        &self.config
    }
}
