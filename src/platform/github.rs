//! GitHub platform service implementation

use crate::error::{Error, Result};
use crate::platform::PlatformService;
use crate::types::{ForkTarget, NewPullRequest, Platform, PlatformConfig, PullRequest};
use async_trait::async_trait;
use octocrab::Octocrab;
use tracing::debug;

/// GitHub service using octocrab
pub struct GitHubService {
    client: Octocrab,
    config: PlatformConfig,
}

impl GitHubService {
    /// Create a new GitHub service
    pub fn new(token: &str, owner: String, repo: String, host: Option<String>) -> Result<Self> {
        let mut builder = Octocrab::builder().personal_token(token.to_string());

        if let Some(ref h) = host {
            let base_url = format!("https://{h}/api/v3");
            builder = builder
                .base_uri(&base_url)
                .map_err(|e| Error::GitHubApi(e.to_string()))?;
        }

        let client = builder.build().map_err(|e| Error::GitHubApi(e.to_string()))?;

        Ok(Self {
            client,
            config: PlatformConfig {
                platform: Platform::GitHub,
                owner,
                repo,
                host,
            },
        })
    }
}

fn to_pull_request(pr: &octocrab::models::pulls::PullRequest) -> PullRequest {
    PullRequest {
        number: pr.number,
        html_url: pr
            .html_url
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default(),
        base_ref: pr.base.ref_field.clone(),
        head_ref: pr.head.ref_field.clone(),
        title: pr.title.as_deref().unwrap_or_default().to_string(),
    }
}

#[async_trait]
impl PlatformService for GitHubService {
    async fn find_existing_pr(
        &self,
        head_branch: &str,
        head_owner: Option<&str>,
    ) -> Result<Option<PullRequest>> {
        let owner = head_owner.unwrap_or(&self.config.owner);
        let head = format!("{owner}:{head_branch}");

        let prs = self
            .client
            .pulls(&self.config.owner, &self.config.repo)
            .list()
            .head(head)
            .state(octocrab::params::State::Open)
            .send()
            .await?;

        Ok(prs.items.first().map(to_pull_request))
    }

    async fn create_pr(&self, request: &NewPullRequest) -> Result<PullRequest> {
        let head = match &request.head_owner {
            Some(owner) => format!("{owner}:{}", request.head),
            None => request.head.clone(),
        };

        let pr = self
            .client
            .pulls(&self.config.owner, &self.config.repo)
            .create(&request.title, head, &request.base)
            .body(&request.body)
            .send()
            .await?;

        Ok(to_pull_request(&pr))
    }

    async fn has_push_access(&self) -> Result<bool> {
        let repo = self
            .client
            .repos(&self.config.owner, &self.config.repo)
            .get()
            .await?;
        let push = repo.permissions.is_some_and(|p| p.push || p.admin);
        debug!("push access to {}/{}: {push}", self.config.owner, self.config.repo);
        Ok(push)
    }

    async fn ensure_fork(&self) -> Result<ForkTarget> {
        // GitHub returns the existing fork when one is already present
        let fork = self
            .client
            .repos(&self.config.owner, &self.config.repo)
            .create_fork()
            .send()
            .await?;

        let owner = fork
            .owner
            .map(|o| o.login)
            .ok_or_else(|| Error::GitHubApi("fork has no owner".to_string()))?;
        let clone_url = fork
            .clone_url
            .map(|u| u.to_string())
            .ok_or_else(|| Error::GitHubApi("fork has no clone URL".to_string()))?;

        Ok(ForkTarget { owner, clone_url })
    }

    async fn request_reviewers(&self, pr_number: u64, reviewers: &[String]) -> Result<()> {
        self.client
            .pulls(&self.config.owner, &self.config.repo)
            .request_reviews(pr_number, reviewers.to_vec(), Vec::<String>::new())
            .await?;
        Ok(())
    }

    async fn add_labels(&self, pr_number: u64, labels: &[String]) -> Result<()> {
        self.client
            .issues(&self.config.owner, &self.config.repo)
            .add_labels(pr_number, labels)
            .await?;
        Ok(())
    }

    fn config(&self) -> &PlatformConfig {
        &self.config
    }
}
