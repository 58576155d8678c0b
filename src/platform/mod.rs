//! Platform services for GitHub and GitLab
//!
//! Provides a unified interface for the pull request operations the publish
//! pipeline consumes.

mod detection;
mod factory;
mod github;
mod gitlab;

pub use detection::{detect_platform, parse_repo_info};
pub use factory::create_platform_service;
pub use github::GitHubService;
pub use gitlab::GitLabService;

use crate::error::Result;
use crate::types::{ForkTarget, NewPullRequest, PlatformConfig, PullRequest};
use async_trait::async_trait;

/// Platform service trait for PR/MR operations
///
/// This trait abstracts GitHub and GitLab operations, allowing the same
/// publish logic to work with either platform.
#[async_trait]
pub trait PlatformService: Send + Sync {
    /// Find an open PR whose source is `head_branch`, owned by `head_owner`
    /// when it lives in a fork
    async fn find_existing_pr(
        &self,
        head_branch: &str,
        head_owner: Option<&str>,
    ) -> Result<Option<PullRequest>>;

    /// Create a new PR
    async fn create_pr(&self, request: &NewPullRequest) -> Result<PullRequest>;

    /// Whether the authenticated identity can push to the repository
    async fn has_push_access(&self) -> Result<bool>;

    /// Fork the repository for the authenticated identity, or return the
    /// existing fork
    async fn ensure_fork(&self) -> Result<ForkTarget>;

    /// Request reviews on a PR
    async fn request_reviewers(&self, pr_number: u64, reviewers: &[String]) -> Result<()>;

    /// Add labels to a PR
    async fn add_labels(&self, pr_number: u64, labels: &[String]) -> Result<()>;

    /// Get the platform configuration
    fn config(&self) -> &PlatformConfig;
}
