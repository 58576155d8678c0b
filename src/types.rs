//! Core types for dsync

use crate::error::ErrorKind;
use serde::{Deserialize, Serialize};

/// Immutable descriptor of the remote repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoRef {
    /// Hostname (e.g. "github.com")
    pub host: String,
    /// Repository owner (user, organization or GitLab group path)
    pub owner: String,
    /// Repository name
    pub repo: String,
    /// Branch pull requests target
    pub default_branch: String,
}

/// What HEAD points at
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeadState {
    /// HEAD is a symbolic ref to a local branch
    Branch(String),
    /// HEAD is detached at a commit
    Detached(String),
}

impl HeadState {
    /// Branch name, if HEAD is attached
    pub fn branch(&self) -> Option<&str> {
        match self {
            Self::Branch(name) => Some(name),
            Self::Detached(_) => None,
        }
    }
}

/// How a sync attempt ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome", content = "kind")]
pub enum SyncOutcome {
    /// Local branch moved forward
    Success,
    /// Nothing to pull
    NoOp,
    /// Stopped before mutating anything
    Aborted(ErrorKind),
    /// Attempted and failed
    Failed(ErrorKind),
}

/// Result of one sync attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResult {
    /// Whether the sync succeeded (`Success` or `NoOp`)
    pub success: bool,
    /// Short user-facing message
    pub message: String,
    /// HEAD before the sync (empty if never resolved)
    pub previous_commit: String,
    /// HEAD after the sync (empty if never resolved)
    pub new_commit: String,
    /// Number of remote commits brought into the local branch
    pub commits_pulled: u32,
    /// Terminal state of the engine
    pub outcome: SyncOutcome,
    /// Tracked files changed by the pull
    pub changed_files: Vec<String>,
}

/// A pull request / merge request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequest {
    /// PR/MR number
    pub number: u64,
    /// Web URL for the PR/MR
    pub html_url: String,
    /// Base branch name
    pub base_ref: String,
    /// Head branch name
    pub head_ref: String,
    /// PR/MR title
    pub title: String,
}

/// Parameters for opening a pull request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPullRequest {
    /// Source branch
    pub head: String,
    /// Owner of the source branch when it lives in a fork
    pub head_owner: Option<String>,
    /// Target branch
    pub base: String,
    /// Title
    pub title: String,
    /// Description
    pub body: String,
}

/// A fork of the upstream repository owned by the authenticated user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForkTarget {
    /// Fork owner (login or namespace)
    pub owner: String,
    /// URL git pushes to
    pub clone_url: String,
}

/// Detected platform type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Platform {
    /// GitHub or GitHub Enterprise
    GitHub,
    /// GitLab or self-hosted GitLab
    GitLab,
}

/// Platform configuration
#[derive(Debug, Clone)]
pub struct PlatformConfig {
    /// Platform type
    pub platform: Platform,
    /// Repository owner (user or organization)
    pub owner: String,
    /// Repository name
    pub repo: String,
    /// Custom host (None for github.com/gitlab.com)
    pub host: Option<String>,
}

impl PlatformConfig {
    /// Hostname, falling back to the public instance
    pub fn hostname(&self) -> &str {
        self.host.as_deref().unwrap_or(match self.platform {
            Platform::GitHub => "github.com",
            Platform::GitLab => "gitlab.com",
        })
    }

    /// Remote descriptor targeting `default_branch`
    pub fn repo_ref(&self, default_branch: &str) -> RepoRef {
        RepoRef {
            host: self.hostname().to_string(),
            owner: self.owner.clone(),
            repo: self.repo.clone(),
            default_branch: default_branch.to_string(),
        }
    }
}
