//! Error types for dsync
//!
//! [`Error`] is the crate-wide error. [`ErrorKind`] is the coarse taxonomy the
//! sync engine and publish pipeline report to callers; it decides whether a
//! failure is retried from the outbox or needs the user.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// A git subprocess that exited non-zero
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitOperationError {
    /// The git arguments, joined for display (e.g. "fetch origin main")
    pub command: String,
    /// Process exit code (-1 when killed by a signal)
    pub exit_code: i32,
    /// Raw stderr, kept for diagnostics
    pub stderr: String,
}

impl fmt::Display for GitOperationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "git {} exited with {}: {}",
            self.command,
            self.exit_code,
            self.stderr.trim()
        )
    }
}

impl std::error::Error for GitOperationError {}

/// Crate-wide error
#[derive(Debug, Error)]
pub enum Error {
    /// A git command failed
    #[error(transparent)]
    Git(#[from] GitOperationError),

    /// HEAD or another required ref could not be resolved
    #[error("git state error: {0}")]
    GitState(String),

    /// The remote could not be reached
    #[error("network unavailable: {0}")]
    Network(String),

    /// Authentication missing or rejected
    #[error("authentication failed: {0}")]
    Auth(String),

    /// GitHub API error
    #[error("GitHub API error: {0}")]
    GitHubApi(String),

    /// GitLab API error
    #[error("GitLab API error: {0}")]
    GitLabApi(String),

    /// Generic platform error
    #[error("platform error: {0}")]
    Platform(String),

    /// No GitHub or GitLab remote could be detected
    #[error("no supported remotes (GitHub/GitLab) found")]
    NoSupportedRemotes,

    /// Another sync or publish holds the repository lock
    #[error("another sync or publish is already running for {}", .0.display())]
    Busy(PathBuf),

    /// Outbox has no task with this id
    #[error("outbox task not found: {0}")]
    TaskNotFound(String),

    /// Configuration could not be loaded
    #[error("configuration error: {0}")]
    Config(String),

    /// Parse error (remote URLs, command output)
    #[error("parse error: {0}")]
    Parse(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal invariant violated
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<octocrab::Error> for Error {
    fn from(err: octocrab::Error) -> Self {
        if let octocrab::Error::GitHub { source, .. } = &err {
            return Self::GitHubApi(source.message.clone());
        }
        // Transport failures surface as hyper/service errors with these phrases
        let text = err.to_string();
        let lower = text.to_lowercase();
        if ["connect", "timed out", "dns", "resolve"]
            .iter()
            .any(|p| lower.contains(p))
        {
            Self::Network(text)
        } else {
            Self::GitHubApi(text)
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            Self::Network(err.to_string())
        } else {
            Self::Platform(err.to_string())
        }
    }
}

/// Failure taxonomy presented to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Remote unreachable; retried from the outbox
    NetworkUnavailable,
    /// Working tree has local modifications
    UncommittedChanges,
    /// Local and remote both have commits the other lacks
    Diverged,
    /// Merge stopped on conflicts
    MergeConflict,
    /// Credentials missing or rejected
    AuthFailure,
    /// The hosting API refused the request
    RemoteApiError,
    /// Publish branch already existed (handled internally)
    BranchCollision,
    /// Another operation holds the repository lock
    Busy,
    /// HEAD could not be resolved or is detached without a target
    GitState,
    /// Any other git failure
    Git,
}

impl ErrorKind {
    /// Whether the outbox may retry this failure
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::NetworkUnavailable)
    }

    /// Short, actionable text for the user
    pub const fn user_message(self) -> &'static str {
        match self {
            Self::NetworkUnavailable => "offline: remote is not reachable",
            Self::UncommittedChanges => "uncommitted changes: commit or stash before syncing",
            Self::Diverged => "diverged, manual resolution required",
            Self::MergeConflict => "merge conflict: resolve manually, the merge was aborted",
            Self::AuthFailure => "authentication failed: check your credentials",
            Self::RemoteApiError => "the hosting service rejected the request",
            Self::BranchCollision => "publish branch already exists",
            Self::Busy => "busy: another sync or publish is running for this repository",
            Self::GitState => "cannot resolve the current branch",
            Self::Git => "git command failed",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.user_message())
    }
}

const AUTH_PATTERNS: &[&str] = &[
    "authentication failed",
    "permission denied",
    "could not read username",
    "could not read password",
    "terminal prompts disabled",
    "invalid username or password",
    "returned error: 403",
    "returned error: 401",
];

const NETWORK_PATTERNS: &[&str] = &[
    "could not resolve host",
    "could not resolve hostname",
    "unable to access",
    "connection refused",
    "connection timed out",
    "connection reset",
    "operation timed out",
    "network is unreachable",
    "failed to connect",
    "no route to host",
    "the remote end hung up unexpectedly",
    "early eof",
    "could not read from remote repository",
];

/// Map a failed git command onto the taxonomy by inspecting stderr.
///
/// Auth patterns are checked first: ssh prints both "Permission denied" and
/// "Could not read from remote repository" for a rejected key.
pub fn classify_git_error(err: &GitOperationError) -> ErrorKind {
    let stderr = err.stderr.to_lowercase();
    if AUTH_PATTERNS.iter().any(|p| stderr.contains(p)) {
        ErrorKind::AuthFailure
    } else if NETWORK_PATTERNS.iter().any(|p| stderr.contains(p)) {
        ErrorKind::NetworkUnavailable
    } else {
        ErrorKind::Git
    }
}

impl Error {
    /// Classify this error into the caller-facing taxonomy
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Git(git) => classify_git_error(git),
            Self::GitState(_) => ErrorKind::GitState,
            Self::Network(_) => ErrorKind::NetworkUnavailable,
            Self::Auth(_) => ErrorKind::AuthFailure,
            Self::GitHubApi(_) | Self::GitLabApi(_) | Self::Platform(_) => {
                ErrorKind::RemoteApiError
            }
            Self::Busy(_) => ErrorKind::Busy,
            _ => ErrorKind::Git,
        }
    }
}
