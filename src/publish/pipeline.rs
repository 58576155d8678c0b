//! Publish a dataset change as a pull request
//!
//! One attempt walks `Validated → BranchCreated → Committed → Pushed →
//! PrSynced → Succeeded`. Network failures anywhere after validation end in
//! `QueuedOffline` and the task goes to the outbox; anything else ends in
//! `Failed` with the error text preserved.

use crate::config::PublishConfig;
use crate::connectivity::Connectivity;
use crate::error::{Error, ErrorKind, Result};
use crate::git::{GitGateway, RepoInspector};
use crate::lock::{RepoLockGuard, RepoLocks};
use crate::outbox::Outbox;
use crate::platform::PlatformService;
use crate::progress::ProgressCallback;
use crate::publish::task::{PublishTask, TaskStatus, validate_dataset_id};
use crate::types::{HeadState, NewPullRequest, PullRequest, RepoRef};
use chrono::Utc;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Publish pipeline state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishState {
    /// Metadata accepted, git preconditions being checked
    Validated,
    /// Publish branch checked out
    BranchCreated,
    /// Artifact committed
    Committed,
    /// Branch pushed
    Pushed,
    /// Pull request opened or reused
    PrSynced,
    /// Done
    Succeeded,
    /// Stored in the outbox for retry
    QueuedOffline,
    /// Needs user action
    Failed,
}

impl fmt::Display for PublishState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validated => write!(f, "Checking preconditions"),
            Self::BranchCreated => write!(f, "Branch created"),
            Self::Committed => write!(f, "Committed"),
            Self::Pushed => write!(f, "Pushed"),
            Self::PrSynced => write!(f, "Pull request ready"),
            Self::Succeeded => write!(f, "Published"),
            Self::QueuedOffline => write!(f, "Queued for retry"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

/// A dataset change the caller has already validated
#[derive(Debug, Clone, PartialEq)]
pub struct PublishRequest {
    /// Dataset identifier
    pub dataset_id: String,
    /// Metadata written as the artifact
    pub metadata: serde_json::Value,
}

/// Result handed back to the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishResult {
    /// Whether a pull request exists for the task
    pub success: bool,
    /// Short user-facing message
    pub message: String,
    /// Pull request URL when published
    pub pr_url: Option<String>,
    /// Whether the task was stored for retry
    pub queued_offline: bool,
    /// Task the result belongs to
    pub task_id: String,
    /// Terminal state
    pub state: PublishState,
}

impl PublishResult {
    pub(crate) fn busy(task_id: &str) -> Self {
        Self {
            success: false,
            message: ErrorKind::Busy.user_message().to_string(),
            pr_url: None,
            queued_offline: false,
            task_id: task_id.to_string(),
            state: PublishState::Failed,
        }
    }

    pub(crate) fn already_published(task: &PublishTask) -> Self {
        Self {
            success: true,
            message: "already published".to_string(),
            pr_url: task.pr_url.clone(),
            queued_offline: false,
            task_id: task.task_id.clone(),
            state: PublishState::Succeeded,
        }
    }
}

/// Outcome of one pass through the state machine
#[derive(Debug)]
pub(crate) enum Attempt {
    Published { pr: PullRequest, created: bool },
    Offline(String),
    Failed(ErrorKind, String),
}

impl Attempt {
    fn from_error(err: &Error) -> Self {
        let kind = err.kind();
        warn!("publish attempt failed ({kind:?}): {err}");
        if kind.is_retryable() {
            Self::Offline(err.to_string())
        } else {
            Self::Failed(kind, err.to_string())
        }
    }

    const fn state(&self) -> PublishState {
        match self {
            Self::Published { .. } => PublishState::Succeeded,
            Self::Offline(_) => PublishState::QueuedOffline,
            Self::Failed(..) => PublishState::Failed,
        }
    }

    /// Fold the outcome into the task record
    pub(crate) fn record(&self, task: &mut PublishTask) {
        match self {
            Self::Published { pr, .. } => {
                task.pr_url = Some(pr.html_url.clone());
                task.pr_number = Some(pr.number);
                task.last_error = None;
                task.set_status(TaskStatus::Succeeded);
            }
            Self::Offline(msg) => {
                task.last_error = Some(msg.clone());
                task.set_status(TaskStatus::Pending);
            }
            Self::Failed(_, msg) => {
                task.last_error = Some(msg.clone());
                task.set_status(TaskStatus::Failed);
            }
        }
    }

    pub(crate) fn result(&self, task: &PublishTask) -> PublishResult {
        let (success, message, pr_url) = match self {
            Self::Published { pr, created } => (
                true,
                if *created {
                    format!("opened pull request #{}", pr.number)
                } else {
                    format!("updated pull request #{}", pr.number)
                },
                Some(pr.html_url.clone()),
            ),
            Self::Offline(_) => (
                false,
                format!(
                    "{}; queued for retry as task {}",
                    ErrorKind::NetworkUnavailable.user_message(),
                    task.task_id
                ),
                None,
            ),
            Self::Failed(_, msg) => (false, msg.clone(), None),
        };
        PublishResult {
            success,
            message,
            pr_url,
            queued_offline: matches!(self, Self::Offline(_)),
            task_id: task.task_id.clone(),
            state: self.state(),
        }
    }
}

/// Where the publish branch is pushed and who owns it
#[derive(Debug, Clone, PartialEq, Eq)]
struct PushTarget {
    /// Remote name or URL
    push_to: String,
    /// Fork owner when pushing to a fork
    head_owner: Option<String>,
}

/// Open a pull request for `request.head` unless an open one already exists.
///
/// Returns the pull request and whether it was created by this call.
pub async fn create_or_get_pr(
    platform: &dyn PlatformService,
    request: &NewPullRequest,
) -> Result<(PullRequest, bool)> {
    if let Some(pr) = platform
        .find_existing_pr(&request.head, request.head_owner.as_deref())
        .await?
    {
        debug!("reusing PR #{} for {}", pr.number, request.head);
        return Ok((pr, false));
    }
    let pr = platform.create_pr(request).await?;
    Ok((pr, true))
}

/// Publish pipeline bound to one working copy
#[derive(Clone)]
pub struct PublishPipeline {
    git: Arc<dyn GitGateway>,
    platform: Arc<dyn PlatformService>,
    connectivity: Arc<dyn Connectivity>,
    locks: RepoLocks,
    config: PublishConfig,
}

impl PublishPipeline {
    /// Create a pipeline; `locks` must be shared with any sync engine
    /// operating on the same working copy
    pub fn new(
        git: Arc<dyn GitGateway>,
        platform: Arc<dyn PlatformService>,
        connectivity: Arc<dyn Connectivity>,
        locks: RepoLocks,
        config: PublishConfig,
    ) -> Self {
        Self {
            git,
            platform,
            connectivity,
            locks,
            config,
        }
    }

    /// Configuration in use
    pub const fn config(&self) -> &PublishConfig {
        &self.config
    }

    /// Upstream repository pull requests are opened against
    pub fn repo(&self) -> RepoRef {
        self.platform.config().repo_ref(&self.config.base_branch)
    }

    pub(crate) fn try_lock(&self) -> Result<RepoLockGuard> {
        self.locks.try_acquire(self.git.workdir())
    }

    /// Publish a dataset change; on network failure the task is enqueued in
    /// `outbox` and the result reports `queued_offline`
    pub async fn publish(
        &self,
        request: PublishRequest,
        outbox: &Outbox,
        progress: &dyn ProgressCallback,
    ) -> Result<PublishResult> {
        validate_dataset_id(&request.dataset_id)?;
        let mut task = PublishTask::new(&request.dataset_id, request.metadata, Utc::now());
        let repo = self.repo();
        info!(
            task = %task.task_id,
            branch = %task.branch_name,
            "publishing {} to {}/{}:{}",
            task.dataset_id,
            repo.owner,
            repo.repo,
            repo.default_branch
        );

        let Ok(_guard) = self.try_lock() else {
            progress.on_publish_state(PublishState::Failed).await;
            return Ok(PublishResult::busy(&task.task_id));
        };

        task.attempt_count = 1;
        task.set_status(TaskStatus::InFlight);
        let attempt = self.attempt(&task, progress).await;
        attempt.record(&mut task);

        if matches!(attempt, Attempt::Offline(_)) {
            outbox.enqueue(&task)?;
        }
        progress.on_publish_state(attempt.state()).await;
        Ok(attempt.result(&task))
    }

    /// Run the state machine once for `task`; caller holds the lock
    pub(crate) async fn attempt(
        &self,
        task: &PublishTask,
        progress: &dyn ProgressCallback,
    ) -> Attempt {
        progress.on_publish_state(PublishState::Validated).await;
        let inspector = RepoInspector::new(self.git.as_ref());

        match inspector.is_clean().await {
            Ok(true) => {}
            Ok(false) => {
                return Attempt::Failed(
                    ErrorKind::UncommittedChanges,
                    "uncommitted changes: commit or stash before publishing".to_string(),
                );
            }
            Err(e) => return Attempt::from_error(&e),
        }

        let url = match self.git.remote_url(&self.config.remote).await {
            Ok(url) => url,
            Err(e) => return Attempt::from_error(&e),
        };
        if !self.connectivity.is_reachable(&url).await {
            return Attempt::Offline(ErrorKind::NetworkUnavailable.user_message().to_string());
        }

        let original = match inspector.current_branch().await {
            Ok(head) => head,
            Err(e) => return Attempt::from_error(&e),
        };

        let target = match self.push_target().await {
            Ok(target) => target,
            Err(e) => return Attempt::from_error(&e),
        };

        let pushed = self.branch_commit_push(task, &target, &original, progress).await;
        self.restore_head(task, &original).await;
        if let Err(e) = pushed {
            return Attempt::from_error(&e);
        }

        match self.sync_pr(task, &target, progress).await {
            Ok((pr, created)) => Attempt::Published { pr, created },
            Err(e) => Attempt::from_error(&e),
        }
    }

    /// Push to the upstream remote, or to a fork when we lack push rights
    async fn push_target(&self) -> Result<PushTarget> {
        if self.platform.has_push_access().await? {
            return Ok(PushTarget {
                push_to: self.config.remote.clone(),
                head_owner: None,
            });
        }
        let fork = self.platform.ensure_fork().await?;
        info!("no push access upstream, publishing through fork {}", fork.owner);
        Ok(PushTarget {
            push_to: fork.clone_url,
            head_owner: Some(fork.owner),
        })
    }

    async fn branch_commit_push(
        &self,
        task: &PublishTask,
        target: &PushTarget,
        original: &HeadState,
        progress: &dyn ProgressCallback,
    ) -> Result<()> {
        self.create_branch(task, original).await?;
        progress.on_publish_state(PublishState::BranchCreated).await;

        self.commit_artifact(task).await?;
        progress.on_publish_state(PublishState::Committed).await;

        self.git
            .push(&target.push_to, &task.branch_name, true)
            .await?;
        progress.on_publish_state(PublishState::Pushed).await;
        Ok(())
    }

    /// Check out a fresh publish branch from the base, replacing any stale
    /// branch of the same name
    async fn create_branch(&self, task: &PublishTask, original: &HeadState) -> Result<()> {
        let remote = &self.config.remote;
        let base = &self.config.base_branch;
        self.git.fetch(remote, base).await?;

        let remote_base = format!("{remote}/{base}");
        let start = if self.git.ref_exists(&remote_base).await? {
            remote_base
        } else {
            "HEAD".to_string()
        };

        let local_ref = format!("refs/heads/{}", task.branch_name);
        if self.git.ref_exists(&local_ref).await? {
            let inspector = RepoInspector::new(self.git.as_ref());
            let tip = self.git.rev_parse(&local_ref).await.unwrap_or_default();
            let (unique, _) = inspector
                .ahead_behind(&local_ref, &start)
                .await
                .unwrap_or((0, 0));
            if unique > 0 {
                warn!(
                    "recreating {}: discarding {unique} commit(s) from previous attempt (tip {tip})",
                    task.branch_name
                );
            } else {
                debug!("recreating {} (tip {tip})", task.branch_name);
            }
            // git refuses to delete the checked-out branch
            if original.branch() == Some(task.branch_name.as_str()) {
                self.git.checkout(&start).await?;
            }
            self.git.branch_delete(&task.branch_name).await?;
        }

        self.git.checkout_new_branch(&task.branch_name, &start).await
    }

    /// Write and commit the artifact. On failure the artifact is removed
    /// again so it cannot follow the checkout back to the user's branch.
    async fn commit_artifact(&self, task: &PublishTask) -> Result<()> {
        let relative = task.artifact_path(&self.config.metadata_dir);
        let absolute = self.git.workdir().join(&relative);
        let committed = self.write_and_commit(task, &relative, &absolute).await;
        if committed.is_err() {
            self.discard_artifact(&absolute).await;
        }
        committed
    }

    async fn write_and_commit(
        &self,
        task: &PublishTask,
        relative: &Path,
        absolute: &Path,
    ) -> Result<()> {
        if let Some(parent) = absolute.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut content = serde_json::to_vec_pretty(&task.metadata_snapshot)?;
        content.push(b'\n');
        tokio::fs::write(absolute, content).await?;

        let relative = relative.to_string_lossy();
        self.git.add(&[relative.as_ref()]).await?;
        self.git.commit(&task.commit_message()).await
    }

    /// Drop a staged or untracked artifact left by a failed commit. The tree
    /// was clean before the attempt, so resetting to HEAD only loses the
    /// artifact.
    async fn discard_artifact(&self, absolute: &Path) {
        if let Err(e) = self.git.reset_hard("HEAD").await {
            warn!("could not reset after failed commit: {e}");
        }
        let inspector = RepoInspector::new(self.git.as_ref());
        if matches!(inspector.is_clean().await, Ok(true)) {
            return;
        }
        match tokio::fs::remove_file(absolute).await {
            Ok(()) => debug!("removed uncommitted artifact {}", absolute.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("could not remove {}: {e}", absolute.display()),
        }
    }

    /// Return to the branch the user was on
    async fn restore_head(&self, task: &PublishTask, original: &HeadState) {
        let back_to = match original {
            HeadState::Branch(name) if *name == task.branch_name => &self.config.base_branch,
            HeadState::Branch(name) | HeadState::Detached(name) => name,
        };
        if let Err(e) = self.git.checkout(back_to).await {
            warn!("could not return to {back_to}: {e}");
        }
    }

    async fn sync_pr(
        &self,
        task: &PublishTask,
        target: &PushTarget,
        progress: &dyn ProgressCallback,
    ) -> Result<(PullRequest, bool)> {
        let request = NewPullRequest {
            head: task.branch_name.clone(),
            head_owner: target.head_owner.clone(),
            base: self.config.base_branch.clone(),
            title: task.commit_message(),
            body: task.pr_body(),
        };
        let (pr, created) = create_or_get_pr(self.platform.as_ref(), &request).await?;
        progress.on_pr_synced(&pr, created).await;

        // Reviewers and labels are best effort; the PR already exists
        if !self.config.reviewers.is_empty() {
            if let Err(e) = self
                .platform
                .request_reviewers(pr.number, &self.config.reviewers)
                .await
            {
                warn!("requesting reviewers on #{} failed: {e}", pr.number);
                progress
                    .on_message(&format!("could not request reviewers: {e}"))
                    .await;
            }
        }
        if !self.config.labels.is_empty() {
            if let Err(e) = self.platform.add_labels(pr.number, &self.config.labels).await {
                warn!("adding labels to #{} failed: {e}", pr.number);
                progress.on_message(&format!("could not add labels: {e}")).await;
            }
        }

        progress.on_publish_state(PublishState::PrSynced).await;
        Ok((pr, created))
    }
}
