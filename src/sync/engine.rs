//! Guarded pull/merge of a remote branch into the current branch

use crate::config::SyncConfig;
use crate::connectivity::Connectivity;
use crate::error::{Error, ErrorKind};
use crate::git::{GitGateway, RepoInspector};
use crate::lock::RepoLocks;
use crate::progress::ProgressCallback;
use crate::types::{SyncOutcome, SyncResult};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Stash message used for auto-stash, so users can recognize the entry
pub const AUTO_STASH_MESSAGE: &str = "dsync: auto-stash before sync";

/// Sync engine state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Not started
    Idle,
    /// Probing the remote
    CheckingNetwork,
    /// Inspecting HEAD and the working tree
    CheckingLocalState,
    /// Fetching the remote branch
    Fetching,
    /// Integrating fetched commits
    Merging,
    /// Finished
    Done(SyncOutcome),
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::CheckingNetwork => write!(f, "Checking network"),
            Self::CheckingLocalState => write!(f, "Checking local state"),
            Self::Fetching => write!(f, "Fetching"),
            Self::Merging => write!(f, "Merging"),
            Self::Done(outcome) => write!(f, "Done ({outcome:?})"),
        }
    }
}

/// Early exit from the state machine
struct Stop {
    outcome: SyncOutcome,
    message: String,
}

impl Stop {
    fn aborted(kind: ErrorKind) -> Self {
        Self {
            outcome: SyncOutcome::Aborted(kind),
            message: kind.user_message().to_string(),
        }
    }

    fn failed(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            outcome: SyncOutcome::Failed(kind),
            message: message.into(),
        }
    }

    /// Failure carrying the error's own text
    fn from_error(context: &str, err: &Error) -> Self {
        warn!("{context}: {err}");
        Self::failed(err.kind(), format!("{context}: {err}"))
    }
}

/// Values gathered along the way, reported whatever the outcome
#[derive(Default)]
struct Tally {
    previous_commit: String,
    new_commit: String,
    commits_pulled: u32,
    changed_files: Vec<String>,
}

/// Sync engine for one working copy
#[derive(Clone)]
pub struct SyncEngine {
    git: Arc<dyn GitGateway>,
    connectivity: Arc<dyn Connectivity>,
    locks: RepoLocks,
}

impl SyncEngine {
    /// Create an engine; `locks` must be shared with any publish pipeline
    /// operating on the same working copy
    pub fn new(
        git: Arc<dyn GitGateway>,
        connectivity: Arc<dyn Connectivity>,
        locks: RepoLocks,
    ) -> Self {
        Self {
            git,
            connectivity,
            locks,
        }
    }

    /// Run one sync attempt
    ///
    /// Never returns an error: every failure is folded into the
    /// [`SyncResult`] outcome so the caller always gets the commit
    /// bookkeeping.
    pub async fn sync(&self, config: &SyncConfig, progress: &dyn ProgressCallback) -> SyncResult {
        progress.on_sync_state(SyncState::Idle).await;

        let mut state = Tally::default();
        let stop = match self.locks.try_acquire(self.git.workdir()) {
            Ok(_guard) => self.run_guarded(config, progress, &mut state).await,
            Err(_) => Err(Stop::aborted(ErrorKind::Busy)),
        };

        let (outcome, message) = match stop {
            Ok(message) => {
                let outcome = if state.commits_pulled == 0 {
                    SyncOutcome::NoOp
                } else {
                    SyncOutcome::Success
                };
                (outcome, message)
            }
            Err(stop) => (stop.outcome, stop.message),
        };

        if outcome == SyncOutcome::Success && !state.changed_files.is_empty() {
            progress.on_content_changed(&state.changed_files).await;
        }
        progress.on_sync_state(SyncState::Done(outcome)).await;
        info!(?outcome, "sync finished: {message}");

        SyncResult {
            success: matches!(outcome, SyncOutcome::Success | SyncOutcome::NoOp),
            message,
            previous_commit: state.previous_commit,
            new_commit: state.new_commit,
            commits_pulled: state.commits_pulled,
            outcome,
            changed_files: state.changed_files,
        }
    }

    /// Everything that happens while holding the repository lock
    async fn run_guarded(
        &self,
        config: &SyncConfig,
        progress: &dyn ProgressCallback,
        state: &mut Tally,
    ) -> Result<String, Stop> {
        let inspector = RepoInspector::new(self.git.as_ref());

        progress.on_sync_state(SyncState::CheckingNetwork).await;
        let url = self
            .git
            .remote_url(&config.remote)
            .await
            .map_err(|e| Stop::from_error("cannot read remote", &e))?;
        if !self.connectivity.is_reachable(&url).await {
            return Err(Stop::aborted(ErrorKind::NetworkUnavailable));
        }

        progress.on_sync_state(SyncState::CheckingLocalState).await;
        let head = inspector
            .current_branch()
            .await
            .map_err(|e| Stop::from_error("cannot resolve HEAD", &e))?;
        let branch = match (&config.branch, head.branch()) {
            (Some(branch), _) => branch.clone(),
            (None, Some(branch)) => branch.to_string(),
            (None, None) => {
                return Err(Stop::failed(
                    ErrorKind::GitState,
                    "detached HEAD: check out a branch or name the branch to sync",
                ));
            }
        };
        state.previous_commit = inspector
            .head_commit()
            .await
            .map_err(|e| Stop::from_error("cannot resolve HEAD", &e))?;
        state.new_commit.clone_from(&state.previous_commit);

        let clean = inspector
            .is_clean()
            .await
            .map_err(|e| Stop::from_error("cannot read status", &e))?;
        if clean {
            return self.pull(config, &branch, progress, state).await;
        }
        if !config.auto_stash {
            return Err(Stop::aborted(ErrorKind::UncommittedChanges));
        }

        self.git
            .stash_push(AUTO_STASH_MESSAGE)
            .await
            .map_err(|e| Stop::from_error("auto-stash failed", &e))?;
        debug!("stashed local changes");

        let pulled = self.pull(config, &branch, progress, state).await;

        // Restore on every exit path; a failed pop leaves the entry in the
        // stash list rather than dropping it.
        match self.git.stash_pop().await {
            Ok(()) => {
                debug!("restored stashed changes");
                pulled
            }
            Err(e) => {
                warn!("restoring auto-stash failed: {e}");
                let message = format!(
                    "{}; local changes could not be restored and remain stashed, run `git stash pop`",
                    match &pulled {
                        Ok(message) => message.as_str(),
                        Err(stop) => stop.message.as_str(),
                    }
                );
                Err(Stop::failed(ErrorKind::Git, message))
            }
        }
    }

    /// Fetch and integrate; assumes a clean tree
    async fn pull(
        &self,
        config: &SyncConfig,
        branch: &str,
        progress: &dyn ProgressCallback,
        state: &mut Tally,
    ) -> Result<String, Stop> {
        let inspector = RepoInspector::new(self.git.as_ref());

        progress.on_sync_state(SyncState::Fetching).await;
        self.git
            .fetch(&config.remote, branch)
            .await
            .map_err(|e| Stop::from_error("fetch failed", &e))?;

        let target = format!("{}/{branch}", config.remote);
        let (ahead, behind) = inspector
            .ahead_behind("HEAD", &target)
            .await
            .map_err(|e| Stop::from_error("cannot compare with remote", &e))?;
        debug!("HEAD vs {target}: ahead {ahead}, behind {behind}");

        if behind == 0 {
            return Ok("already up to date".to_string());
        }

        progress.on_sync_state(SyncState::Merging).await;
        if ahead == 0 {
            self.git
                .merge_ff_only(&target)
                .await
                .map_err(|e| Stop::from_error("fast-forward failed", &e))?;
        } else if config.allow_merge {
            let message = format!("Merge {target} into {branch}");
            if let Err(e) = self.git.merge(&target, &message).await {
                return Err(self.recover_failed_merge(&e).await);
            }
        } else {
            return Err(Stop::aborted(ErrorKind::Diverged));
        }

        state.commits_pulled = behind;
        state.new_commit = inspector
            .head_commit()
            .await
            .map_err(|e| Stop::from_error("cannot resolve HEAD", &e))?;
        state.changed_files = self
            .git
            .diff_names(&state.previous_commit, &state.new_commit)
            .await
            .unwrap_or_else(|e| {
                warn!("cannot list changed files: {e}");
                Vec::new()
            });

        Ok(format!(
            "pulled {behind} commit{}",
            if behind == 1 { "" } else { "s" }
        ))
    }

    /// Abort a conflicted merge so the branch is left as it was
    async fn recover_failed_merge(&self, err: &Error) -> Stop {
        let inspector = RepoInspector::new(self.git.as_ref());
        if inspector.has_conflicts().await.unwrap_or(false) {
            warn!("merge conflict: {err}");
            if let Err(abort) = self.git.merge_abort().await {
                warn!("merge --abort failed: {abort}");
            }
            return Stop::failed(
                ErrorKind::MergeConflict,
                ErrorKind::MergeConflict.user_message(),
            );
        }
        Stop::from_error("merge failed", err)
    }
}
