//! Progress callback trait for interface-agnostic updates
//!
//! The sync engine and publish pipeline report state transitions through
//! [`ProgressCallback`], so a CLI, TUI or test harness can observe them
//! without the engines knowing who is listening.

use crate::publish::PublishState;
use crate::sync::SyncState;
use crate::types::PullRequest;
use async_trait::async_trait;

/// Progress callback trait
#[async_trait]
pub trait ProgressCallback: Send + Sync {
    /// Sync engine entered a new state
    async fn on_sync_state(&self, state: SyncState);

    /// Publish pipeline entered a new state
    async fn on_publish_state(&self, state: PublishState);

    /// A successful sync changed tracked files. Callers that maintain
    /// derived data (search indexes) refresh it here.
    async fn on_content_changed(&self, files: &[String]);

    /// A pull request was opened or reused
    async fn on_pr_synced(&self, pr: &PullRequest, created: bool);

    /// General status message
    async fn on_message(&self, message: &str);
}

/// No-op progress callback for testing or when progress isn't needed
pub struct NoopProgress;

#[async_trait]
impl ProgressCallback for NoopProgress {
    async fn on_sync_state(&self, _state: SyncState) {}
    async fn on_publish_state(&self, _state: PublishState) {}
    async fn on_content_changed(&self, _files: &[String]) {}
    async fn on_pr_synced(&self, _pr: &PullRequest, _created: bool) {}
    async fn on_message(&self, _message: &str) {}
}
