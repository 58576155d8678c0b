//! Durable record of one publish intent

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Prefix for publish branches
pub const BRANCH_PREFIX: &str = "add/";

/// Lifecycle of a publish task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Waiting for a retry
    Pending,
    /// A retry is running (or was interrupted)
    InFlight,
    /// Pull request exists
    Succeeded,
    /// Needs user action before another retry
    Failed,
}

/// One dataset change to be published as a pull request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishTask {
    /// Stable identifier
    pub task_id: String,
    /// Dataset identifier
    pub dataset_id: String,
    /// Validated metadata, written verbatim as the artifact
    pub metadata_snapshot: serde_json::Value,
    /// Branch every attempt targets; fixed at creation
    pub branch_name: String,
    /// When the intent was recorded
    pub created_at: DateTime<Utc>,
    /// Last status change
    pub updated_at: DateTime<Utc>,
    /// Attempts made so far
    pub attempt_count: u32,
    /// Most recent failure
    pub last_error: Option<String>,
    /// Current status
    pub status: TaskStatus,
    /// Pull request URL once published
    pub pr_url: Option<String>,
    /// Pull request number once published
    pub pr_number: Option<u64>,
}

impl PublishTask {
    /// New task with a fresh id and branch name derived from `now`
    pub fn new(dataset_id: &str, metadata: serde_json::Value, now: DateTime<Utc>) -> Self {
        Self {
            task_id: Uuid::new_v4().to_string(),
            dataset_id: dataset_id.to_string(),
            metadata_snapshot: metadata,
            branch_name: branch_name(dataset_id, now),
            created_at: now,
            updated_at: now,
            attempt_count: 0,
            last_error: None,
            status: TaskStatus::Pending,
            pr_url: None,
            pr_number: None,
        }
    }

    /// Artifact location relative to the working copy
    pub fn artifact_path(&self, metadata_dir: &Path) -> PathBuf {
        metadata_dir.join(format!("{}.json", self.dataset_id))
    }

    /// Conventional commit message, also used as PR title
    pub fn commit_message(&self) -> String {
        format!("feat(dataset): add {}", self.dataset_id)
    }

    /// Pull request description
    pub fn pr_body(&self) -> String {
        format!(
            "Adds metadata for dataset `{}`.\n\nPublish task: `{}`",
            self.dataset_id, self.task_id
        )
    }

    pub(crate) fn set_status(&mut self, status: TaskStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }
}

/// Dataset ids become a file name and part of a branch name, so only
/// `[A-Za-z0-9._-]` is accepted and the id may not start with `.` or `-`.
pub fn validate_dataset_id(dataset_id: &str) -> Result<()> {
    let valid = !dataset_id.is_empty()
        && !dataset_id.starts_with(['.', '-'])
        && !dataset_id.contains("..")
        && dataset_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
    if valid {
        Ok(())
    } else {
        Err(Error::Parse(format!("invalid dataset id: {dataset_id:?}")))
    }
}

/// `add/<dataset-id>-<UTC timestamp>`
pub fn branch_name(dataset_id: &str, at: DateTime<Utc>) -> String {
    format!("{BRANCH_PREFIX}{dataset_id}-{}", at.format("%Y%m%d%H%M%S"))
}
