//! Configuration values
//!
//! Every operation takes its configuration explicitly. [`Settings`] is the
//! optional on-disk defaults file the CLI reads before applying flags.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default remote name
pub const DEFAULT_REMOTE: &str = "origin";

/// Default directory for dataset metadata artifacts
pub const DEFAULT_METADATA_DIR: &str = "datasets";

/// Options for one sync
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Remote to pull from
    pub remote: String,
    /// Remote branch to pull; the current branch name when `None`
    pub branch: Option<String>,
    /// Stash local changes around the sync instead of aborting
    pub auto_stash: bool,
    /// Create a merge commit when local and remote have diverged
    pub allow_merge: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            remote: DEFAULT_REMOTE.to_string(),
            branch: None,
            auto_stash: false,
            allow_merge: false,
        }
    }
}

/// Options for publishing datasets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishConfig {
    /// Remote holding the upstream repository
    pub remote: String,
    /// Branch pull requests target
    pub base_branch: String,
    /// Directory (relative to the working copy) for metadata artifacts
    pub metadata_dir: PathBuf,
    /// Reviewers requested on new pull requests
    pub reviewers: Vec<String>,
    /// Labels added to pull requests
    pub labels: Vec<String>,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            remote: DEFAULT_REMOTE.to_string(),
            base_branch: "main".to_string(),
            metadata_dir: PathBuf::from(DEFAULT_METADATA_DIR),
            reviewers: Vec::new(),
            labels: Vec::new(),
        }
    }
}

/// Settings file contents; every field is optional
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Remote name
    pub remote: Option<String>,
    /// Pull request target branch
    pub base_branch: Option<String>,
    /// Metadata artifact directory
    pub metadata_dir: Option<PathBuf>,
    /// Reviewers for new pull requests
    pub reviewers: Vec<String>,
    /// Labels for pull requests
    pub labels: Vec<String>,
    /// Stash local changes during sync
    pub auto_stash: bool,
    /// Allow merge commits during sync
    pub allow_merge: bool,
}

impl Settings {
    /// Default settings file location (`<config_dir>/dsync/config.json`)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("dsync").join("config.json"))
    }

    /// Load settings; a missing file yields defaults
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(text) => serde_json::from_str(&text)
                .map_err(|e| Error::Config(format!("{}: {e}", path.display()))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Sync options with these settings applied
    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            remote: self
                .remote
                .clone()
                .unwrap_or_else(|| DEFAULT_REMOTE.to_string()),
            branch: None,
            auto_stash: self.auto_stash,
            allow_merge: self.allow_merge,
        }
    }

    /// Publish options with these settings applied
    pub fn publish_config(&self) -> PublishConfig {
        let defaults = PublishConfig::default();
        PublishConfig {
            remote: self.remote.clone().unwrap_or(defaults.remote),
            base_branch: self.base_branch.clone().unwrap_or(defaults.base_branch),
            metadata_dir: self.metadata_dir.clone().unwrap_or(defaults.metadata_dir),
            reviewers: self.reviewers.clone(),
            labels: self.labels.clone(),
        }
    }
}
