//! Read-only queries over a working copy
//!
//! Nothing here is cached: every call asks git again, so answers reflect the
//! working copy at the moment of the call.

use crate::error::{Error, Result};
use crate::git::GitGateway;
use crate::types::HeadState;

/// Porcelain status codes for unmerged paths
const UNMERGED_CODES: &[&str] = &["DD", "AU", "UD", "UA", "DU", "AA", "UU"];

/// Repository state inspector
pub struct RepoInspector<'a> {
    git: &'a dyn GitGateway,
}

impl<'a> RepoInspector<'a> {
    /// Inspect the working copy behind `git`
    pub fn new(git: &'a dyn GitGateway) -> Self {
        Self { git }
    }

    /// Branch HEAD points at, or the detached commit
    pub async fn current_branch(&self) -> Result<HeadState> {
        let name = self
            .git
            .abbrev_head()
            .await
            .map_err(|e| Error::GitState(format!("cannot resolve HEAD: {e}")))?;
        if name == "HEAD" {
            let commit = self.head_commit().await?;
            Ok(HeadState::Detached(commit))
        } else {
            Ok(HeadState::Branch(name))
        }
    }

    /// Commit hash of HEAD
    pub async fn head_commit(&self) -> Result<String> {
        self.git
            .rev_parse("HEAD")
            .await
            .map_err(|e| Error::GitState(format!("cannot resolve HEAD: {e}")))
    }

    /// True when `status --porcelain` prints nothing
    pub async fn is_clean(&self) -> Result<bool> {
        Ok(self.git.status_porcelain().await?.trim().is_empty())
    }

    /// Commits `base` has that `target` lacks, and vice versa
    pub async fn ahead_behind(&self, base: &str, target: &str) -> Result<(u32, u32)> {
        let ahead = self.git.rev_list_count(target, base).await?;
        let behind = self.git.rev_list_count(base, target).await?;
        Ok((ahead, behind))
    }

    /// Whether the index holds unmerged paths
    pub async fn has_conflicts(&self) -> Result<bool> {
        let status = self.git.status_porcelain().await?;
        Ok(status
            .lines()
            .filter_map(|line| line.get(..2))
            .any(|code| UNMERGED_CODES.contains(&code)))
    }
}
