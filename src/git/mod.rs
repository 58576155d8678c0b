//! Git access for a single working copy
//!
//! [`GitGateway`] is a narrow interface with one method per git subcommand the
//! engines need. [`GitCli`] runs the real `git` binary; tests substitute an
//! in-memory implementation. [`RepoInspector`] layers read-only queries on top.

mod cli;
mod inspect;

pub use cli::GitCli;
pub use inspect::RepoInspector;

use crate::error::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Git operations on one working copy
#[async_trait]
pub trait GitGateway: Send + Sync {
    /// Working copy root this gateway operates on
    fn workdir(&self) -> &Path;

    /// Resolve a revision to a full commit hash
    async fn rev_parse(&self, rev: &str) -> Result<String>;

    /// Symbolic name of HEAD ("HEAD" when detached)
    async fn abbrev_head(&self) -> Result<String>;

    /// Whether a ref resolves
    async fn ref_exists(&self, reference: &str) -> Result<bool>;

    /// Absolute path of the `.git` directory
    async fn absolute_git_dir(&self) -> Result<PathBuf>;

    /// Raw `status --porcelain` output
    async fn status_porcelain(&self) -> Result<String>;

    /// Number of commits in `from..to`
    async fn rev_list_count(&self, from: &str, to: &str) -> Result<u32>;

    /// Paths changed between two commits
    async fn diff_names(&self, from: &str, to: &str) -> Result<Vec<String>>;

    /// URL configured for a remote
    async fn remote_url(&self, remote: &str) -> Result<String>;

    /// Fetch a branch from a remote
    async fn fetch(&self, remote: &str, branch: &str) -> Result<()>;

    /// Fast-forward the current branch to `target`
    async fn merge_ff_only(&self, target: &str) -> Result<()>;

    /// Merge `target` creating a merge commit
    async fn merge(&self, target: &str, message: &str) -> Result<()>;

    /// Abort an in-progress merge
    async fn merge_abort(&self) -> Result<()>;

    /// Stash local changes including untracked files
    async fn stash_push(&self, message: &str) -> Result<()>;

    /// Restore the most recent stash
    async fn stash_pop(&self) -> Result<()>;

    /// Force-delete a local branch
    async fn branch_delete(&self, name: &str) -> Result<()>;

    /// Create and switch to a branch starting at `start`
    async fn checkout_new_branch(&self, name: &str, start: &str) -> Result<()>;

    /// Switch to an existing branch
    async fn checkout(&self, name: &str) -> Result<()>;

    /// Stage paths (relative to the working copy)
    async fn add(&self, paths: &[&str]) -> Result<()>;

    /// Commit staged changes
    async fn commit(&self, message: &str) -> Result<()>;

    /// Reset index and working tree to `rev`
    async fn reset_hard(&self, rev: &str) -> Result<()>;

    /// Push `branch` to a remote name or URL
    async fn push(&self, target: &str, branch: &str, force: bool) -> Result<()>;
}
