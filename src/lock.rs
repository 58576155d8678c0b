//! Per-working-copy operation lock
//!
//! Sync and publish share one [`RepoLocks`] registry. A second caller for the
//! same working copy is refused immediately with [`Error::Busy`], never queued.
//!
//! The lock is an exclusive OS file lock on `<git-dir>/dsync/lock`, so two
//! `dsync` processes on one repository exclude each other as well. Working
//! copies without a git directory lock a file in the temp directory instead.

use crate::error::{Error, Result};
use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::hash::{DefaultHasher, Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

const LOCK_FILE: &str = "lock";

/// Registry of working copies with an operation in flight
#[derive(Debug, Clone, Default)]
pub struct RepoLocks {
    held: Arc<Mutex<HashSet<PathBuf>>>,
}

impl RepoLocks {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the lock for `path` or fail with [`Error::Busy`]
    pub fn try_acquire(&self, path: &Path) -> Result<RepoLockGuard> {
        let workdir = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        let lock_path = lock_file_path(&workdir);

        // flock is per open file, so same-process callers are caught here first
        if !self.held().insert(lock_path.clone()) {
            debug!("lock busy: {}", workdir.display());
            return Err(Error::Busy(workdir));
        }

        match lock_file(&lock_path) {
            Ok(file) => {
                debug!("lock acquired: {}", lock_path.display());
                Ok(RepoLockGuard {
                    held: Arc::clone(&self.held),
                    lock_path,
                    file,
                })
            }
            Err(e) => {
                self.held().remove(&lock_path);
                if is_contended(&e) {
                    debug!("lock busy in another process: {}", workdir.display());
                    Err(Error::Busy(workdir))
                } else {
                    Err(Error::Io(e))
                }
            }
        }
    }

    /// Whether an operation, in this process or another, holds the lock for
    /// `path`
    pub fn is_locked(&self, path: &Path) -> bool {
        let workdir = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        let lock_path = lock_file_path(&workdir);
        if self.held().contains(&lock_path) {
            return true;
        }
        let Ok(file) = File::open(&lock_path) else {
            return false;
        };
        match fs2::FileExt::try_lock_exclusive(&file) {
            Ok(()) => {
                let _ = fs2::FileExt::unlock(&file);
                false
            }
            Err(e) => is_contended(&e),
        }
    }

    fn held(&self) -> std::sync::MutexGuard<'_, HashSet<PathBuf>> {
        self.held.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Releases the working-copy lock on drop
#[derive(Debug)]
pub struct RepoLockGuard {
    held: Arc<Mutex<HashSet<PathBuf>>>,
    lock_path: PathBuf,
    file: File,
}

impl Drop for RepoLockGuard {
    fn drop(&mut self) {
        let _ = fs2::FileExt::unlock(&self.file);
        self.held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.lock_path);
        debug!("lock released: {}", self.lock_path.display());
    }
}

fn lock_file(lock_path: &Path) -> std::io::Result<File> {
    if let Some(parent) = lock_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(lock_path)?;
    fs2::FileExt::try_lock_exclusive(&file)?;
    Ok(file)
}

fn is_contended(err: &std::io::Error) -> bool {
    err.kind() == fs2::lock_contended_error().kind()
}

/// `<git-dir>/dsync/lock` for the repository containing `workdir`
fn lock_file_path(workdir: &Path) -> PathBuf {
    if let Some(git_dir) = find_git_dir(workdir) {
        return git_dir.join("dsync").join(LOCK_FILE);
    }
    let mut hasher = DefaultHasher::new();
    workdir.hash(&mut hasher);
    std::env::temp_dir().join(format!("dsync-{:016x}.lock", hasher.finish()))
}

/// Nearest `.git` directory, following the `gitdir:` pointer of linked
/// worktrees and submodules
fn find_git_dir(workdir: &Path) -> Option<PathBuf> {
    for dir in workdir.ancestors() {
        let dot_git = dir.join(".git");
        if dot_git.is_dir() {
            return Some(dot_git);
        }
        if dot_git.is_file() {
            let content = fs::read_to_string(&dot_git).ok()?;
            let target = content
                .lines()
                .find_map(|line| line.strip_prefix("gitdir:"))?
                .trim();
            return Some(dir.join(target));
        }
    }
    None
}
