//! Durable retry queue for publish tasks
//!
//! One JSON file per task under the outbox directory, replaced atomically
//! (write to a temporary file in the same directory, fsync, rename), so a
//! crash mid-write leaves either the old record or the new one.

use crate::error::{Error, Result};
use crate::lock::RepoLocks;
use crate::progress::ProgressCallback;
use crate::publish::{PublishPipeline, PublishResult, PublishTask, TaskStatus};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};
use uuid::Uuid;

const RECORD_EXTENSION: &str = "json";

/// Directory-backed outbox
#[derive(Debug)]
pub struct Outbox {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl Outbox {
    /// Open (creating if needed) an outbox at `dir`
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    /// Outbox location inside a repository's git directory
    pub fn default_dir(git_dir: &Path) -> PathBuf {
        git_dir.join("dsync").join("outbox")
    }

    /// Directory holding the records
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, task_id: &str) -> Result<PathBuf> {
        // Ids come from the command line; only well-formed ones map to files
        Uuid::parse_str(task_id).map_err(|_| Error::TaskNotFound(task_id.to_string()))?;
        Ok(self.dir.join(format!("{task_id}.{RECORD_EXTENSION}")))
    }

    /// Store a task that could not complete, as `pending`
    pub fn enqueue(&self, task: &PublishTask) -> Result<()> {
        let mut task = task.clone();
        task.status = TaskStatus::Pending;
        self.save(&task)?;
        info!(task = %task.task_id, "queued publish of {} for retry", task.dataset_id);
        Ok(())
    }

    /// Replace the record for `task`
    pub(crate) fn save(&self, task: &PublishTask) -> Result<()> {
        let path = self.record_path(&task.task_id)?;
        let content = serde_json::to_vec_pretty(task)?;

        let _write = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut temp = NamedTempFile::new_in(&self.dir)?;
        temp.write_all(&content)?;
        temp.as_file().sync_all()?;
        temp.persist(&path).map_err(|e| Error::Io(e.error))?;
        debug!("wrote {}", path.display());
        Ok(())
    }

    /// Load one task
    pub fn get(&self, task_id: &str) -> Result<PublishTask> {
        let path = self.record_path(task_id)?;
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::TaskNotFound(task_id.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&text)?)
    }

    /// All tasks, oldest first. Unreadable records are skipped.
    pub fn list(&self) -> Result<Vec<PublishTask>> {
        let mut tasks = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXTENSION) {
                continue;
            }
            let parsed = fs::read_to_string(&path)
                .map_err(Error::from)
                .and_then(|text| serde_json::from_str::<PublishTask>(&text).map_err(Error::from));
            match parsed {
                Ok(task) => tasks.push(task),
                Err(e) => warn!("skipping unreadable outbox record {}: {e}", path.display()),
            }
        }
        tasks.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.task_id.cmp(&b.task_id))
        });
        Ok(tasks)
    }

    /// Pending tasks, oldest first
    pub fn list_pending(&self) -> Result<Vec<PublishTask>> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|t| t.status == TaskStatus::Pending)
            .collect())
    }

    /// Remove a task without retrying it. Remote branches pushed by earlier
    /// attempts are left alone.
    ///
    /// Takes the working-copy lock for `workdir`, so a task cannot vanish
    /// under a retry that is still running; that case fails with
    /// [`Error::Busy`].
    pub fn discard(
        &self,
        task_id: &str,
        locks: &RepoLocks,
        workdir: &Path,
    ) -> Result<PublishTask> {
        let path = self.record_path(task_id)?;
        let _guard = locks.try_acquire(workdir)?;
        let task = self.get(task_id)?;
        let _write = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        fs::remove_file(&path)?;
        info!(task = %task_id, "discarded publish of {}", task.dataset_id);
        Ok(task)
    }

    /// Replay a stored task through `pipeline`.
    ///
    /// Retrying a task that already succeeded returns its pull request
    /// without touching git or the platform.
    pub async fn retry(
        &self,
        task_id: &str,
        pipeline: &PublishPipeline,
        progress: &dyn ProgressCallback,
    ) -> Result<PublishResult> {
        let Ok(_guard) = pipeline.try_lock() else {
            return Ok(PublishResult::busy(task_id));
        };

        let mut task = self.get(task_id)?;
        if task.status == TaskStatus::Succeeded {
            debug!(task = %task_id, "already published");
            return Ok(PublishResult::already_published(&task));
        }

        task.attempt_count += 1;
        task.set_status(TaskStatus::InFlight);
        self.save(&task)?;
        info!(
            task = %task_id,
            attempt = task.attempt_count,
            "retrying publish of {} on {}",
            task.dataset_id,
            task.branch_name
        );

        let attempt = pipeline.attempt(&task, progress).await;
        attempt.record(&mut task);
        self.save(&task)?;

        let result = attempt.result(&task);
        progress.on_publish_state(result.state).await;
        Ok(result)
    }
}
