//! Background execution with cooperative cancellation
//!
//! Git porcelain commands have no safe mid-operation abort. Cancelling a
//! [`Background`] therefore only stops the caller from waiting: the operation
//! runs to completion on its tokio task (restoring stashes, releasing the
//! repository lock) and its result is dropped.

use crate::error::{Error, Result};
use std::future::Future;
use tokio::task::JoinHandle;
use tracing::debug;

/// An operation running on a tokio task
#[derive(Debug)]
pub struct Background<T> {
    handle: JoinHandle<T>,
}

impl<T: Send + 'static> Background<T> {
    /// Start `operation` on the runtime
    pub fn spawn<F>(operation: F) -> Self
    where
        F: Future<Output = T> + Send + 'static,
    {
        Self {
            handle: tokio::spawn(operation),
        }
    }

    /// Whether the operation has completed
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the result
    pub async fn wait(self) -> Result<T> {
        self.handle
            .await
            .map_err(|e| Error::Internal(format!("background operation failed: {e}")))
    }

    /// Stop waiting. The operation keeps running and its result is discarded.
    pub fn cancel(self) {
        debug!("caller cancelled; operation continues in the background");
        // Dropping a JoinHandle detaches the task without aborting it
        drop(self.handle);
    }
}
