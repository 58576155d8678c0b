//! Shared CLI progress callback with styled output and a spinner

use crate::cli::style::{Stream, Stylize, check, hyperlink_url, spinner_style};
use async_trait::async_trait;
use dsync::error::{Error, Result};
use dsync::progress::ProgressCallback;
use dsync::publish::PublishState;
use dsync::sync::SyncState;
use dsync::types::PullRequest;
use dsync::worker::Background;
use indicatif::ProgressBar;
use std::time::Duration;

/// CLI progress callback
///
/// State changes drive the spinner message; milestones are printed above it
/// so they stay in the scrollback.
pub struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    /// Start a ticking spinner
    pub fn start(message: &str) -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(spinner_style());
        spinner.set_message(message.to_string());
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }

    /// Clear the spinner before printing the final result
    pub fn finish(&self) {
        self.spinner.finish_and_clear();
    }

    /// Replace the spinner message
    pub fn set_message(&self, message: &str) {
        self.spinner.set_message(message.to_string());
    }
}

#[async_trait]
impl ProgressCallback for CliProgress {
    async fn on_sync_state(&self, state: SyncState) {
        if !matches!(state, SyncState::Idle | SyncState::Done(_)) {
            self.spinner.set_message(format!("{state}..."));
        }
    }

    async fn on_publish_state(&self, state: PublishState) {
        match state {
            PublishState::Validated => self.spinner.set_message(format!("{state}...")),
            PublishState::BranchCreated | PublishState::Committed | PublishState::Pushed => {
                self.spinner
                    .println(format!("  {} {}", check(), state.to_string().muted()));
            }
            _ => {}
        }
    }

    async fn on_content_changed(&self, files: &[String]) {
        let count = files.len();
        self.spinner.println(format!(
            "  {} file{} changed",
            count.accent(),
            if count == 1 { "" } else { "s" }
        ));
    }

    async fn on_pr_synced(&self, pr: &PullRequest, created: bool) {
        let verb = if created { "Opened" } else { "Updated" };
        self.spinner.println(format!(
            "  {} {verb} #{} {}",
            check(),
            pr.number.accent(),
            hyperlink_url(Stream::Stdout, &pr.html_url)
        ));
    }

    async fn on_message(&self, message: &str) {
        self.spinner.println(format!("  {}", message.muted()));
    }
}

/// Wait for a background operation, surviving Ctrl-C.
///
/// git commands cannot be interrupted safely, so the first Ctrl-C only
/// changes the message and keeps waiting (an auto-stash still gets restored).
/// A second Ctrl-C stops waiting and leaves the operation to finish on its own.
pub async fn run_to_completion<T: Send + 'static>(
    op: Background<T>,
    progress: &CliProgress,
) -> Result<T> {
    let waiting = op.wait();
    tokio::pin!(waiting);

    tokio::select! {
        result = &mut waiting => return result,
        () = interrupted() => {}
    }

    progress.set_message("Interrupted, waiting for git to finish (Ctrl-C again to stop waiting)");
    tokio::select! {
        result = &mut waiting => {
            result?;
            Err(Error::Internal("interrupted".to_string()))
        }
        () = interrupted() => {
            progress.finish();
            Err(Error::Internal("interrupted; the operation continues in the background".to_string()))
        }
    }
}

async fn interrupted() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}
