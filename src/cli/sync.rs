//! Sync command - pull the remote branch into the current branch

use crate::cli::progress::{CliProgress, run_to_completion};
use crate::cli::style::{Stylize, arrow, check, cross, short_commit};
use crate::cli::{GlobalArgs, Workspace};
use anstream::{eprintln, println};
use dsync::error::Result;
use dsync::sync::SyncEngine;
use dsync::types::{SyncOutcome, SyncResult};
use dsync::worker::Background;
use std::sync::Arc;

/// Flags for `dsync sync`
pub struct SyncArgs {
    pub remote: Option<String>,
    pub branch: Option<String>,
    pub auto_stash: bool,
    pub allow_merge: bool,
}

/// Run the sync command; returns whether the sync succeeded
pub async fn run_sync(global: &GlobalArgs, args: SyncArgs) -> Result<bool> {
    let workspace = Workspace::open(global)?;

    let mut config = workspace.settings.sync_config();
    if let Some(remote) = args.remote {
        config.remote = remote;
    }
    config.branch = args.branch;
    config.auto_stash |= args.auto_stash;
    config.allow_merge |= args.allow_merge;

    let engine = SyncEngine::new(
        workspace.git.clone(),
        workspace.connectivity.clone(),
        workspace.locks.clone(),
    );
    let progress = Arc::new(CliProgress::start(&format!("Syncing from {}", config.remote)));

    let op = {
        let progress = Arc::clone(&progress);
        Background::spawn(async move { engine.sync(&config, progress.as_ref()).await })
    };

    let result = run_to_completion(op, &progress).await?;
    progress.finish();

    report(&result);
    Ok(result.success)
}

fn report(result: &SyncResult) {
    match result.outcome {
        SyncOutcome::Success => {
            println!(
                "{} {} ({} {} {})",
                check(),
                result.message.success(),
                short_commit(&result.previous_commit).muted(),
                arrow(),
                short_commit(&result.new_commit).accent()
            );
        }
        SyncOutcome::NoOp => println!("{} {}", check(), result.message.muted()),
        SyncOutcome::Aborted(_) => {
            eprintln!("{} {}", "aborted:".warn(), result.message);
        }
        SyncOutcome::Failed(_) => {
            eprintln!("{} {}", cross(), result.message.error());
        }
    }
}
