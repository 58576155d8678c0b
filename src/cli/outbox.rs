//! Outbox commands - inspect, retry and discard queued publishes

use crate::cli::progress::{CliProgress, run_to_completion};
use crate::cli::publish::report;
use crate::cli::style::{Stylize, check, task_marker};
use crate::cli::{GlobalArgs, Workspace};
use anstream::println;
use dialoguer::Confirm;
use dsync::error::{Error, Result};
use dsync::git::GitGateway;
use dsync::publish::PublishTask;
use dsync::worker::Background;
use std::sync::Arc;

/// Run `dsync outbox list`
pub async fn run_outbox_list(global: &GlobalArgs, pending_only: bool) -> Result<()> {
    let workspace = Workspace::open(global)?;
    let outbox = workspace.outbox().await?;
    let tasks = if pending_only {
        outbox.list_pending()?
    } else {
        outbox.list()?
    };

    if tasks.is_empty() {
        println!("{}", "Outbox is empty".muted());
        return Ok(());
    }

    for task in &tasks {
        print_task(task);
    }
    Ok(())
}

fn print_task(task: &PublishTask) {
    let (marker, status) = task_marker(task.status);
    println!(
        "{marker} {} {} {}",
        task.task_id.accent(),
        task.dataset_id.emphasis(),
        format!(
            "({status}, {} attempt{}, queued {})",
            task.attempt_count,
            if task.attempt_count == 1 { "" } else { "s" },
            task.created_at.format("%Y-%m-%d %H:%M")
        )
        .muted()
    );
    println!("    {}", task.branch_name.muted());
    if let Some(url) = &task.pr_url {
        println!("    {url}");
    } else if let Some(err) = &task.last_error {
        println!("    {}", err.warn().for_stdout());
    }
}

/// Run `dsync outbox retry`; returns whether every retried task succeeded
pub async fn run_outbox_retry(global: &GlobalArgs, task_id: Option<String>) -> Result<bool> {
    let workspace = Workspace::open(global)?;
    let outbox = Arc::new(workspace.outbox().await?);

    let ids = match task_id {
        Some(id) => vec![id],
        None => outbox
            .list_pending()?
            .into_iter()
            .map(|task| task.task_id)
            .collect(),
    };
    if ids.is_empty() {
        println!("{}", "Nothing to retry".muted());
        return Ok(true);
    }

    let pipeline = workspace
        .pipeline(workspace.settings.publish_config())
        .await?;
    let mut all_succeeded = true;
    for id in ids {
        let progress = Arc::new(CliProgress::start(&format!("Retrying {id}")));
        let op = {
            let (outbox, pipeline, progress) =
                (Arc::clone(&outbox), pipeline.clone(), Arc::clone(&progress));
            Background::spawn(async move { outbox.retry(&id, &pipeline, progress.as_ref()).await })
        };
        let result = run_to_completion(op, &progress).await?;
        progress.finish();
        let result = result?;

        report(&result);
        all_succeeded &= result.success;
        // Still offline: later tasks would fail the same way
        if result.queued_offline {
            break;
        }
    }
    Ok(all_succeeded)
}

/// Run `dsync outbox discard`
pub async fn run_outbox_discard(global: &GlobalArgs, task_id: &str, yes: bool) -> Result<()> {
    let workspace = Workspace::open(global)?;
    let outbox = workspace.outbox().await?;
    let task = outbox.get(task_id)?;

    if !yes {
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Discard publish of {} ({})?",
                task.dataset_id, task.branch_name
            ))
            .default(false)
            .interact()
            .map_err(|e| Error::Internal(format!("prompt failed: {e}")))?;
        if !confirmed {
            println!("{}", "Kept".muted());
            return Ok(());
        }
    }

    outbox.discard(task_id, &workspace.locks, workspace.git.workdir())?;
    println!("{} Discarded {}", check(), task.task_id.accent());
    Ok(())
}
