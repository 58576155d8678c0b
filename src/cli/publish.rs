//! Publish command - open a pull request for a dataset change

use crate::cli::progress::{CliProgress, run_to_completion};
use crate::cli::style::{Stream, Stylize, check, cross, hyperlink_url};
use crate::cli::{GlobalArgs, Workspace};
use anstream::{eprintln, println};
use dsync::error::{Error, Result};
use dsync::publish::{PublishRequest, PublishResult};
use dsync::worker::Background;
use std::path::PathBuf;
use std::sync::Arc;

/// Flags for `dsync publish`
pub struct PublishArgs {
    pub dataset_id: String,
    pub metadata: PathBuf,
    pub remote: Option<String>,
    pub base: Option<String>,
    pub reviewers: Vec<String>,
    pub labels: Vec<String>,
}

/// Run the publish command; returns whether a pull request exists
pub async fn run_publish(global: &GlobalArgs, args: PublishArgs) -> Result<bool> {
    let text = std::fs::read_to_string(&args.metadata)?;
    let metadata: serde_json::Value = serde_json::from_str(&text)
        .map_err(|e| Error::Parse(format!("{}: {e}", args.metadata.display())))?;
    if !metadata.is_object() {
        return Err(Error::Parse(format!(
            "{}: metadata must be a JSON object",
            args.metadata.display()
        )));
    }

    let workspace = Workspace::open(global)?;
    let mut config = workspace.settings.publish_config();
    if let Some(remote) = args.remote {
        config.remote = remote;
    }
    if let Some(base) = args.base {
        config.base_branch = base;
    }
    config.reviewers.extend(args.reviewers);
    config.labels.extend(args.labels);

    let pipeline = workspace.pipeline(config).await?;
    let outbox = Arc::new(workspace.outbox().await?);
    let request = PublishRequest {
        dataset_id: args.dataset_id,
        metadata,
    };

    let repo = pipeline.repo();
    let progress = Arc::new(CliProgress::start(&format!(
        "Publishing {} to {}/{}",
        request.dataset_id, repo.owner, repo.repo
    )));
    let op = {
        let progress = Arc::clone(&progress);
        Background::spawn(async move {
            pipeline
                .publish(request, outbox.as_ref(), progress.as_ref())
                .await
        })
    };
    let result = run_to_completion(op, &progress).await?;
    progress.finish();
    let result = result?;

    report(&result);
    Ok(result.success)
}

/// Print a publish or retry result
pub fn report(result: &PublishResult) {
    if result.success {
        println!("{} {}", check(), result.message);
        if let Some(url) = &result.pr_url {
            println!("  {}", hyperlink_url(Stream::Stdout, url));
        }
    } else if result.queued_offline {
        println!("{} {}", "queued:".warn().for_stdout(), result.message);
        println!(
            "  {}",
            format!("retry with `dsync outbox retry {}`", result.task_id).muted()
        );
    } else {
        eprintln!("{} {}", cross(), result.message.error());
    }
}
