//! dsync - safe git sync and dataset publishing
//!
//! CLI binary for pulling a shared dataset repository and publishing dataset
//! changes as pull requests, with an outbox for publishes made offline.

use anyhow::Result;
use clap::{Parser, Subcommand};
use dsync::types::Platform;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod cli;

#[derive(Parser)]
#[command(name = "dsync")]
#[command(about = "Safe git sync and offline-tolerant dataset publishing - GitHub & GitLab")]
#[command(version)]
struct Cli {
    /// Path to the git working copy (defaults to current directory)
    #[arg(short, long, global = true)]
    path: Option<PathBuf>,

    /// Settings file (defaults to <config dir>/dsync/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Outbox directory (defaults to .git/dsync/outbox)
    #[arg(long, global = true)]
    outbox_dir: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pull the remote branch into the current branch
    Sync {
        /// Git remote to pull from
        #[arg(long)]
        remote: Option<String>,

        /// Remote branch to pull (defaults to the current branch)
        #[arg(long)]
        branch: Option<String>,

        /// Stash uncommitted changes around the sync
        #[arg(long)]
        auto_stash: bool,

        /// Create a merge commit when local and remote have diverged
        #[arg(long)]
        allow_merge: bool,
    },

    /// Publish a dataset's metadata as a pull request
    Publish {
        /// Dataset identifier
        dataset_id: String,

        /// JSON file with the validated metadata
        #[arg(long)]
        metadata: PathBuf,

        /// Git remote of the upstream repository
        #[arg(long)]
        remote: Option<String>,

        /// Branch the pull request targets
        #[arg(long)]
        base: Option<String>,

        /// Request a review (repeatable)
        #[arg(long = "reviewer")]
        reviewers: Vec<String>,

        /// Add a label (repeatable)
        #[arg(long = "label")]
        labels: Vec<String>,
    },

    /// Publishes waiting for retry
    Outbox {
        #[command(subcommand)]
        action: OutboxAction,
    },

    /// Authentication management
    Auth {
        #[command(subcommand)]
        platform: AuthPlatform,
    },
}

#[derive(Subcommand)]
enum OutboxAction {
    /// List queued publishes
    List {
        /// Only show tasks waiting for retry
        #[arg(long)]
        pending: bool,
    },
    /// Retry one task, or every pending task
    Retry {
        /// Task to retry (all pending tasks when omitted)
        task_id: Option<String>,
    },
    /// Drop a task without publishing it
    Discard {
        /// Task to discard
        task_id: String,

        /// Skip confirmation
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum AuthPlatform {
    /// GitHub authentication
    Github {
        #[command(subcommand)]
        action: AuthCommand,
    },
    /// GitLab authentication
    Gitlab {
        #[command(subcommand)]
        action: AuthCommand,
    },
}

#[derive(Subcommand, Clone, Copy)]
enum AuthCommand {
    /// Test authentication
    Test,
    /// Show authentication setup instructions
    Setup,
}

impl From<AuthCommand> for cli::AuthAction {
    fn from(command: AuthCommand) -> Self {
        match command {
            AuthCommand::Test => Self::Test,
            AuthCommand::Setup => Self::Setup,
        }
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "dsync=warn",
        1 => "dsync=debug",
        _ => "dsync=trace",
    };
    let filter = EnvFilter::try_from_env("DSYNC_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let global = cli::GlobalArgs {
        path: cli.path.unwrap_or_else(|| PathBuf::from(".")),
        config: cli.config,
        outbox_dir: cli.outbox_dir,
    };

    let succeeded = match cli.command {
        Commands::Sync {
            remote,
            branch,
            auto_stash,
            allow_merge,
        } => {
            cli::run_sync(
                &global,
                cli::SyncArgs {
                    remote,
                    branch,
                    auto_stash,
                    allow_merge,
                },
            )
            .await?
        }
        Commands::Publish {
            dataset_id,
            metadata,
            remote,
            base,
            reviewers,
            labels,
        } => {
            cli::run_publish(
                &global,
                cli::PublishArgs {
                    dataset_id,
                    metadata,
                    remote,
                    base,
                    reviewers,
                    labels,
                },
            )
            .await?
        }
        Commands::Outbox { action } => match action {
            OutboxAction::List { pending } => {
                cli::run_outbox_list(&global, pending).await?;
                true
            }
            OutboxAction::Retry { task_id } => cli::run_outbox_retry(&global, task_id).await?,
            OutboxAction::Discard { task_id, yes } => {
                cli::run_outbox_discard(&global, &task_id, yes).await?;
                true
            }
        },
        Commands::Auth { platform } => {
            let (platform, action) = match platform {
                AuthPlatform::Github { action } => (Platform::GitHub, action),
                AuthPlatform::Gitlab { action } => (Platform::GitLab, action),
            };
            cli::run_auth(platform, action.into()).await?;
            true
        }
    };

    Ok(if succeeded {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
