//! CLI commands
//!
//! Command implementations for the `dsync` binary.

mod auth;
mod outbox;
mod progress;
mod publish;
mod style;
mod sync;

pub use auth::{AuthAction, run_auth};
pub use outbox::{run_outbox_discard, run_outbox_list, run_outbox_retry};
pub use publish::{PublishArgs, run_publish};
pub use sync::{SyncArgs, run_sync};

use dsync::config::Settings;
use dsync::connectivity::TcpProbe;
use dsync::error::Result;
use dsync::git::{GitCli, GitGateway};
use dsync::lock::RepoLocks;
use dsync::outbox::Outbox;
use dsync::platform::{create_platform_service, parse_repo_info};
use dsync::publish::PublishPipeline;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Options shared by every command that touches a working copy
pub struct GlobalArgs {
    /// Working copy
    pub path: PathBuf,
    /// Settings file override
    pub config: Option<PathBuf>,
    /// Outbox directory override
    pub outbox_dir: Option<PathBuf>,
}

/// Everything a command needs to operate on one working copy
pub(crate) struct Workspace {
    pub git: Arc<GitCli>,
    pub connectivity: Arc<TcpProbe>,
    pub locks: RepoLocks,
    pub settings: Settings,
    outbox_dir: Option<PathBuf>,
}

impl Workspace {
    pub fn open(args: &GlobalArgs) -> Result<Self> {
        let settings = match args.config.clone().or_else(Settings::default_path) {
            Some(path) => Settings::load(&path)?,
            None => Settings::default(),
        };
        Ok(Self {
            git: Arc::new(GitCli::new(&args.path)),
            connectivity: Arc::new(TcpProbe::default()),
            locks: RepoLocks::new(),
            settings,
            outbox_dir: args.outbox_dir.clone(),
        })
    }

    pub async fn outbox(&self) -> Result<Outbox> {
        open_outbox(self.outbox_dir.as_deref(), self.git.as_ref()).await
    }

    /// Publish pipeline for `remote`, resolving platform and credentials
    pub async fn pipeline(&self, config: dsync::config::PublishConfig) -> Result<PublishPipeline> {
        let url = self.git.remote_url(&config.remote).await?;
        let platform_config = parse_repo_info(&url)?;
        debug!(
            "{:?} repository {}/{} on {}",
            platform_config.platform,
            platform_config.owner,
            platform_config.repo,
            platform_config.hostname()
        );
        let platform = create_platform_service(&platform_config).await?;
        Ok(PublishPipeline::new(
            self.git.clone(),
            platform,
            self.connectivity.clone(),
            self.locks.clone(),
            config,
        ))
    }
}

/// Open the outbox at `dir`, or inside the repository's git directory
pub(crate) async fn open_outbox(dir: Option<&Path>, git: &dyn GitGateway) -> Result<Outbox> {
    match dir {
        Some(dir) => Outbox::open(dir),
        None => Outbox::open(Outbox::default_dir(&git.absolute_git_dir().await?)),
    }
}
