//! Platform service factory
//!
//! Creates platform services based on configuration.

use crate::auth::resolve_token;
use crate::error::Result;
use crate::platform::{GitHubService, GitLabService, PlatformService};
use crate::types::{Platform, PlatformConfig};
use std::sync::Arc;

/// Create a platform service from configuration
///
/// Resolves a token for the platform's host and builds the client.
pub async fn create_platform_service(config: &PlatformConfig) -> Result<Arc<dyn PlatformService>> {
    let token = resolve_token(config.platform, config.host.as_deref()).await?;
    match config.platform {
        Platform::GitHub => Ok(Arc::new(GitHubService::new(
            &token.token,
            config.owner.clone(),
            config.repo.clone(),
            config.host.clone(),
        )?)),
        Platform::GitLab => Ok(Arc::new(GitLabService::new(
            token.token,
            config.owner.clone(),
            config.repo.clone(),
            Some(token.host),
        ))),
    }
}
