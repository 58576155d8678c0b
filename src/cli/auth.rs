//! Auth command - test and explain authentication

use crate::cli::style::{Stylize, check};
use anstream::println;
use dsync::auth::{AuthSource, resolve_token, whoami};
use dsync::error::Result;
use dsync::types::Platform;

/// What `dsync auth <platform>` should do
#[derive(Debug, Clone, Copy)]
pub enum AuthAction {
    /// Resolve a token and check it against the API
    Test,
    /// Print setup instructions
    Setup,
}

/// Run the auth test command
pub async fn run_auth_test(platform: Platform) -> Result<()> {
    println!("Testing {platform:?} authentication...");
    let token = resolve_token(platform, None).await?;
    let username = whoami(platform, &token).await?;
    println!("{} Authenticated as {}", check(), username.accent());
    let source = match token.source {
        AuthSource::Cli => "CLI",
        AuthSource::EnvVar => "environment variable",
    };
    println!("  Token source: {}", source.muted());
    println!("  Host: {}", token.host.muted());
    Ok(())
}

/// Run the auth setup command (show instructions)
pub fn run_auth_setup(platform: Platform) {
    match platform {
        Platform::GitHub => {
            println!("{}", "GitHub Authentication Setup".emphasis());
            println!();
            println!("Option 1: GitHub CLI (recommended)");
            println!("  Install: https://cli.github.com/");
            println!("  Run: gh auth login");
            println!();
            println!("Option 2: Environment variable");
            println!("  Set GITHUB_TOKEN or GH_TOKEN");
            println!();
            println!("For GitHub Enterprise:");
            println!("  Set GH_HOST to your instance hostname");
            println!();
            println!("Without push access to the repository, dsync publishes through");
            println!("a fork, so the token needs permission to create forks.");
        }
        Platform::GitLab => {
            println!("{}", "GitLab Authentication Setup".emphasis());
            println!();
            println!("Option 1: GitLab CLI (glab)");
            println!("  Install: https://gitlab.com/gitlab-org/cli");
            println!("  Run: glab auth login");
            println!();
            println!("Option 2: Environment variable");
            println!("  Set GITLAB_TOKEN or GL_TOKEN (scope: api)");
            println!();
            println!("For self-hosted GitLab:");
            println!("  Set GITLAB_HOST to your instance hostname");
        }
    }
}

/// Dispatch an auth action
pub async fn run_auth(platform: Platform, action: AuthAction) -> Result<()> {
    match action {
        AuthAction::Test => run_auth_test(platform).await,
        AuthAction::Setup => {
            run_auth_setup(platform);
            Ok(())
        }
    }
}
