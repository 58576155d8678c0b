//! Authentication for GitHub and GitLab
//!
//! Tokens come from the platform CLI (`gh`, `glab`) when it is installed and
//! logged in, otherwise from environment variables.

use crate::error::{Error, Result};
use crate::types::Platform;
use serde::Deserialize;
use std::env;
use tokio::process::Command;
use tracing::debug;

/// Source of authentication token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthSource {
    /// Token from CLI tool (gh or glab)
    Cli,
    /// Token from environment variable
    EnvVar,
}

/// A resolved API token
#[derive(Debug, Clone)]
pub struct AuthToken {
    /// Token value
    pub token: String,
    /// Where the token was obtained from
    pub source: AuthSource,
    /// Host the token is for
    pub host: String,
}

struct PlatformAuth {
    cli: &'static str,
    env_vars: [&'static str; 2],
    host_var: &'static str,
    public_host: &'static str,
    login_hint: &'static str,
}

const fn platform_auth(platform: Platform) -> PlatformAuth {
    match platform {
        Platform::GitHub => PlatformAuth {
            cli: "gh",
            env_vars: ["GITHUB_TOKEN", "GH_TOKEN"],
            host_var: "GH_HOST",
            public_host: "github.com",
            login_hint: "Run `gh auth login` or set GITHUB_TOKEN",
        },
        Platform::GitLab => PlatformAuth {
            cli: "glab",
            env_vars: ["GITLAB_TOKEN", "GL_TOKEN"],
            host_var: "GITLAB_HOST",
            public_host: "gitlab.com",
            login_hint: "Run `glab auth login` or set GITLAB_TOKEN",
        },
    }
}

/// Resolve a token for `platform` on `host` (public instance when `None`)
pub async fn resolve_token(platform: Platform, host: Option<&str>) -> Result<AuthToken> {
    let auth = platform_auth(platform);
    let host = host
        .map(String::from)
        .or_else(|| env::var(auth.host_var).ok())
        .unwrap_or_else(|| auth.public_host.to_string());

    if let Some(token) = cli_token(auth.cli, &host).await {
        debug!("using {} token for {host}", auth.cli);
        return Ok(AuthToken {
            token,
            source: AuthSource::Cli,
            host,
        });
    }

    for var in auth.env_vars {
        if let Ok(token) = env::var(var) {
            if !token.trim().is_empty() {
                debug!("using ${var} for {host}");
                return Ok(AuthToken {
                    token,
                    source: AuthSource::EnvVar,
                    host,
                });
            }
        }
    }

    Err(Error::Auth(format!(
        "no {platform:?} authentication found. {}",
        auth.login_hint
    )))
}

async fn cli_token(program: &str, host: &str) -> Option<String> {
    let output = Command::new(program)
        .args(["auth", "token", "--hostname", host])
        .output()
        .await
        .ok()?;

    if !output.status.success() {
        return None;
    }

    let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if token.is_empty() { None } else { Some(token) }
}

#[derive(Deserialize)]
struct GitLabUser {
    username: String,
}

/// Check a token against the platform and return the account name
pub async fn whoami(platform: Platform, token: &AuthToken) -> Result<String> {
    match platform {
        Platform::GitHub => {
            let mut builder = octocrab::Octocrab::builder().personal_token(token.token.clone());
            if token.host != "github.com" {
                builder = builder
                    .base_uri(format!("https://{}/api/v3", token.host))
                    .map_err(|e| Error::GitHubApi(e.to_string()))?;
            }
            let octocrab = builder
                .build()
                .map_err(|e| Error::GitHubApi(e.to_string()))?;
            let user = octocrab
                .current()
                .user()
                .await
                .map_err(|e| Error::Auth(format!("Invalid token: {e}")))?;
            Ok(user.login)
        }
        Platform::GitLab => {
            let url = format!("https://{}/api/v4/user", token.host);
            let user: GitLabUser = reqwest::Client::new()
                .get(&url)
                .header("PRIVATE-TOKEN", &token.token)
                .send()
                .await?
                .error_for_status()
                .map_err(|e| Error::Auth(format!("Invalid token: {e}")))?
                .json()
                .await?;
            Ok(user.username)
        }
    }
}
