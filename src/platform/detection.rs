//! Platform detection from remote URLs

use crate::connectivity::split_scp_like;
use crate::error::{Error, Result};
use crate::types::{Platform, PlatformConfig};
use regex::Regex;
use std::env;
use std::sync::LazyLock;

/// scp-like: `[git@]host:owner/repo.git`
static SCP_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[^@/]+@)?[^:/]+:(.+?)(?:\.git)?/?$").expect("valid regex")
});

/// Detect platform (GitHub or GitLab) from a remote URL
pub fn detect_platform(url: &str) -> Option<Platform> {
    let hostname = extract_hostname(url)?;
    let is_host = |public: &str, var: &str| {
        hostname == public
            || hostname.ends_with(&format!(".{public}"))
            || env::var(var).is_ok_and(|h| hostname == h)
    };

    if is_host("github.com", "GH_HOST") {
        Some(Platform::GitHub)
    } else if is_host("gitlab.com", "GITLAB_HOST") {
        Some(Platform::GitLab)
    } else {
        None
    }
}

/// Parse repository info (owner/repo) from a remote URL
pub fn parse_repo_info(url: &str) -> Result<PlatformConfig> {
    let platform = detect_platform(url).ok_or(Error::NoSupportedRemotes)?;
    let hostname = extract_hostname(url);

    let path = repo_path(url).ok_or_else(|| Error::Parse(format!("cannot parse remote URL: {url}")))?;

    // GitLab supports nested groups: everything but the last segment is owner
    let (owner, repo) = path
        .rsplit_once('/')
        .filter(|(owner, repo)| !owner.is_empty() && !repo.is_empty())
        .ok_or_else(|| Error::Parse(format!("invalid repo path: {path}")))?;

    let public = match platform {
        Platform::GitHub => "github.com",
        Platform::GitLab => "gitlab.com",
    };
    let host = hostname.filter(|h| h != public);

    Ok(PlatformConfig {
        platform,
        owner: owner.to_string(),
        repo: repo.to_string(),
        host,
    })
}

fn repo_path(url: &str) -> Option<String> {
    if split_scp_like(url).is_some() {
        let caps = SCP_PATH.captures(url)?;
        return caps.get(1).map(|m| m.as_str().to_string());
    }
    let parsed = url::Url::parse(url).ok()?;
    let path = parsed.path().trim_matches('/');
    let path = path.strip_suffix(".git").unwrap_or(path);
    (!path.is_empty()).then(|| path.to_string())
}

/// Hostname of a remote URL in scp-like or URL syntax
pub(crate) fn extract_hostname(url: &str) -> Option<String> {
    if !url.contains("://") {
        return split_scp_like(url).map(|(host, _)| host.to_string());
    }

    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(ToString::to_string))
}
