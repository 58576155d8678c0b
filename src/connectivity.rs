//! Remote reachability checks

use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::debug;

/// Default connect timeout for [`TcpProbe`]
const DEFAULT_TIMEOUT_SECS: u64 = 5;

/// Answers whether a remote can currently be reached
#[async_trait]
pub trait Connectivity: Send + Sync {
    /// Check reachability of a git remote URL
    async fn is_reachable(&self, remote_url: &str) -> bool;
}

/// Probe that opens a TCP connection to the remote's host
#[derive(Debug, Clone)]
pub struct TcpProbe {
    timeout: Duration,
}

impl Default for TcpProbe {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl TcpProbe {
    /// Create a probe with a custom connect timeout
    pub const fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }
}

/// Where a remote URL points
#[derive(Debug, PartialEq, Eq)]
enum Endpoint {
    Tcp(String, u16),
    /// ssh host alias from the user's ssh config; only ssh can resolve it
    SshAlias(String),
    Local(String),
}

/// Split an scp-like remote (`[user@]host:path`) into host and path.
///
/// Same rule git applies: the colon comes before any slash, and a single
/// letter before it is a Windows drive, not a host.
pub(crate) fn split_scp_like(remote_url: &str) -> Option<(&str, &str)> {
    if remote_url.contains("://") {
        return None;
    }
    let (user_host, path) = remote_url.split_once(':')?;
    if user_host.contains(['/', '\\']) {
        return None;
    }
    let is_drive = user_host.len() == 1 && user_host.bytes().all(|b| b.is_ascii_alphabetic());
    if is_drive {
        return None;
    }
    let host = user_host.rsplit_once('@').map_or(user_host, |(_, host)| host);
    (!host.is_empty()).then_some((host, path))
}

fn endpoint(remote_url: &str) -> Option<Endpoint> {
    if !remote_url.contains("://") {
        return Some(match split_scp_like(remote_url) {
            Some((host, _)) if host.contains('.') || host == "localhost" => {
                Endpoint::Tcp(host.to_string(), 22)
            }
            Some((host, _)) => Endpoint::SshAlias(host.to_string()),
            None => Endpoint::Local(remote_url.to_string()),
        });
    }

    let url = url::Url::parse(remote_url).ok()?;
    if url.scheme() == "file" {
        return Some(Endpoint::Local(url.path().to_string()));
    }
    let port = url.port().or_else(|| match url.scheme() {
        "ssh" | "git+ssh" => Some(22),
        "git" => Some(9418),
        _ => url.port_or_known_default(),
    })?;
    Some(Endpoint::Tcp(url.host_str()?.to_string(), port))
}

#[async_trait]
impl Connectivity for TcpProbe {
    async fn is_reachable(&self, remote_url: &str) -> bool {
        match endpoint(remote_url) {
            Some(Endpoint::Local(path)) => Path::new(&path).exists(),
            Some(Endpoint::SshAlias(alias)) => {
                debug!("not probing ssh alias {alias}; git will report failures");
                true
            }
            Some(Endpoint::Tcp(host, port)) => {
                let attempt =
                    tokio::time::timeout(self.timeout, TcpStream::connect((host.as_str(), port)))
                        .await;
                let reachable = matches!(attempt, Ok(Ok(_)));
                debug!("probe {host}:{port} reachable={reachable}");
                reachable
            }
            None => false,
        }
    }
}
