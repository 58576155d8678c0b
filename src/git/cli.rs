//! `git` subprocess gateway

use crate::error::{Error, GitOperationError, Result};
use crate::git::GitGateway;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Output;
use tokio::process::Command;
use tracing::debug;

/// Gateway that shells out to the `git` executable
#[derive(Debug, Clone)]
pub struct GitCli {
    workdir: PathBuf,
}

impl GitCli {
    /// Create a gateway for the working copy at `workdir`
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    /// Run git and return the raw output regardless of exit status
    async fn output(&self, args: &[&str]) -> Result<Output> {
        debug!(workdir = %self.workdir.display(), "git {}", args.join(" "));
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.workdir)
            .env("GIT_TERMINAL_PROMPT", "0")
            .env("LC_ALL", "C")
            .kill_on_drop(false)
            .output()
            .await?;
        Ok(output)
    }

    /// Run git, mapping a non-zero exit to [`GitOperationError`]
    async fn run(&self, args: &[&str]) -> Result<String> {
        let output = self.output(args).await?;
        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            let mut stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            // merge reports conflicts on stdout
            if stderr.trim().is_empty() {
                stderr = String::from_utf8_lossy(&output.stdout).into_owned();
            }
            let err = GitOperationError {
                command: args.join(" "),
                exit_code: output.status.code().unwrap_or(-1),
                stderr,
            };
            debug!("{err}");
            Err(err.into())
        }
    }
}

#[async_trait]
impl GitGateway for GitCli {
    fn workdir(&self) -> &Path {
        &self.workdir
    }

    async fn rev_parse(&self, rev: &str) -> Result<String> {
        Ok(self.run(&["rev-parse", "--verify", rev]).await?.trim().to_string())
    }

    async fn abbrev_head(&self) -> Result<String> {
        Ok(self
            .run(&["rev-parse", "--abbrev-ref", "HEAD"])
            .await?
            .trim()
            .to_string())
    }

    async fn ref_exists(&self, reference: &str) -> Result<bool> {
        let output = self
            .output(&["rev-parse", "--verify", "--quiet", reference])
            .await?;
        Ok(output.status.success())
    }

    async fn absolute_git_dir(&self) -> Result<PathBuf> {
        let out = self.run(&["rev-parse", "--absolute-git-dir"]).await?;
        Ok(PathBuf::from(out.trim()))
    }

    async fn status_porcelain(&self) -> Result<String> {
        self.run(&["status", "--porcelain"]).await
    }

    async fn rev_list_count(&self, from: &str, to: &str) -> Result<u32> {
        let range = format!("{from}..{to}");
        let out = self.run(&["rev-list", "--count", &range]).await?;
        out.trim()
            .parse()
            .map_err(|e| Error::Parse(format!("rev-list --count {range}: {e}")))
    }

    async fn diff_names(&self, from: &str, to: &str) -> Result<Vec<String>> {
        let out = self.run(&["diff", "--name-only", from, to]).await?;
        Ok(out
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(ToString::to_string)
            .collect())
    }

    async fn remote_url(&self, remote: &str) -> Result<String> {
        Ok(self
            .run(&["remote", "get-url", remote])
            .await?
            .trim()
            .to_string())
    }

    async fn fetch(&self, remote: &str, branch: &str) -> Result<()> {
        self.run(&["fetch", remote, branch]).await.map(drop)
    }

    async fn merge_ff_only(&self, target: &str) -> Result<()> {
        self.run(&["merge", "--ff-only", target]).await.map(drop)
    }

    async fn merge(&self, target: &str, message: &str) -> Result<()> {
        self.run(&["merge", "--no-ff", "--no-edit", "-m", message, target])
            .await
            .map(drop)
    }

    async fn merge_abort(&self) -> Result<()> {
        self.run(&["merge", "--abort"]).await.map(drop)
    }

    async fn stash_push(&self, message: &str) -> Result<()> {
        self.run(&["stash", "push", "--include-untracked", "-m", message])
            .await
            .map(drop)
    }

    async fn stash_pop(&self) -> Result<()> {
        self.run(&["stash", "pop"]).await.map(drop)
    }

    async fn branch_delete(&self, name: &str) -> Result<()> {
        self.run(&["branch", "-D", name]).await.map(drop)
    }

    async fn checkout_new_branch(&self, name: &str, start: &str) -> Result<()> {
        self.run(&["checkout", "-b", name, start]).await.map(drop)
    }

    async fn checkout(&self, name: &str) -> Result<()> {
        self.run(&["checkout", name]).await.map(drop)
    }

    async fn add(&self, paths: &[&str]) -> Result<()> {
        let mut args = vec!["add", "--"];
        args.extend_from_slice(paths);
        self.run(&args).await.map(drop)
    }

    async fn commit(&self, message: &str) -> Result<()> {
        self.run(&["commit", "-m", message]).await.map(drop)
    }

    async fn reset_hard(&self, rev: &str) -> Result<()> {
        self.run(&["reset", "--hard", rev]).await.map(drop)
    }

    async fn push(&self, target: &str, branch: &str, force: bool) -> Result<()> {
        let refspec = format!("{branch}:{branch}");
        let mut args = vec!["push"];
        if force {
            args.push("--force");
        }
        args.extend([target, refspec.as_str()]);
        self.run(&args).await.map(drop)
    }
}
