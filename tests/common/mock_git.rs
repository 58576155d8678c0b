//! In-memory git for engine tests
//!
//! [`FakeRemote`] is the shared server side: branches and every commit ever
//! made. Each [`FakeGit`] is one working copy cloned from it, with its own
//! local branches, tracking refs, dirty flag and stash.

#![allow(dead_code)]

use async_trait::async_trait;
use dsync::error::{GitOperationError, Result};
use dsync::git::GitGateway;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub const REMOTE_URL: &str = "https://github.com/test/datasets.git";

const OFFLINE_STDERR: &str = "fatal: unable to access 'https://github.com/test/datasets.git/': Could not resolve host: github.com";
const AUTH_STDERR: &str =
    "remote: Invalid username or password.\nfatal: Authentication failed for 'https://github.com/test/datasets.git/'";

#[derive(Debug, Clone)]
struct Commit {
    parents: Vec<String>,
    files: BTreeMap<String, String>,
    message: String,
}

#[derive(Debug, Default)]
struct Server {
    commits: BTreeMap<String, Commit>,
    /// Branches per push target ("origin" or a fork URL)
    branches: BTreeMap<String, BTreeMap<String, String>>,
    next_id: u64,
    offline: bool,
    reject_auth: bool,
}

impl Server {
    fn new_commit(&mut self, parents: Vec<String>, files: BTreeMap<String, String>, message: &str) -> String {
        self.next_id += 1;
        let id = format!("{:040x}", self.next_id);
        self.commits.insert(
            id.clone(),
            Commit {
                parents,
                files,
                message: message.to_string(),
            },
        );
        id
    }

    fn ancestors(&self, id: &str) -> HashSet<String> {
        let mut seen = HashSet::new();
        let mut stack = vec![id.to_string()];
        while let Some(id) = stack.pop() {
            if seen.insert(id.clone()) {
                if let Some(commit) = self.commits.get(&id) {
                    stack.extend(commit.parents.iter().cloned());
                }
            }
        }
        seen
    }

    fn upstream(&self) -> &BTreeMap<String, String> {
        &self.branches["origin"]
    }

    fn network_error(&self, command: &str) -> Option<GitOperationError> {
        if self.offline {
            return Some(git_error(command, OFFLINE_STDERR));
        }
        if self.reject_auth {
            return Some(git_error(command, AUTH_STDERR));
        }
        None
    }
}

fn git_error(command: &str, stderr: &str) -> GitOperationError {
    GitOperationError {
        command: command.to_string(),
        exit_code: 128,
        stderr: stderr.to_string(),
    }
}

/// Shared remote repository
#[derive(Clone)]
pub struct FakeRemote {
    server: Arc<Mutex<Server>>,
}

impl FakeRemote {
    /// Remote with `main` holding one commit
    pub fn new() -> Self {
        let mut server = Server::default();
        let mut files = BTreeMap::new();
        files.insert("README.md".to_string(), "datasets\n".to_string());
        let root = server.new_commit(Vec::new(), files, "initial");
        let mut origin = BTreeMap::new();
        origin.insert("main".to_string(), root);
        server.branches.insert("origin".to_string(), origin);
        Self {
            server: Arc::new(Mutex::new(server)),
        }
    }

    /// Another machine pushes a commit to `branch`
    pub fn push_commit(&self, branch: &str, path: &str, content: &str) -> String {
        let mut server = self.server.lock().unwrap();
        let parent = server.upstream()[branch].clone();
        let mut files = server.commits[&parent].files.clone();
        files.insert(path.to_string(), content.to_string());
        let id = server.new_commit(vec![parent], files, &format!("update {path}"));
        server
            .branches
            .get_mut("origin")
            .unwrap()
            .insert(branch.to_string(), id.clone());
        id
    }

    /// Make every fetch and push fail like a dropped connection
    pub fn set_offline(&self, offline: bool) {
        self.server.lock().unwrap().offline = offline;
    }

    /// Make every fetch and push fail authentication
    pub fn set_reject_auth(&self, reject: bool) {
        self.server.lock().unwrap().reject_auth = reject;
    }

    /// Tip of `branch` on a push target ("origin" or a fork URL)
    pub fn branch_tip(&self, target: &str, branch: &str) -> Option<String> {
        let server = self.server.lock().unwrap();
        server.branches.get(target)?.get(branch).cloned()
    }

    /// File content at a commit
    pub fn file_at(&self, commit: &str, path: &str) -> Option<String> {
        let server = self.server.lock().unwrap();
        server.commits.get(commit)?.files.get(path).cloned()
    }

    /// Commit message
    pub fn message_of(&self, commit: &str) -> Option<String> {
        let server = self.server.lock().unwrap();
        server.commits.get(commit).map(|c| c.message.clone())
    }

    /// Parents of a commit
    pub fn parents_of(&self, commit: &str) -> Vec<String> {
        let server = self.server.lock().unwrap();
        server
            .commits
            .get(commit)
            .map(|c| c.parents.clone())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Head {
    Branch(String),
    Detached(String),
}

#[derive(Debug)]
struct Local {
    branches: BTreeMap<String, String>,
    /// "origin/<branch>" refs updated by fetch
    tracking: BTreeMap<String, String>,
    head: Head,
    dirty: Vec<String>,
    stash: Vec<Vec<String>>,
    staged: Vec<String>,
    conflicted: Vec<String>,
    fail_next_merge_with_conflict: bool,
    fail_stash_pop: bool,
    fail_next_commit: bool,
    calls: Vec<String>,
}

/// One working copy
pub struct FakeGit {
    dir: TempDir,
    remote: FakeRemote,
    local: Mutex<Local>,
}

impl FakeGit {
    /// Clone `remote` with `main` checked out
    pub fn clone_from(remote: &FakeRemote) -> Self {
        let main = remote.branch_tip("origin", "main").unwrap();
        let mut branches = BTreeMap::new();
        branches.insert("main".to_string(), main.clone());
        let mut tracking = BTreeMap::new();
        tracking.insert("origin/main".to_string(), main);
        Self {
            dir: tempfile::tempdir().unwrap(),
            remote: remote.clone(),
            local: Mutex::new(Local {
                branches,
                tracking,
                head: Head::Branch("main".to_string()),
                dirty: Vec::new(),
                stash: Vec::new(),
                staged: Vec::new(),
                conflicted: Vec::new(),
                fail_next_merge_with_conflict: false,
                fail_stash_pop: false,
                fail_next_commit: false,
                calls: Vec::new(),
            }),
        }
    }

    // === Scenario setup ===

    /// Commit a file on the current branch without pushing
    pub fn commit_local(&self, path: &str, content: &str) -> String {
        let mut local = self.local.lock().unwrap();
        let parent = Self::head_of(&local).unwrap();
        let mut server = self.remote.server.lock().unwrap();
        let mut files = server.commits[&parent].files.clone();
        files.insert(path.to_string(), content.to_string());
        let id = server.new_commit(vec![parent], files, &format!("local {path}"));
        Self::advance(&mut local, id.clone());
        id
    }

    /// Mark the working tree as modified
    pub fn make_dirty(&self, path: &str) {
        self.local.lock().unwrap().dirty.push(format!(" M {path}"));
    }

    /// The next `merge` stops with a conflict
    pub fn conflict_on_next_merge(&self) {
        self.local.lock().unwrap().fail_next_merge_with_conflict = true;
    }

    /// `stash pop` fails
    pub fn fail_stash_pop(&self) {
        self.local.lock().unwrap().fail_stash_pop = true;
    }

    /// The next `commit` is rejected, as by a pre-commit hook
    pub fn fail_next_commit(&self) {
        self.local.lock().unwrap().fail_next_commit = true;
    }

    /// Detach HEAD at its current commit
    pub fn detach_head(&self) {
        let mut local = self.local.lock().unwrap();
        let commit = Self::head_of(&local).unwrap();
        local.head = Head::Detached(commit);
    }

    /// Create a local branch at HEAD without switching
    pub fn create_branch(&self, name: &str) {
        let mut local = self.local.lock().unwrap();
        let commit = Self::head_of(&local).unwrap();
        local.branches.insert(name.to_string(), commit);
    }

    // === Inspection ===

    pub fn head(&self) -> String {
        Self::head_of(&self.local.lock().unwrap()).unwrap()
    }

    pub fn current_branch(&self) -> Option<String> {
        match &self.local.lock().unwrap().head {
            Head::Branch(name) => Some(name.clone()),
            Head::Detached(_) => None,
        }
    }

    pub fn branch_tip(&self, name: &str) -> Option<String> {
        self.local.lock().unwrap().branches.get(name).cloned()
    }

    pub fn is_dirty(&self) -> bool {
        !self.local.lock().unwrap().dirty.is_empty()
    }

    pub fn stash_depth(&self) -> usize {
        self.local.lock().unwrap().stash.len()
    }

    /// Paths added but not yet committed
    pub fn staged(&self) -> Vec<String> {
        self.local.lock().unwrap().staged.clone()
    }

    pub fn has_conflicts(&self) -> bool {
        !self.local.lock().unwrap().conflicted.is_empty()
    }

    /// Every git subcommand run, in order
    pub fn calls(&self) -> Vec<String> {
        self.local.lock().unwrap().calls.clone()
    }

    /// Calls starting with `prefix`
    pub fn calls_to(&self, prefix: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with(prefix))
            .collect()
    }

    // === Internals ===

    fn head_of(local: &Local) -> Option<String> {
        match &local.head {
            Head::Branch(name) => local.branches.get(name).cloned(),
            Head::Detached(commit) => Some(commit.clone()),
        }
    }

    fn advance(local: &mut Local, commit: String) {
        match local.head.clone() {
            Head::Branch(name) => {
                local.branches.insert(name, commit);
            }
            Head::Detached(_) => local.head = Head::Detached(commit),
        }
    }

    fn resolve(&self, local: &Local, rev: &str) -> Option<String> {
        if rev == "HEAD" {
            return Self::head_of(local);
        }
        if let Some(name) = rev.strip_prefix("refs/heads/") {
            return local.branches.get(name).cloned();
        }
        if let Some(commit) = local.branches.get(rev).or_else(|| local.tracking.get(rev)) {
            return Some(commit.clone());
        }
        let server = self.remote.server.lock().unwrap();
        server.commits.contains_key(rev).then(|| rev.to_string())
    }

    fn record(&self, call: String) -> std::sync::MutexGuard<'_, Local> {
        let mut local = self.local.lock().unwrap();
        local.calls.push(call);
        local
    }
}

#[async_trait]
impl GitGateway for FakeGit {
    fn workdir(&self) -> &Path {
        self.dir.path()
    }

    async fn rev_parse(&self, rev: &str) -> Result<String> {
        let local = self.local.lock().unwrap();
        self.resolve(&local, rev).ok_or_else(|| {
            git_error(
                &format!("rev-parse --verify {rev}"),
                &format!("fatal: Needed a single revision: {rev}"),
            )
            .into()
        })
    }

    async fn abbrev_head(&self) -> Result<String> {
        Ok(match &self.local.lock().unwrap().head {
            Head::Branch(name) => name.clone(),
            Head::Detached(_) => "HEAD".to_string(),
        })
    }

    async fn ref_exists(&self, reference: &str) -> Result<bool> {
        let local = self.local.lock().unwrap();
        Ok(self.resolve(&local, reference).is_some())
    }

    async fn absolute_git_dir(&self) -> Result<PathBuf> {
        Ok(self.dir.path().join(".git"))
    }

    async fn status_porcelain(&self) -> Result<String> {
        let local = self.local.lock().unwrap();
        let mut lines: Vec<String> = local.conflicted.iter().map(|p| format!("UU {p}")).collect();
        lines.extend(local.dirty.iter().cloned());
        Ok(lines.join("\n"))
    }

    async fn rev_list_count(&self, from: &str, to: &str) -> Result<u32> {
        let local = self.local.lock().unwrap();
        let (Some(from), Some(to)) = (self.resolve(&local, from), self.resolve(&local, to)) else {
            return Err(git_error("rev-list --count", "fatal: bad revision").into());
        };
        let server = self.remote.server.lock().unwrap();
        let exclude = server.ancestors(&from);
        let count = server.ancestors(&to).difference(&exclude).count();
        Ok(u32::try_from(count).unwrap())
    }

    async fn diff_names(&self, from: &str, to: &str) -> Result<Vec<String>> {
        let server = self.remote.server.lock().unwrap();
        let empty = BTreeMap::new();
        let before = server.commits.get(from).map_or(&empty, |c| &c.files);
        let after = server.commits.get(to).map_or(&empty, |c| &c.files);
        let mut changed: Vec<String> = after
            .iter()
            .filter(|(path, content)| before.get(*path) != Some(*content))
            .map(|(path, _)| path.clone())
            .chain(before.keys().filter(|p| !after.contains_key(*p)).cloned())
            .collect();
        changed.sort();
        Ok(changed)
    }

    async fn remote_url(&self, remote: &str) -> Result<String> {
        if remote == "origin" {
            Ok(REMOTE_URL.to_string())
        } else {
            Err(git_error(
                &format!("remote get-url {remote}"),
                &format!("error: No such remote '{remote}'"),
            )
            .into())
        }
    }

    async fn fetch(&self, remote: &str, branch: &str) -> Result<()> {
        let command = format!("fetch {remote} {branch}");
        let mut local = self.record(command.clone());
        let server = self.remote.server.lock().unwrap();
        if let Some(err) = server.network_error(&command) {
            return Err(err.into());
        }
        let Some(tip) = server.upstream().get(branch) else {
            return Err(git_error(&command, &format!("fatal: couldn't find remote ref {branch}")).into());
        };
        local.tracking.insert(format!("{remote}/{branch}"), tip.clone());
        Ok(())
    }

    async fn merge_ff_only(&self, target: &str) -> Result<()> {
        let command = format!("merge --ff-only {target}");
        let mut local = self.record(command.clone());
        let head = Self::head_of(&local).unwrap();
        let target = self.resolve(&local, target).unwrap();
        let is_ff = self.remote.server.lock().unwrap().ancestors(&target).contains(&head);
        if !is_ff {
            return Err(git_error(&command, "fatal: Not possible to fast-forward, aborting.").into());
        }
        Self::advance(&mut local, target);
        Ok(())
    }

    async fn merge(&self, target: &str, message: &str) -> Result<()> {
        let command = format!("merge --no-ff {target}");
        let mut local = self.record(command.clone());
        if std::mem::take(&mut local.fail_next_merge_with_conflict) {
            local.conflicted.push("datasets/weather.json".to_string());
            return Err(git_error(
                &command,
                "CONFLICT (content): Merge conflict in datasets/weather.json\nAutomatic merge failed; fix conflicts and then commit the result.",
            )
            .into());
        }
        let head = Self::head_of(&local).unwrap();
        let target = self.resolve(&local, target).unwrap();
        let mut server = self.remote.server.lock().unwrap();
        let mut files = server.commits[&head].files.clone();
        files.extend(server.commits[&target].files.clone());
        let id = server.new_commit(vec![head, target], files, message);
        drop(server);
        Self::advance(&mut local, id);
        Ok(())
    }

    async fn merge_abort(&self) -> Result<()> {
        let mut local = self.record("merge --abort".to_string());
        local.conflicted.clear();
        Ok(())
    }

    async fn stash_push(&self, message: &str) -> Result<()> {
        let mut local = self.record(format!("stash push {message}"));
        let entry = std::mem::take(&mut local.dirty);
        local.stash.push(entry);
        Ok(())
    }

    async fn stash_pop(&self) -> Result<()> {
        let mut local = self.record("stash pop".to_string());
        if local.fail_stash_pop {
            return Err(git_error("stash pop", "error: Your local changes would be overwritten").into());
        }
        let Some(entry) = local.stash.pop() else {
            return Err(git_error("stash pop", "No stash entries found.").into());
        };
        local.dirty = entry;
        Ok(())
    }

    async fn branch_delete(&self, name: &str) -> Result<()> {
        let mut local = self.record(format!("branch -D {name}"));
        if local.head == Head::Branch(name.to_string()) {
            return Err(git_error(
                &format!("branch -D {name}"),
                &format!("error: cannot delete branch '{name}' used by worktree"),
            )
            .into());
        }
        local.branches.remove(name);
        Ok(())
    }

    async fn checkout_new_branch(&self, name: &str, start: &str) -> Result<()> {
        let command = format!("checkout -b {name} {start}");
        let mut local = self.record(command.clone());
        if local.branches.contains_key(name) {
            return Err(git_error(&command, &format!("fatal: a branch named '{name}' already exists")).into());
        }
        let commit = self.resolve(&local, start).unwrap();
        local.branches.insert(name.to_string(), commit);
        local.head = Head::Branch(name.to_string());
        Ok(())
    }

    async fn checkout(&self, name: &str) -> Result<()> {
        let mut local = self.record(format!("checkout {name}"));
        if local.branches.contains_key(name) {
            local.head = Head::Branch(name.to_string());
            return Ok(());
        }
        match self.resolve(&local, name) {
            Some(commit) => {
                local.head = Head::Detached(commit);
                Ok(())
            }
            None => Err(git_error(
                &format!("checkout {name}"),
                &format!("error: pathspec '{name}' did not match any file(s) known to git"),
            )
            .into()),
        }
    }

    async fn add(&self, paths: &[&str]) -> Result<()> {
        let mut local = self.record(format!("add {}", paths.join(" ")));
        local.staged.extend(paths.iter().map(ToString::to_string));
        Ok(())
    }

    async fn commit(&self, message: &str) -> Result<()> {
        let mut local = self.record(format!("commit {message}"));
        if std::mem::take(&mut local.fail_next_commit) {
            return Err(git_error("commit", "pre-commit hook rejected the commit").into());
        }
        let staged = std::mem::take(&mut local.staged);
        let parent = Self::head_of(&local).unwrap();
        let mut server = self.remote.server.lock().unwrap();
        let mut files = server.commits[&parent].files.clone();
        for path in staged {
            let content = std::fs::read_to_string(self.dir.path().join(&path))?;
            files.insert(path, content);
        }
        let id = server.new_commit(vec![parent], files, message);
        drop(server);
        Self::advance(&mut local, id);
        Ok(())
    }

    async fn reset_hard(&self, rev: &str) -> Result<()> {
        let mut local = self.record(format!("reset --hard {rev}"));
        let commit = self.resolve(&local, rev).unwrap();
        let tracked = self.remote.server.lock().unwrap().commits[&commit].files.clone();
        for path in std::mem::take(&mut local.staged) {
            if !tracked.contains_key(&path) {
                let _ = std::fs::remove_file(self.dir.path().join(&path));
            }
        }
        local.dirty.clear();
        local.conflicted.clear();
        Ok(())
    }

    async fn push(&self, target: &str, branch: &str, force: bool) -> Result<()> {
        let command = format!("push {}{target} {branch}", if force { "--force " } else { "" });
        let local = self.record(command.clone());
        let mut server = self.remote.server.lock().unwrap();
        if let Some(err) = server.network_error(&command) {
            return Err(err.into());
        }
        let tip = local.branches[branch].clone();
        let existing = server.branches.get(target).and_then(|b| b.get(branch)).cloned();
        if let Some(existing) = existing {
            if !force && !server.ancestors(&tip).contains(&existing) {
                return Err(git_error(&command, "! [rejected] (non-fast-forward)").into());
            }
        }
        server
            .branches
            .entry(target.to_string())
            .or_default()
            .insert(branch.to_string(), tip);
        Ok(())
    }
}
