//! Mock platform service for testing
//!
//! These are test utilities - not all may be used in every test binary.

#![allow(dead_code)]

use async_trait::async_trait;
use dsync::error::{Error, Result};
use dsync::platform::PlatformService;
use dsync::types::{ForkTarget, NewPullRequest, PlatformConfig, PullRequest};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

pub const FORK_URL: &str = "https://github.com/contributor/datasets.git";

/// Call record for `create_pr`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatePrCall {
    pub head: String,
    pub head_owner: Option<String>,
    pub base: String,
    pub title: String,
    pub body: String,
}

/// Simple mock platform service for testing
///
/// This manually implements `PlatformService` rather than using mockall,
/// because mockall has issues with methods returning references.
///
/// Features:
/// - Auto-incrementing PR numbers
/// - Created PRs are remembered, so `find_existing_pr` sees them
/// - Call tracking for verification
/// - Error injection for failure path testing
pub struct MockPlatformService {
    config: PlatformConfig,
    next_pr_number: AtomicU64,
    open_prs: Mutex<HashMap<String, PullRequest>>,
    push_access: AtomicBool,
    // Call tracking
    find_pr_calls: Mutex<Vec<String>>,
    create_pr_calls: Mutex<Vec<CreatePrCall>>,
    fork_calls: AtomicU64,
    reviewer_calls: Mutex<Vec<(u64, Vec<String>)>>,
    label_calls: Mutex<Vec<(u64, Vec<String>)>>,
    // Error injection
    offline: AtomicBool,
    error_on_find_pr: Mutex<Option<String>>,
    error_on_create_pr: Mutex<Option<String>>,
    error_on_reviewers: Mutex<Option<String>>,
}

impl MockPlatformService {
    /// Create a new mock with the given config
    pub fn with_config(config: PlatformConfig) -> Self {
        Self {
            config,
            next_pr_number: AtomicU64::new(1),
            open_prs: Mutex::new(HashMap::new()),
            push_access: AtomicBool::new(true),
            find_pr_calls: Mutex::new(Vec::new()),
            create_pr_calls: Mutex::new(Vec::new()),
            fork_calls: AtomicU64::new(0),
            reviewer_calls: Mutex::new(Vec::new()),
            label_calls: Mutex::new(Vec::new()),
            offline: AtomicBool::new(false),
            error_on_find_pr: Mutex::new(None),
            error_on_create_pr: Mutex::new(None),
            error_on_reviewers: Mutex::new(None),
        }
    }

    /// Whether the identity may push upstream
    pub fn set_push_access(&self, allowed: bool) {
        self.push_access.store(allowed, Ordering::SeqCst);
    }

    // === Error injection methods ===

    /// Make pull request lookups and creation fail as unreachable
    pub fn set_pr_api_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Make `find_existing_pr` return an API error
    pub fn fail_find_pr(&self, msg: &str) {
        *self.error_on_find_pr.lock().unwrap() = Some(msg.to_string());
    }

    /// Make `create_pr` return an API error
    pub fn fail_create_pr(&self, msg: &str) {
        *self.error_on_create_pr.lock().unwrap() = Some(msg.to_string());
    }

    /// Make `request_reviewers` return an API error
    pub fn fail_reviewers(&self, msg: &str) {
        *self.error_on_reviewers.lock().unwrap() = Some(msg.to_string());
    }

    // === Call verification methods ===

    /// Get all branches that `find_existing_pr` was called with
    pub fn get_find_pr_calls(&self) -> Vec<String> {
        self.find_pr_calls.lock().unwrap().clone()
    }

    /// Get all `create_pr` calls
    pub fn get_create_pr_calls(&self) -> Vec<CreatePrCall> {
        self.create_pr_calls.lock().unwrap().clone()
    }

    /// Number of `ensure_fork` calls
    pub fn fork_calls(&self) -> u64 {
        self.fork_calls.load(Ordering::SeqCst)
    }

    /// Get all `request_reviewers` calls
    pub fn get_reviewer_calls(&self) -> Vec<(u64, Vec<String>)> {
        self.reviewer_calls.lock().unwrap().clone()
    }

    /// Get all `add_labels` calls
    pub fn get_label_calls(&self) -> Vec<(u64, Vec<String>)> {
        self.label_calls.lock().unwrap().clone()
    }

    fn check_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::Network("error sending request: dns error".to_string()));
        }
        Ok(())
    }

    /// Assert that `create_pr` was called with specific head and base
    pub fn assert_create_pr_called(&self, head: &str, base: &str) {
        let calls = self.get_create_pr_calls();
        assert!(
            calls.iter().any(|c| c.head == head && c.base == base),
            "Expected create_pr({head}, {base}) but got: {calls:?}"
        );
    }
}

#[async_trait]
impl PlatformService for MockPlatformService {
    async fn find_existing_pr(
        &self,
        head_branch: &str,
        _head_owner: Option<&str>,
    ) -> Result<Option<PullRequest>> {
        self.find_pr_calls
            .lock()
            .unwrap()
            .push(head_branch.to_string());

        // Check for injected error
        self.check_online()?;
        if let Some(msg) = self.error_on_find_pr.lock().unwrap().as_ref() {
            return Err(Error::Platform(msg.clone()));
        }

        Ok(self.open_prs.lock().unwrap().get(head_branch).cloned())
    }

    async fn create_pr(&self, request: &NewPullRequest) -> Result<PullRequest> {
        self.create_pr_calls.lock().unwrap().push(CreatePrCall {
            head: request.head.clone(),
            head_owner: request.head_owner.clone(),
            base: request.base.clone(),
            title: request.title.clone(),
            body: request.body.clone(),
        });

        // Check for injected error
        self.check_online()?;
        if let Some(msg) = self.error_on_create_pr.lock().unwrap().as_ref() {
            return Err(Error::GitHubApi(msg.clone()));
        }

        let number = self.next_pr_number.fetch_add(1, Ordering::SeqCst);
        let pr = PullRequest {
            number,
            html_url: format!("https://github.com/test/datasets/pull/{number}"),
            base_ref: request.base.clone(),
            head_ref: request.head.clone(),
            title: request.title.clone(),
        };
        self.open_prs
            .lock()
            .unwrap()
            .insert(request.head.clone(), pr.clone());
        Ok(pr)
    }

    async fn has_push_access(&self) -> Result<bool> {
        Ok(self.push_access.load(Ordering::SeqCst))
    }

    async fn ensure_fork(&self) -> Result<ForkTarget> {
        self.fork_calls.fetch_add(1, Ordering::SeqCst);
        Ok(ForkTarget {
            owner: "contributor".to_string(),
            clone_url: FORK_URL.to_string(),
        })
    }

    async fn request_reviewers(&self, pr_number: u64, reviewers: &[String]) -> Result<()> {
        self.reviewer_calls
            .lock()
            .unwrap()
            .push((pr_number, reviewers.to_vec()));
        if let Some(msg) = self.error_on_reviewers.lock().unwrap().as_ref() {
            return Err(Error::GitHubApi(msg.clone()));
        }
        Ok(())
    }

    async fn add_labels(&self, pr_number: u64, labels: &[String]) -> Result<()> {
        self.label_calls
            .lock()
            .unwrap()
            .push((pr_number, labels.to_vec()));
        Ok(())
    }

    fn config(&self) -> &PlatformConfig {
        &self.config
    }
}
