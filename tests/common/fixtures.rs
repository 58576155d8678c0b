//! Test data factories and small fakes
//!
//! These are test utilities - not all may be used in every test binary.

#![allow(dead_code)]

use async_trait::async_trait;
use dsync::config::{PublishConfig, SyncConfig};
use dsync::connectivity::Connectivity;
use dsync::progress::ProgressCallback;
use dsync::publish::{PublishRequest, PublishState};
use dsync::sync::SyncState;
use dsync::types::{Platform, PlatformConfig, PullRequest};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// Connectivity that answers whatever the test says
#[derive(Debug)]
pub struct SwitchableConnectivity {
    online: AtomicBool,
}

impl SwitchableConnectivity {
    pub fn online() -> Self {
        Self {
            online: AtomicBool::new(true),
        }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }
}

#[async_trait]
impl Connectivity for SwitchableConnectivity {
    async fn is_reachable(&self, _remote_url: &str) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}

/// One observed progress event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Sync(SyncState),
    Publish(PublishState),
    ContentChanged(Vec<String>),
    PrSynced { number: u64, created: bool },
    Message(String),
}

/// Progress callback that records everything
#[derive(Debug, Default)]
pub struct RecordingProgress {
    events: Mutex<Vec<Event>>,
}

impl RecordingProgress {
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn sync_states(&self) -> Vec<SyncState> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Sync(state) => Some(state),
                _ => None,
            })
            .collect()
    }

    pub fn publish_states(&self) -> Vec<PublishState> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Publish(state) => Some(state),
                _ => None,
            })
            .collect()
    }

    pub fn content_changes(&self) -> Vec<Vec<String>> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::ContentChanged(files) => Some(files),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

#[async_trait]
impl ProgressCallback for RecordingProgress {
    async fn on_sync_state(&self, state: SyncState) {
        self.push(Event::Sync(state));
    }

    async fn on_publish_state(&self, state: PublishState) {
        self.push(Event::Publish(state));
    }

    async fn on_content_changed(&self, files: &[String]) {
        self.push(Event::ContentChanged(files.to_vec()));
    }

    async fn on_pr_synced(&self, pr: &PullRequest, created: bool) {
        self.push(Event::PrSynced {
            number: pr.number,
            created,
        });
    }

    async fn on_message(&self, message: &str) {
        self.push(Event::Message(message.to_string()));
    }
}

/// Platform config for the fake upstream
pub fn github_config() -> PlatformConfig {
    PlatformConfig {
        platform: Platform::GitHub,
        owner: "test".to_string(),
        repo: "datasets".to_string(),
        host: None,
    }
}

/// Sync options for pulling `origin/main`
pub fn sync_config() -> SyncConfig {
    SyncConfig::default()
}

/// Publish options targeting `origin/main`
pub fn publish_config() -> PublishConfig {
    PublishConfig::default()
}

/// A publish request with small metadata
pub fn make_request(dataset_id: &str) -> PublishRequest {
    PublishRequest {
        dataset_id: dataset_id.to_string(),
        metadata: serde_json::json!({
            "id": dataset_id,
            "title": format!("{dataset_id} observations"),
            "license": "CC-BY-4.0",
        }),
    }
}

/// Create a pull request with default values
pub fn make_pr(number: u64, head: &str, base: &str) -> PullRequest {
    PullRequest {
        number,
        html_url: format!("https://github.com/test/datasets/pull/{number}"),
        base_ref: base.to_string(),
        head_ref: head.to_string(),
        title: format!("PR for {head}"),
    }
}
