//! dsync - safe git sync and offline-tolerant dataset publishing
//!
//! Two operations share one working copy:
//!
//! - [`sync::SyncEngine`] pulls a remote branch into the current branch,
//!   fast-forward only unless merging is enabled, never touching a dirty tree
//!   without auto-stash.
//! - [`publish::PublishPipeline`] turns a dataset change into a branch, a
//!   commit, a push and a pull request. Attempts that cannot reach the
//!   remote are kept in the [`outbox::Outbox`] and retried later.
//!
//! Both go through [`git::GitGateway`] and are serialized per working copy by
//! [`lock::RepoLocks`].

pub mod auth;
pub mod config;
pub mod connectivity;
pub mod error;
pub mod git;
pub mod lock;
pub mod outbox;
pub mod platform;
pub mod progress;
pub mod publish;
pub mod sync;
pub mod types;
pub mod worker;
