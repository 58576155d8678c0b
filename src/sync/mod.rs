//! Safe synchronization with a remote branch
//!
//! States: `Idle → CheckingNetwork → CheckingLocalState → Fetching → Merging
//! → Done`. Fast-forward only by default; merge commits are opt-in through
//! [`SyncConfig::allow_merge`](crate::config::SyncConfig).

mod engine;

pub use engine::{SyncEngine, SyncState, AUTO_STASH_MESSAGE};
