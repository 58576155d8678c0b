//! Dataset publishing
//!
//! Turns one validated dataset change into a pushed branch and a pull
//! request. Attempts that cannot reach the remote are stored in the
//! [`Outbox`](crate::outbox::Outbox) and replayed later with
//! [`Outbox::retry`](crate::outbox::Outbox::retry).

mod pipeline;
mod task;

pub use pipeline::{
    create_or_get_pr, PublishPipeline, PublishRequest, PublishResult, PublishState,
};
pub use task::{branch_name, validate_dataset_id, PublishTask, TaskStatus, BRANCH_PREFIX};
