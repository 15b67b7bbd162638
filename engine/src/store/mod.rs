//! Answer store access
//!
//! The answer store is a remote, append-only timeline of published answers.
//! One key holds the publish time of the newest record; every record lives
//! under its own publish time. The engine only ever reads from it.

pub mod firebase;

pub use firebase::FirebaseStore;

use async_trait::async_trait;
use sdk::types::{AnswerRecord, Timestamp};
use thiserror::Error;

/// Errors from the answer store
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Connection failure, timeout, or non-2xx response
    #[error("Store unavailable: {0}")]
    Transient(String),

    /// The key does not exist (the store answered `null`)
    #[error("No record at key '{0}'")]
    NotFound(String),

    /// The store answered, but the body could not be decoded
    #[error("Malformed record at key '{key}': {reason}")]
    Malformed { key: String, reason: String },
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Read-only accessor for the published answer timeline.
///
/// Both calls are idempotent and side-effect free. Implementations must bound
/// every request with their own timeout.
#[async_trait]
pub trait AnswerStore: Send + Sync {
    /// Publish time of the newest record.
    ///
    /// `StoreError::NotFound` when nothing has been published yet. Any other
    /// failure is `StoreError::Transient`; an unreadable pointer is reported as
    /// transient since the publisher rewrites it on every publish.
    async fn fetch_latest_key(&self) -> Result<Timestamp>;

    /// The record published at `key`, with its multiple-choice answer already
    /// normalized to a single lowercase letter.
    async fn fetch_record(&self, key: &Timestamp) -> Result<AnswerRecord>;
}
