//! Dead letter entries and the store contract that holds them.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Result;

/// An operation that exhausted its retries and was parked for manual recovery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedOperation {
    /// Unique entry ID.
    pub id: Uuid,
    /// Business key the operation belongs to (usually an order ID).
    pub correlation_key: String,
    /// What was being attempted, e.g. `"order_confirmation"`.
    pub operation: String,
    /// The original input, so the operation can be resubmitted as-is.
    pub payload: serde_json::Value,
    /// Message of the last error seen.
    pub error_message: String,
    /// How many attempts were made before giving up.
    pub attempts: u32,
    /// When the entry was parked.
    pub failed_at: DateTime<Utc>,
}

impl FailedOperation {
    /// Creates a new entry stamped with the current time.
    pub fn new(
        correlation_key: impl Into<String>,
        operation: impl Into<String>,
        payload: serde_json::Value,
        error_message: impl Into<String>,
        attempts: u32,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            correlation_key: correlation_key.into(),
            operation: operation.into(),
            payload,
            error_message: error_message.into(),
            attempts,
            failed_at: Utc::now(),
        }
    }
}

/// Holding area for failed operations.
///
/// Implementations must accept concurrent producers without losing entries,
/// and `poll` must hand each entry to exactly one caller. Entries never
/// expire and are never retried implicitly.
#[async_trait]
pub trait DeadLetterStore: Send + Sync {
    /// Appends an entry at the back of the queue.
    async fn enqueue(&self, entry: FailedOperation) -> Result<()>;

    /// Returns a snapshot of all entries, oldest first.
    async fn list(&self) -> Result<Vec<FailedOperation>>;

    /// Returns the number of parked entries.
    async fn size(&self) -> Result<usize>;

    /// Removes and returns the oldest entry, or `None` when empty.
    async fn poll(&self) -> Result<Option<FailedOperation>>;

    /// Removes every entry and returns how many were removed.
    async fn clear(&self) -> Result<usize>;
}

#[async_trait]
impl<T: DeadLetterStore + ?Sized> DeadLetterStore for Arc<T> {
    async fn enqueue(&self, entry: FailedOperation) -> Result<()> {
        (**self).enqueue(entry).await
    }

    async fn list(&self) -> Result<Vec<FailedOperation>> {
        (**self).list().await
    }

    async fn size(&self) -> Result<usize> {
        (**self).size().await
    }

    async fn poll(&self) -> Result<Option<FailedOperation>> {
        (**self).poll().await
    }

    async fn clear(&self) -> Result<usize> {
        (**self).clear().await
    }
}
