//! Record of inbound messages that were already applied.

use std::sync::Arc;

use async_trait::async_trait;
use common::MessageId;

use crate::Result;

/// Set of processed message IDs, used to make redelivery harmless.
#[async_trait]
pub trait ProcessedMessageStore: Send + Sync {
    /// Returns true if the message was marked as processed.
    async fn contains(&self, message_id: MessageId) -> Result<bool>;

    /// Marks a message as processed. Returns false if it already was.
    async fn mark_processed(&self, message_id: MessageId) -> Result<bool>;
}

#[async_trait]
impl<T: ProcessedMessageStore + ?Sized> ProcessedMessageStore for Arc<T> {
    async fn contains(&self, message_id: MessageId) -> Result<bool> {
        (**self).contains(message_id).await
    }

    async fn mark_processed(&self, message_id: MessageId) -> Result<bool> {
        (**self).mark_processed(message_id).await
    }
}
