use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use common::{MessageId, OrderId, ProductId};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::{
    DeadLetterStore, FailedOperation, NotificationHistoryStore, NotificationRecord,
    NotificationStatus, ProcessedMessageStore, Result, StockRecord, StockStore,
};

/// In-memory dead letter queue.
///
/// A single mutex guards the queue so concurrent `poll` calls never hand
/// out the same entry twice.
#[derive(Clone, Default)]
pub struct InMemoryDeadLetterStore {
    entries: Arc<Mutex<VecDeque<FailedOperation>>>,
}

impl InMemoryDeadLetterStore {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DeadLetterStore for InMemoryDeadLetterStore {
    async fn enqueue(&self, entry: FailedOperation) -> Result<()> {
        tracing::error!(
            correlation_key = %entry.correlation_key,
            operation = %entry.operation,
            attempts = entry.attempts,
            error = %entry.error_message,
            "Operation parked in dead letter queue"
        );
        self.entries.lock().await.push_back(entry);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<FailedOperation>> {
        Ok(self.entries.lock().await.iter().cloned().collect())
    }

    async fn size(&self) -> Result<usize> {
        Ok(self.entries.lock().await.len())
    }

    async fn poll(&self) -> Result<Option<FailedOperation>> {
        Ok(self.entries.lock().await.pop_front())
    }

    async fn clear(&self) -> Result<usize> {
        let mut entries = self.entries.lock().await;
        let removed = entries.len();
        entries.clear();
        tracing::info!(removed, "Dead letter queue cleared");
        Ok(removed)
    }
}

/// In-memory stock levels, ordered by product ID.
#[derive(Clone, Default)]
pub struct InMemoryStockStore {
    records: Arc<RwLock<BTreeMap<ProductId, StockRecord>>>,
}

impl InMemoryStockStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StockStore for InMemoryStockStore {
    async fn get(&self, product_id: &ProductId) -> Result<Option<StockRecord>> {
        Ok(self.records.read().await.get(product_id).cloned())
    }

    async fn put(&self, record: StockRecord) -> Result<()> {
        self.records
            .write()
            .await
            .insert(record.product_id.clone(), record);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<StockRecord>> {
        Ok(self.records.read().await.values().cloned().collect())
    }
}

/// In-memory notification history.
#[derive(Clone, Default)]
pub struct InMemoryNotificationHistory {
    records: Arc<RwLock<Vec<NotificationRecord>>>,
}

impl InMemoryNotificationHistory {
    /// Creates an empty history.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NotificationHistoryStore for InMemoryNotificationHistory {
    async fn record(&self, record: NotificationRecord) -> Result<()> {
        self.records.write().await.push(record);
        Ok(())
    }

    async fn get(&self, notification_id: Uuid) -> Result<Option<NotificationRecord>> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .find(|r| r.notification_id == notification_id)
            .cloned())
    }

    async fn by_order(&self, order_id: &OrderId) -> Result<Vec<NotificationRecord>> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .filter(|r| &r.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn all(&self) -> Result<Vec<NotificationRecord>> {
        Ok(self.records.read().await.clone())
    }

    async fn count_by_status(&self, status: NotificationStatus) -> Result<usize> {
        let records = self.records.read().await;
        Ok(records.iter().filter(|r| r.status == status).count())
    }
}

/// In-memory set of processed message IDs.
#[derive(Clone, Default)]
pub struct InMemoryProcessedMessages {
    seen: Arc<Mutex<HashSet<MessageId>>>,
}

impl InMemoryProcessedMessages {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProcessedMessageStore for InMemoryProcessedMessages {
    async fn contains(&self, message_id: MessageId) -> Result<bool> {
        Ok(self.seen.lock().await.contains(&message_id))
    }

    async fn mark_processed(&self, message_id: MessageId) -> Result<bool> {
        Ok(self.seen.lock().await.insert(message_id))
    }
}
