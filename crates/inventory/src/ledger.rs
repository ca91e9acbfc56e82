//! Per-product serialised stock ledger.

use std::sync::Arc;

use chrono::Utc;
use common::ProductId;
use dashmap::DashMap;
use store::StockStore;
use tokio::sync::{Mutex, broadcast};

use crate::error::{InventoryError, Result};
use crate::events::{StockChanged, StockOperation};
use crate::item::InventoryItem;

const CHANGE_CHANNEL_CAPACITY: usize = 256;

/// Stock ledger over an injected [`StockStore`].
///
/// Mutations on the same product run one at a time behind a per-product
/// async mutex held across the load/apply/store cycle. Different products
/// do not contend.
pub struct ReservationLedger<S: StockStore> {
    store: S,
    locks: DashMap<ProductId, Arc<Mutex<()>>>,
    changes: broadcast::Sender<StockChanged>,
}

impl<S: StockStore> ReservationLedger<S> {
    /// Creates a ledger backed by the given store.
    pub fn new(store: S) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            store,
            locks: DashMap::new(),
            changes,
        }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Subscribes to stock change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<StockChanged> {
        self.changes.subscribe()
    }

    /// Sets the available quantity for a product, creating the entry if needed.
    ///
    /// Reserved units are kept as they are.
    #[tracing::instrument(skip(self, product_id), fields(product_id = %product_id))]
    pub async fn provision(&self, product_id: &ProductId, available: u32) -> Result<InventoryItem> {
        self.mutate(product_id, StockOperation::Provision, available, true, |item| {
            item.set_available(available);
            Ok(())
        })
        .await
    }

    /// Reserves stock for an order line.
    #[tracing::instrument(skip(self, product_id), fields(product_id = %product_id))]
    pub async fn reserve(&self, product_id: &ProductId, quantity: u32) -> Result<InventoryItem> {
        self.mutate(product_id, StockOperation::Reserve, quantity, false, |item| {
            item.reserve(quantity)
        })
        .await
    }

    /// Returns reserved stock to available.
    #[tracing::instrument(skip(self, product_id), fields(product_id = %product_id))]
    pub async fn release(&self, product_id: &ProductId, quantity: u32) -> Result<InventoryItem> {
        self.mutate(product_id, StockOperation::Release, quantity, false, |item| {
            item.release(quantity)
        })
        .await
    }

    /// Removes available stock.
    #[tracing::instrument(skip(self, product_id), fields(product_id = %product_id))]
    pub async fn decrease(&self, product_id: &ProductId, quantity: u32) -> Result<InventoryItem> {
        self.mutate(product_id, StockOperation::Decrease, quantity, false, |item| {
            item.decrease(quantity)
        })
        .await
    }

    /// Adds available stock, creating the entry on first use.
    #[tracing::instrument(skip(self, product_id), fields(product_id = %product_id))]
    pub async fn increase(&self, product_id: &ProductId, quantity: u32) -> Result<InventoryItem> {
        self.mutate(product_id, StockOperation::Increase, quantity, true, |item| {
            item.increase(quantity)
        })
        .await
    }

    /// Returns true if the product has at least `quantity` units available.
    ///
    /// Unknown products report false.
    pub async fn is_available(&self, product_id: &ProductId, quantity: u32) -> Result<bool> {
        Ok(self
            .store
            .get(product_id)
            .await?
            .map(|record| InventoryItem::from(record).can_reserve(quantity))
            .unwrap_or(false))
    }

    /// Loads the entry for a product.
    pub async fn get(&self, product_id: &ProductId) -> Result<InventoryItem> {
        self.store
            .get(product_id)
            .await?
            .map(InventoryItem::from)
            .ok_or_else(|| InventoryError::NotFound(product_id.clone()))
    }

    /// Returns all entries ordered by product ID.
    pub async fn list(&self) -> Result<Vec<InventoryItem>> {
        Ok(self
            .store
            .list()
            .await?
            .into_iter()
            .map(InventoryItem::from)
            .collect())
    }

    fn lock_for(&self, product_id: &ProductId) -> Arc<Mutex<()>> {
        // Clone the Arc so the map shard is released before awaiting.
        self.locks.entry(product_id.clone()).or_default().clone()
    }

    /// Drops the lock entry of a product nobody else is waiting on.
    fn forget_lock(&self, product_id: &ProductId) {
        self.locks
            .remove_if(product_id, |_, lock| Arc::strong_count(lock) == 1);
    }

    async fn mutate<F>(
        &self,
        product_id: &ProductId,
        operation: StockOperation,
        quantity: u32,
        create_missing: bool,
        apply: F,
    ) -> Result<InventoryItem>
    where
        F: FnOnce(&mut InventoryItem) -> Result<()> + Send,
    {
        let lock = self.lock_for(product_id);
        let guard = lock.lock().await;

        let mut item = match self.store.get(product_id).await? {
            Some(record) => InventoryItem::from(record),
            None if create_missing => InventoryItem::new(product_id.clone(), 0),
            None => {
                drop(guard);
                drop(lock);
                self.forget_lock(product_id);
                self.record_outcome(operation, "not_found");
                return Err(InventoryError::NotFound(product_id.clone()));
            }
        };
        let previous_available = item.available();

        if let Err(e) = apply(&mut item) {
            self.record_outcome(operation, "rejected");
            tracing::debug!(error = %e, "Stock mutation rejected");
            return Err(e);
        }

        self.store.put(item.clone().into_record()).await?;
        self.record_outcome(operation, "applied");

        tracing::info!(
            operation = %operation,
            quantity,
            previous_available,
            new_available = item.available(),
            reserved = item.reserved(),
            "Stock updated"
        );

        // Nobody listening is fine.
        let _ = self.changes.send(StockChanged {
            product_id: product_id.clone(),
            operation,
            quantity,
            previous_available,
            new_available: item.available(),
            reserved: item.reserved(),
            at: Utc::now(),
        });

        Ok(item)
    }

    fn record_outcome(&self, operation: StockOperation, outcome: &'static str) {
        metrics::counter!(
            "inventory_mutations_total",
            "operation" => operation.as_str(),
            "outcome" => outcome
        )
        .increment(1);
    }
}
