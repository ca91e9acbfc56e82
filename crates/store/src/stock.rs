//! Stock level records and the store contract for them.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::ProductId;
use serde::{Deserialize, Serialize};

use crate::Result;

/// Persisted shape of a stock ledger entry.
///
/// Carries no business rules; the inventory crate decides which
/// transitions between two records are legal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockRecord {
    pub product_id: ProductId,
    pub available: u32,
    pub reserved: u32,
    pub updated_at: DateTime<Utc>,
}

impl StockRecord {
    /// Creates a record with nothing reserved.
    pub fn new(product_id: ProductId, available: u32) -> Self {
        Self {
            product_id,
            available,
            reserved: 0,
            updated_at: Utc::now(),
        }
    }

    /// Returns `available + reserved`.
    pub fn total(&self) -> u64 {
        u64::from(self.available) + u64::from(self.reserved)
    }
}

/// Get/put/list access to stock records, keyed by product.
///
/// Stores do not serialise read-modify-write cycles; callers that need
/// that guarantee hold their own per-key lock around `get` and `put`.
#[async_trait]
pub trait StockStore: Send + Sync {
    /// Loads the record for a product, if one exists.
    async fn get(&self, product_id: &ProductId) -> Result<Option<StockRecord>>;

    /// Inserts or replaces the record for `record.product_id`.
    async fn put(&self, record: StockRecord) -> Result<()>;

    /// Returns all records ordered by product ID.
    async fn list(&self) -> Result<Vec<StockRecord>>;
}

#[async_trait]
impl<T: StockStore + ?Sized> StockStore for Arc<T> {
    async fn get(&self, product_id: &ProductId) -> Result<Option<StockRecord>> {
        (**self).get(product_id).await
    }

    async fn put(&self, record: StockRecord) -> Result<()> {
        (**self).put(record).await
    }

    async fn list(&self) -> Result<Vec<StockRecord>> {
        (**self).list().await
    }
}
