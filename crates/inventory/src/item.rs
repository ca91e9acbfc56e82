//! Stock entity with the reservation rules.

use chrono::{DateTime, Utc};
use common::ProductId;
use serde::{Deserialize, Serialize};
use store::StockRecord;

use crate::error::{InventoryError, Result};

/// Stock held for one product.
///
/// Every mutation either succeeds fully or leaves the item untouched.
/// `reserve` and `release` move units between the two counters, so
/// `available + reserved` is unchanged by them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItem {
    product_id: ProductId,
    available: u32,
    reserved: u32,
    updated_at: DateTime<Utc>,
}

impl InventoryItem {
    /// Creates an item with the given available stock and nothing reserved.
    pub fn new(product_id: ProductId, available: u32) -> Self {
        Self {
            product_id,
            available,
            reserved: 0,
            updated_at: Utc::now(),
        }
    }

    pub fn product_id(&self) -> &ProductId {
        &self.product_id
    }

    pub fn available(&self) -> u32 {
        self.available
    }

    pub fn reserved(&self) -> u32 {
        self.reserved
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns `available + reserved`.
    pub fn total(&self) -> u64 {
        u64::from(self.available) + u64::from(self.reserved)
    }

    /// Moves `quantity` units from available to reserved.
    pub fn reserve(&mut self, quantity: u32) -> Result<()> {
        self.check_positive(quantity)?;
        if self.available < quantity {
            return Err(self.insufficient(quantity));
        }
        let reserved = self.checked(self.reserved.checked_add(quantity), quantity)?;
        self.available -= quantity;
        self.reserved = reserved;
        self.touch();
        Ok(())
    }

    /// Moves `quantity` units from reserved back to available.
    pub fn release(&mut self, quantity: u32) -> Result<()> {
        self.check_positive(quantity)?;
        if self.reserved < quantity {
            return Err(InventoryError::InvalidState {
                product_id: self.product_id.clone(),
                reserved: self.reserved,
                requested: quantity,
            });
        }
        let available = self.checked(self.available.checked_add(quantity), quantity)?;
        self.reserved -= quantity;
        self.available = available;
        self.touch();
        Ok(())
    }

    /// Removes `quantity` units from available stock.
    pub fn decrease(&mut self, quantity: u32) -> Result<()> {
        self.check_positive(quantity)?;
        if self.available < quantity {
            return Err(self.insufficient(quantity));
        }
        self.available -= quantity;
        self.touch();
        Ok(())
    }

    /// Adds `quantity` units to available stock.
    pub fn increase(&mut self, quantity: u32) -> Result<()> {
        self.check_positive(quantity)?;
        self.available = self.checked(self.available.checked_add(quantity), quantity)?;
        self.touch();
        Ok(())
    }

    /// Overwrites the available quantity. Reserved units are untouched.
    pub fn set_available(&mut self, available: u32) {
        self.available = available;
        self.touch();
    }

    /// Returns true if at least `quantity` units are available.
    pub fn can_reserve(&self, quantity: u32) -> bool {
        self.available >= quantity
    }

    /// Converts into the persisted shape.
    pub fn into_record(self) -> StockRecord {
        StockRecord {
            product_id: self.product_id,
            available: self.available,
            reserved: self.reserved,
            updated_at: self.updated_at,
        }
    }

    fn check_positive(&self, quantity: u32) -> Result<()> {
        if quantity == 0 {
            return Err(InventoryError::InvalidQuantity {
                product_id: self.product_id.clone(),
                quantity,
                reason: "quantity must be positive",
            });
        }
        Ok(())
    }

    fn checked(&self, value: Option<u32>, quantity: u32) -> Result<u32> {
        value.ok_or_else(|| InventoryError::InvalidQuantity {
            product_id: self.product_id.clone(),
            quantity,
            reason: "quantity would overflow",
        })
    }

    fn insufficient(&self, quantity: u32) -> InventoryError {
        InventoryError::InsufficientQuantity {
            product_id: self.product_id.clone(),
            available: self.available,
            requested: quantity,
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl From<StockRecord> for InventoryItem {
    fn from(record: StockRecord) -> Self {
        Self {
            product_id: record.product_id,
            available: record.available,
            reserved: record.reserved,
            updated_at: record.updated_at,
        }
    }
}
