//! Inventory error types.

use common::{Classify, ErrorKind, ProductId};
use store::StoreError;
use thiserror::Error;

/// Errors returned by ledger operations.
#[derive(Debug, Error)]
pub enum InventoryError {
    /// No stock entry exists for the product.
    #[error("Product not found in inventory: {0}")]
    NotFound(ProductId),

    /// Not enough available stock to satisfy the request.
    #[error(
        "Insufficient quantity for product {product_id}: available {available}, requested {requested}"
    )]
    InsufficientQuantity {
        product_id: ProductId,
        available: u32,
        requested: u32,
    },

    /// Release asked for more than is currently reserved.
    #[error(
        "Cannot release {requested} units of product {product_id}: only {reserved} reserved"
    )]
    InvalidState {
        product_id: ProductId,
        reserved: u32,
        requested: u32,
    },

    /// Quantity is zero or would overflow the counters.
    #[error("Invalid quantity {quantity} for product {product_id}: {reason}")]
    InvalidQuantity {
        product_id: ProductId,
        quantity: u32,
        reason: &'static str,
    },

    /// The stock store failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl Classify for InventoryError {
    fn kind(&self) -> ErrorKind {
        match self {
            InventoryError::Store(e) => e.kind(),
            _ => ErrorKind::Permanent,
        }
    }
}

/// Result type for inventory operations.
pub type Result<T> = std::result::Result<T, InventoryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_business_errors_are_permanent() {
        let err = InventoryError::InsufficientQuantity {
            product_id: ProductId::new("SKU-001"),
            available: 1,
            requested: 5,
        };
        assert_eq!(err.kind(), ErrorKind::Permanent);
        assert!(!InventoryError::NotFound(ProductId::new("SKU-001")).is_transient());
    }

    #[test]
    fn test_store_errors_keep_their_kind() {
        let err = InventoryError::from(StoreError::Unavailable("down".into()));
        assert!(err.is_transient());
    }

    #[test]
    fn test_display_includes_quantities() {
        let err = InventoryError::InvalidState {
            product_id: ProductId::new("SKU-001"),
            reserved: 2,
            requested: 5,
        };
        assert_eq!(
            err.to_string(),
            "Cannot release 5 units of product SKU-001: only 2 reserved"
        );
    }
}
