//! Stock reservation ledger.
//!
//! This crate provides:
//! - [`InventoryItem`], the per-product entity that enforces the stock rules
//! - [`ReservationLedger`], which serialises mutations per product over an
//!   injected [`store::StockStore`] and broadcasts [`StockChanged`] events

pub mod error;
pub mod events;
pub mod item;
pub mod ledger;

pub use error::{InventoryError, Result};
pub use events::{StockChanged, StockOperation};
pub use item::InventoryItem;
pub use ledger::ReservationLedger;
