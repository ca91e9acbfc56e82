//! Stock change notifications.

use chrono::{DateTime, Utc};
use common::ProductId;
use serde::{Deserialize, Serialize};

/// Ledger operation that changed a stock entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockOperation {
    Provision,
    Reserve,
    Release,
    Decrease,
    Increase,
}

impl StockOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            StockOperation::Provision => "provision",
            StockOperation::Reserve => "reserve",
            StockOperation::Release => "release",
            StockOperation::Decrease => "decrease",
            StockOperation::Increase => "increase",
        }
    }
}

impl std::fmt::Display for StockOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Broadcast after every successful ledger mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockChanged {
    pub product_id: ProductId,
    pub operation: StockOperation,
    pub quantity: u32,
    pub previous_available: u32,
    pub new_available: u32,
    pub reserved: u32,
    pub at: DateTime<Utc>,
}
