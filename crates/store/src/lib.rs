//! Storage collaborators for the fulfillment services.
//!
//! Every store is a trait so the core logic never depends on where data
//! lives. Two implementations ship with the crate:
//! - [`memory`]: process-local stores used by tests and single-node runs
//! - [`postgres`]: durable stores backed by PostgreSQL via `sqlx`

pub mod dead_letter;
pub mod error;
pub mod history;
pub mod memory;
pub mod postgres;
pub mod processed;
pub mod stock;

pub use dead_letter::{DeadLetterStore, FailedOperation};
pub use error::{Result, StoreError};
pub use history::{
    NotificationHistoryStore, NotificationRecord, NotificationStatus, NotificationType,
};
pub use memory::{
    InMemoryDeadLetterStore, InMemoryNotificationHistory, InMemoryProcessedMessages,
    InMemoryStockStore,
};
pub use postgres::PostgresStore;
pub use processed::ProcessedMessageStore;
pub use stock::{StockRecord, StockStore};
