//! Shared types for the fulfillment workspace.
//!
//! - [`OrderId`], [`ProductId`] and [`MessageId`] identify orders, stock keys
//!   and inbound messages across crate boundaries.
//! - [`ErrorKind`] and [`Classify`] tag errors as transient or permanent so
//!   retry and redelivery decisions never depend on concrete error types.

pub mod error_kind;
pub mod types;

pub use error_kind::{Classify, ErrorKind};
pub use types::{MessageId, OrderId, ProductId};
