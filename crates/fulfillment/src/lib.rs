//! Order fulfillment consumers.
//!
//! Order events arrive through a [`MessageSource`] and are applied by an
//! [`EventConsumer`] running one [`MessageHandler`]:
//!
//! - [`ReservationHandler`] reserves stock for each line item
//! - [`ConfirmationHandler`] emails the customer, parking failures in the
//!   dead-letter store
//!
//! Delivery is at-least-once. Handlers that are not idempotent need the
//! consumer's idempotency guard.

pub mod consumer;
pub mod handlers;
pub mod message;
pub mod services;
pub mod transport;

pub use consumer::{
    ConsumerStats, DeliveryState, Disposition, EventConsumer, HandlerError, MessageHandler,
    disposition_for,
};
pub use handlers::{ConfirmationHandler, ORDER_CONFIRMATION, ReservationHandler};
pub use message::{InboundMessage, LineItem, OrderPlaced};
pub use services::{
    EmailMessage, InMemoryMailer, InMemoryPriceClient, MailError, Mailer, PRICE_SERVICE,
    PriceClient, PriceError, PriceQuote, PricingService,
};
pub use transport::{Delivery, InMemoryDelivery, InMemoryTransport, MessageSource, TransportError};
