//! Outbound collaborators used by the handlers.

pub mod mailer;
pub mod pricing;

pub use mailer::{EmailMessage, InMemoryMailer, MailError, Mailer};
pub use pricing::{InMemoryPriceClient, PRICE_SERVICE, PriceClient, PriceError, PriceQuote, PricingService};
