//! HTTP route handlers.

pub mod circuit_breakers;
pub mod dead_letters;
pub mod events;
pub mod health;
pub mod inventory;
pub mod metrics;
pub mod notifications;
pub mod prices;
