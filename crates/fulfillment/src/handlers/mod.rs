//! Order event handlers.

pub mod confirmation;
pub mod reservation;

pub use confirmation::{ConfirmationHandler, ORDER_CONFIRMATION};
pub use reservation::ReservationHandler;
