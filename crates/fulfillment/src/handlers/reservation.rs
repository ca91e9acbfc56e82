//! Reserves stock for every line of a placed order.

use std::sync::Arc;

use async_trait::async_trait;
use inventory::ReservationLedger;
use store::StockStore;

use crate::consumer::{HandlerError, MessageHandler};
use crate::message::InboundMessage;

/// Reserves each line item through the ledger.
///
/// Lines are reserved in order. When one fails the lines before it stay
/// reserved; releasing them is left to order cancellation.
pub struct ReservationHandler<S: StockStore> {
    ledger: Arc<ReservationLedger<S>>,
}

impl<S: StockStore> ReservationHandler<S> {
    pub fn new(ledger: Arc<ReservationLedger<S>>) -> Self {
        Self { ledger }
    }

    pub fn ledger(&self) -> &Arc<ReservationLedger<S>> {
        &self.ledger
    }
}

#[async_trait]
impl<S: StockStore> MessageHandler for ReservationHandler<S> {
    fn name(&self) -> &'static str {
        "inventory_reservation"
    }

    async fn handle(&self, message: &InboundMessage) -> Result<(), HandlerError> {
        let order = &message.payload;
        if order.items.is_empty() {
            tracing::warn!(order_id = %order.order_id, "Order has no items, nothing to reserve");
            return Ok(());
        }

        for item in &order.items {
            self.ledger
                .reserve(&item.product_id, item.quantity)
                .await
                .map_err(|e| {
                    tracing::warn!(
                        order_id = %order.order_id,
                        product_id = %item.product_id,
                        quantity = item.quantity,
                        error = %e,
                        "Reservation failed"
                    );
                    HandlerError::from_classified(&e)
                })?;
        }

        tracing::info!(
            order_id = %order.order_id,
            lines = order.items.len(),
            "Inventory reserved for order"
        );
        Ok(())
    }
}
