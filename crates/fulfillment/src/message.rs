//! Inbound order events.

use chrono::{DateTime, Utc};
use common::{MessageId, OrderId, ProductId};
use serde::{Deserialize, Serialize};

/// One line of a placed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
}

impl LineItem {
    pub fn new(
        product_id: impl Into<ProductId>,
        product_name: impl Into<String>,
        quantity: u32,
        unit_price_cents: i64,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            product_name: product_name.into(),
            quantity,
            unit_price_cents,
        }
    }

    pub fn line_total_cents(&self) -> i64 {
        self.unit_price_cents.saturating_mul(i64::from(self.quantity))
    }

    /// Line total, or `None` when it does not fit in an `i64`.
    pub fn checked_line_total_cents(&self) -> Option<i64> {
        self.unit_price_cents.checked_mul(i64::from(self.quantity))
    }
}

/// Published by the order service when a customer places an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPlaced {
    pub order_id: OrderId,
    pub customer_id: String,
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub items: Vec<LineItem>,
    pub total_cents: i64,
    pub timestamp: DateTime<Utc>,
}

impl OrderPlaced {
    /// Builds an event whose total is the sum of its lines, saturating at
    /// the `i64` bounds.
    pub fn new(
        order_id: OrderId,
        customer_id: impl Into<String>,
        customer_email: Option<String>,
        items: Vec<LineItem>,
    ) -> Self {
        let total_cents = items
            .iter()
            .map(LineItem::line_total_cents)
            .fold(0i64, i64::saturating_add);
        Self {
            order_id,
            customer_id: customer_id.into(),
            customer_email,
            items,
            total_cents,
            timestamp: Utc::now(),
        }
    }

    /// Exact order total, or `None` if any line or the sum overflows.
    pub fn checked_total_cents(items: &[LineItem]) -> Option<i64> {
        items.iter().try_fold(0i64, |total, item| {
            total.checked_add(item.checked_line_total_cents()?)
        })
    }
}

/// An order event as handed over by the transport.
///
/// Redeliveries of the same event keep the `message_id` and bump
/// `delivery_attempt`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub message_id: MessageId,
    pub delivery_attempt: u32,
    pub payload: OrderPlaced,
}

impl InboundMessage {
    /// Wraps a payload as a first delivery with a fresh ID.
    pub fn new(payload: OrderPlaced) -> Self {
        Self {
            message_id: MessageId::new(),
            delivery_attempt: 1,
            payload,
        }
    }

    pub fn is_redelivery(&self) -> bool {
        self.delivery_attempt > 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_is_sum_of_lines() {
        let order = OrderPlaced::new(
            OrderId::from("order-1"),
            "customer-1",
            None,
            vec![
                LineItem::new("SKU-1", "Widget", 2, 1000),
                LineItem::new("SKU-2", "Gadget", 1, 550),
            ],
        );
        assert_eq!(order.total_cents, 2550);
    }

    #[test]
    fn test_total_saturates_instead_of_overflowing() {
        let items = vec![
            LineItem::new("SKU-1", "Widget", 2, i64::MAX / 2 + 1),
            LineItem::new("SKU-2", "Gadget", 1, i64::MAX),
        ];
        assert_eq!(OrderPlaced::checked_total_cents(&items), None);

        let order = OrderPlaced::new(OrderId::from("order-2"), "customer-1", None, items);
        assert_eq!(order.total_cents, i64::MAX);
    }

    #[test]
    fn test_checked_total_of_normal_order() {
        let items = vec![
            LineItem::new("SKU-1", "Widget", 3, 250),
            LineItem::new("SKU-2", "Gadget", 1, 99),
        ];
        assert_eq!(OrderPlaced::checked_total_cents(&items), Some(849));
        assert_eq!(OrderPlaced::checked_total_cents(&[]), Some(0));
    }

    #[test]
    fn test_missing_email_and_items_deserialize() {
        let json = serde_json::json!({
            "order_id": "order-9",
            "customer_id": "c-1",
            "total_cents": 0,
            "timestamp": "2024-01-01T00:00:00Z"
        });
        let order: OrderPlaced = serde_json::from_value(json).unwrap();
        assert!(order.customer_email.is_none());
        assert!(order.items.is_empty());
    }
}
