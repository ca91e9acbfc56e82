//! Sends the order confirmation email.

use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;
use resilience::{RetryError, RetryExecutor, RetryPolicy, Sleeper, TokioSleeper};
use store::{
    DeadLetterStore, FailedOperation, NotificationHistoryStore, NotificationRecord,
    NotificationType,
};

use crate::consumer::{HandlerError, MessageHandler};
use crate::message::{InboundMessage, OrderPlaced};
use crate::services::mailer::{EmailMessage, MailError, Mailer};

/// Operation name of parked confirmation emails.
pub const ORDER_CONFIRMATION: &str = "order_confirmation";

/// Emails the customer, retrying transient mail failures and parking the
/// order in the dead-letter store when sending gives up.
pub struct ConfirmationHandler<M: Mailer, S: Sleeper = TokioSleeper> {
    mailer: M,
    retry: RetryExecutor<S>,
    history: Arc<dyn NotificationHistoryStore>,
    dead_letters: Arc<dyn DeadLetterStore>,
}

impl<M: Mailer> ConfirmationHandler<M> {
    pub fn new(
        mailer: M,
        policy: RetryPolicy,
        history: Arc<dyn NotificationHistoryStore>,
        dead_letters: Arc<dyn DeadLetterStore>,
    ) -> Self {
        Self::with_retry(
            mailer,
            RetryExecutor::new(ORDER_CONFIRMATION, policy),
            history,
            dead_letters,
        )
    }
}

impl<M: Mailer, S: Sleeper> ConfirmationHandler<M, S> {
    pub fn with_retry(
        mailer: M,
        retry: RetryExecutor<S>,
        history: Arc<dyn NotificationHistoryStore>,
        dead_letters: Arc<dyn DeadLetterStore>,
    ) -> Self {
        Self {
            mailer,
            retry,
            history,
            dead_letters,
        }
    }

    pub fn mailer(&self) -> &M {
        &self.mailer
    }

    pub fn retry(&self) -> &RetryExecutor<S> {
        &self.retry
    }

    async fn give_up(
        &self,
        order: &OrderPlaced,
        email: &EmailMessage,
        error: RetryError<MailError>,
    ) -> Result<(), HandlerError> {
        let attempts = error.attempts();
        let message = error.last_error().to_string();

        let record = NotificationRecord::failed(
            order.order_id.clone(),
            &email.to,
            NotificationType::OrderConfirmation,
            &email.subject,
            attempts,
            &message,
        );
        if let Err(e) = self.history.record(record).await {
            tracing::warn!(order_id = %order.order_id, error = %e, "Failed to record failed notification");
        }

        let payload = serde_json::to_value(order)
            .map_err(|e| HandlerError::permanent(format!("Unserializable order: {e}")))?;
        let entry = FailedOperation::new(
            order.order_id.as_str(),
            ORDER_CONFIRMATION,
            payload,
            message,
            attempts,
        );
        self.dead_letters.enqueue(entry).await.map_err(|e| {
            tracing::error!(order_id = %order.order_id, error = %e, "Failed to park confirmation");
            HandlerError::transient(format!("Dead-letter store unavailable: {e}"))
        })?;

        tracing::error!(
            order_id = %order.order_id,
            attempts,
            "Confirmation email moved to dead-letter store"
        );
        Ok(())
    }
}

#[async_trait]
impl<M: Mailer, S: Sleeper> MessageHandler for ConfirmationHandler<M, S> {
    fn name(&self) -> &'static str {
        "order_confirmation"
    }

    async fn handle(&self, message: &InboundMessage) -> Result<(), HandlerError> {
        let order = &message.payload;
        let Some(to) = order
            .customer_email
            .as_deref()
            .filter(|email| !email.trim().is_empty())
        else {
            tracing::warn!(order_id = %order.order_id, "No customer email, skipping confirmation");
            return Ok(());
        };

        let email = confirmation_email(order, to);
        let mut attempts = 0;
        let result = self
            .retry
            .execute_classified(|attempt| {
                attempts = attempt;
                tracing::debug!(order_id = %order.order_id, attempt, "Sending confirmation email");
                self.mailer.send(&email)
            })
            .await;

        match result {
            Ok(()) => {
                let record = NotificationRecord::sent(
                    order.order_id.clone(),
                    &email.to,
                    NotificationType::OrderConfirmation,
                    &email.subject,
                    attempts,
                );
                self.history.record(record).await.map_err(|e| {
                    tracing::error!(order_id = %order.order_id, error = %e, "Failed to record sent notification");
                    HandlerError::from_classified(&e)
                })?;
                tracing::info!(order_id = %order.order_id, "Order confirmation sent");
                Ok(())
            }
            Err(RetryError::Cancelled { last_error, .. }) => Err(HandlerError::transient(format!(
                "Confirmation interrupted by shutdown: {last_error}"
            ))),
            Err(error) => self.give_up(order, &email, error).await,
        }
    }
}

/// Builds the confirmation email for an order.
pub fn confirmation_email(order: &OrderPlaced, to: &str) -> EmailMessage {
    let mut body = String::new();
    let _ = writeln!(body, "Dear Customer,\n");
    let _ = writeln!(body, "Thank you for your order!\n");
    let _ = writeln!(body, "Order ID: {}", order.order_id);
    let _ = writeln!(body, "Order Date: {}", order.timestamp.to_rfc3339());
    let _ = writeln!(body, "Total Amount: {}\n", dollars(order.total_cents));
    let _ = writeln!(body, "Items:");
    for item in &order.items {
        let _ = writeln!(
            body,
            "- {} (Qty: {}, Price: {})",
            item.product_name,
            item.quantity,
            dollars(item.unit_price_cents)
        );
    }
    let _ = write!(body, "\nWe will send you another email when your order ships.");

    EmailMessage {
        to: to.to_string(),
        subject: format!("Order Confirmation - Order #{}", order.order_id),
        body,
    }
}

fn dollars(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let cents = cents.unsigned_abs();
    format!("{sign}${}.{:02}", cents / 100, cents % 100)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::LineItem;
    use common::OrderId;

    #[test]
    fn test_email_lists_items_and_total() {
        let order = OrderPlaced::new(
            OrderId::from("order-7"),
            "customer",
            Some("c@example.com".to_string()),
            vec![LineItem::new("A", "Apple", 2, 150)],
        );

        let email = confirmation_email(&order, "c@example.com");
        assert_eq!(email.subject, "Order Confirmation - Order #order-7");
        assert!(email.body.contains("- Apple (Qty: 2, Price: $1.50)"));
        assert!(email.body.contains("Total Amount: $3.00"));
    }

    #[test]
    fn test_dollars_formats_cents() {
        assert_eq!(dollars(9999), "$99.99");
        assert_eq!(dollars(5), "$0.05");
        assert_eq!(dollars(-120), "-$1.20");
    }
}
