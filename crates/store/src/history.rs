//! Notification history records.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::OrderId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Result;

/// Kind of customer notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationType {
    OrderConfirmation,
    OrderShipped,
    OrderDelivered,
    OrderCancelled,
    PaymentReceived,
    PaymentFailed,
}

impl NotificationType {
    /// Returns the type name as stored.
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::OrderConfirmation => "ORDER_CONFIRMATION",
            NotificationType::OrderShipped => "ORDER_SHIPPED",
            NotificationType::OrderDelivered => "ORDER_DELIVERED",
            NotificationType::OrderCancelled => "ORDER_CANCELLED",
            NotificationType::PaymentReceived => "PAYMENT_RECEIVED",
            NotificationType::PaymentFailed => "PAYMENT_FAILED",
        }
    }
}

impl FromStr for NotificationType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "ORDER_CONFIRMATION" => Ok(NotificationType::OrderConfirmation),
            "ORDER_SHIPPED" => Ok(NotificationType::OrderShipped),
            "ORDER_DELIVERED" => Ok(NotificationType::OrderDelivered),
            "ORDER_CANCELLED" => Ok(NotificationType::OrderCancelled),
            "PAYMENT_RECEIVED" => Ok(NotificationType::PaymentReceived),
            "PAYMENT_FAILED" => Ok(NotificationType::PaymentFailed),
            other => Err(format!("unknown notification type '{other}'")),
        }
    }
}

impl std::fmt::Display for NotificationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Delivery outcome of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationStatus {
    Sent,
    Failed,
}

impl NotificationStatus {
    /// Returns the status name as stored.
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationStatus::Sent => "SENT",
            NotificationStatus::Failed => "FAILED",
        }
    }
}

impl FromStr for NotificationStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "SENT" => Ok(NotificationStatus::Sent),
            "FAILED" => Ok(NotificationStatus::Failed),
            other => Err(format!("unknown notification status '{other}'")),
        }
    }
}

impl std::fmt::Display for NotificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One notification attempt outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub notification_id: Uuid,
    pub order_id: OrderId,
    pub recipient: String,
    pub notification_type: NotificationType,
    pub status: NotificationStatus,
    pub subject: String,
    pub attempt_count: u32,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    pub last_attempt_at: Option<DateTime<Utc>>,
}

impl NotificationRecord {
    /// Record of a notification that went out.
    pub fn sent(
        order_id: OrderId,
        recipient: impl Into<String>,
        notification_type: NotificationType,
        subject: impl Into<String>,
        attempt_count: u32,
    ) -> Self {
        let now = Utc::now();
        Self {
            notification_id: Uuid::new_v4(),
            order_id,
            recipient: recipient.into(),
            notification_type,
            status: NotificationStatus::Sent,
            subject: subject.into(),
            attempt_count,
            error_message: None,
            created_at: now,
            sent_at: Some(now),
            last_attempt_at: Some(now),
        }
    }

    /// Record of a notification that gave up.
    pub fn failed(
        order_id: OrderId,
        recipient: impl Into<String>,
        notification_type: NotificationType,
        subject: impl Into<String>,
        attempt_count: u32,
        error_message: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            notification_id: Uuid::new_v4(),
            order_id,
            recipient: recipient.into(),
            notification_type,
            status: NotificationStatus::Failed,
            subject: subject.into(),
            attempt_count,
            error_message: Some(error_message.into()),
            created_at: now,
            sent_at: None,
            last_attempt_at: Some(now),
        }
    }
}

/// Append-only log of notification outcomes.
#[async_trait]
pub trait NotificationHistoryStore: Send + Sync {
    /// Appends a record.
    async fn record(&self, record: NotificationRecord) -> Result<()>;

    /// Looks up a single record.
    async fn get(&self, notification_id: Uuid) -> Result<Option<NotificationRecord>>;

    /// Returns every record for an order, oldest first.
    async fn by_order(&self, order_id: &OrderId) -> Result<Vec<NotificationRecord>>;

    /// Returns all records, oldest first.
    async fn all(&self) -> Result<Vec<NotificationRecord>>;

    /// Counts records with the given status.
    async fn count_by_status(&self, status: NotificationStatus) -> Result<usize>;
}

#[async_trait]
impl<T: NotificationHistoryStore + ?Sized> NotificationHistoryStore for Arc<T> {
    async fn record(&self, record: NotificationRecord) -> Result<()> {
        (**self).record(record).await
    }

    async fn get(&self, notification_id: Uuid) -> Result<Option<NotificationRecord>> {
        (**self).get(notification_id).await
    }

    async fn by_order(&self, order_id: &OrderId) -> Result<Vec<NotificationRecord>> {
        (**self).by_order(order_id).await
    }

    async fn all(&self) -> Result<Vec<NotificationRecord>> {
        (**self).all().await
    }

    async fn count_by_status(&self, status: NotificationStatus) -> Result<usize> {
        (**self).count_by_status(status).await
    }
}
