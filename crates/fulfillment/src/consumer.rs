//! At-least-once event consumer.
//!
//! Each message moves through `Received -> Processing` and then either
//! `Acknowledged` or `Redeliver`. Which of the two is decided by the
//! [`ErrorKind`] of the handler's error alone:
//!
//! | handler result       | disposition   |
//! |----------------------|---------------|
//! | `Ok(())`             | acknowledge   |
//! | `Permanent` error    | acknowledge   |
//! | `Transient` error    | redeliver     |

use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::{Classify, ErrorKind};
use parking_lot::Mutex;
use serde::Serialize;
use store::ProcessedMessageStore;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::message::InboundMessage;
use crate::transport::{Delivery, MessageSource};

const DEFAULT_BATCH_SIZE: usize = 10;
const DEFAULT_REDELIVERY_PAUSE: Duration = Duration::from_millis(500);

/// Where a message is in its processing lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryState {
    Received,
    Processing,
    Acknowledged,
    Redeliver,
}

/// What to do with a message once processing finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Acknowledge,
    Redeliver,
}

/// Maps an error kind to a disposition.
pub fn disposition_for(kind: ErrorKind) -> Disposition {
    match kind {
        ErrorKind::Permanent => Disposition::Acknowledge,
        ErrorKind::Transient => Disposition::Redeliver,
    }
}

/// Error returned by a [`MessageHandler`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct HandlerError {
    pub kind: ErrorKind,
    pub message: String,
}

impl HandlerError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Transient,
            message: message.into(),
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Permanent,
            message: message.into(),
        }
    }

    /// Wraps any classified error, keeping its kind.
    pub fn from_classified<E: Classify + Display>(error: &E) -> Self {
        Self {
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

impl Classify for HandlerError {
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

/// Applies one inbound message.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Short name used in logs and metrics.
    fn name(&self) -> &'static str;

    async fn handle(&self, message: &InboundMessage) -> Result<(), HandlerError>;
}

#[async_trait]
impl<T: MessageHandler + ?Sized> MessageHandler for Arc<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    async fn handle(&self, message: &InboundMessage) -> Result<(), HandlerError> {
        (**self).handle(message).await
    }
}

/// Counters for one consumer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConsumerStats {
    pub received: u64,
    pub acknowledged: u64,
    pub redelivered: u64,
    /// Acknowledged after a permanent handler error.
    pub skipped: u64,
    /// Acknowledged without handling because the ID was already processed.
    pub duplicates: u64,
}

/// Pulls messages, runs a handler and acknowledges or redelivers.
///
/// Without an idempotency guard a redelivered message is handled again.
/// Handlers whose effect is not idempotent (such as decrementing stock)
/// then apply twice.
pub struct EventConsumer<H: MessageHandler> {
    handler: H,
    processed: Option<Arc<dyn ProcessedMessageStore>>,
    batch_size: usize,
    redelivery_pause: Duration,
    stats: Mutex<ConsumerStats>,
}

impl<H: MessageHandler> EventConsumer<H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            processed: None,
            batch_size: DEFAULT_BATCH_SIZE,
            redelivery_pause: DEFAULT_REDELIVERY_PAUSE,
            stats: Mutex::new(ConsumerStats::default()),
        }
    }

    /// Skips messages whose ID is already recorded in `store`.
    pub fn with_idempotency_guard(mut self, store: Arc<dyn ProcessedMessageStore>) -> Self {
        self.processed = Some(store);
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Pause after a message is handed back, so a failing dependency is
    /// not hammered.
    pub fn with_redelivery_pause(mut self, pause: Duration) -> Self {
        self.redelivery_pause = pause;
        self
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn stats(&self) -> ConsumerStats {
        *self.stats.lock()
    }

    /// Runs the handler for one message and decides its disposition.
    #[tracing::instrument(
        skip(self, message),
        fields(
            handler = self.handler.name(),
            message_id = %message.message_id,
            order_id = %message.payload.order_id,
            delivery_attempt = message.delivery_attempt
        )
    )]
    pub async fn process(&self, message: &InboundMessage) -> Disposition {
        self.stats.lock().received += 1;
        tracing::debug!(state = ?DeliveryState::Received, "Message received");

        if let Some(processed) = &self.processed {
            match processed.contains(message.message_id).await {
                Ok(true) => {
                    tracing::info!("Message already processed, acknowledging duplicate");
                    self.stats.lock().duplicates += 1;
                    self.count("duplicate");
                    return Disposition::Acknowledge;
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::error!(error = %e, "Idempotency check failed");
                    self.count("redelivered");
                    return Disposition::Redeliver;
                }
            }
        }

        tracing::debug!(state = ?DeliveryState::Processing, "Processing message");
        let result = self.handler.handle(message).await;

        match result {
            Ok(()) => {
                if let Some(processed) = &self.processed
                    && let Err(e) = processed.mark_processed(message.message_id).await
                {
                    tracing::warn!(error = %e, "Failed to record processed message");
                }
                self.count("acknowledged");
                Disposition::Acknowledge
            }
            Err(e) => match disposition_for(e.kind()) {
                Disposition::Acknowledge => {
                    tracing::warn!(error = %e, "Permanent failure, skipping message");
                    self.stats.lock().skipped += 1;
                    self.count("skipped");
                    Disposition::Acknowledge
                }
                Disposition::Redeliver => {
                    tracing::error!(error = %e, "Transient failure, message will be redelivered");
                    self.count("redelivered");
                    Disposition::Redeliver
                }
            },
        }
    }

    /// Processes one delivery and acknowledges it or hands it back.
    pub async fn consume<D: Delivery>(&self, delivery: D) -> DeliveryState {
        match self.process(delivery.message()).await {
            Disposition::Acknowledge => {
                delivery.acknowledge();
                self.stats.lock().acknowledged += 1;
                DeliveryState::Acknowledged
            }
            Disposition::Redeliver => {
                drop(delivery);
                self.stats.lock().redelivered += 1;
                DeliveryState::Redeliver
            }
        }
    }

    /// Consumes from `source` until `shutdown` is cancelled or the source
    /// closes. Deliveries still in hand at shutdown go back to the source.
    pub async fn run<S: MessageSource>(
        &self,
        source: &S,
        shutdown: CancellationToken,
    ) -> ConsumerStats {
        tracing::info!(handler = self.handler.name(), "Consumer started");

        'outer: loop {
            let batch = tokio::select! {
                _ = shutdown.cancelled() => break 'outer,
                batch = source.next_batch(self.batch_size) => batch,
            };

            let deliveries = match batch {
                Ok(deliveries) => deliveries,
                Err(e) => {
                    tracing::info!(handler = self.handler.name(), reason = %e, "Source finished");
                    break;
                }
            };

            for delivery in deliveries {
                if shutdown.is_cancelled() {
                    break 'outer;
                }
                if self.consume(delivery).await == DeliveryState::Redeliver {
                    tokio::select! {
                        _ = shutdown.cancelled() => break 'outer,
                        _ = tokio::time::sleep(self.redelivery_pause) => {}
                    }
                }
            }
        }

        let stats = self.stats();
        tracing::info!(handler = self.handler.name(), ?stats, "Consumer stopped");
        stats
    }

    fn count(&self, outcome: &'static str) {
        metrics::counter!(
            "consumer_messages_total",
            "handler" => self.handler.name(),
            "outcome" => outcome
        )
        .increment(1);
    }
}
