//! Message transport abstraction and an in-process implementation.
//!
//! A [`Delivery`] that is dropped without being acknowledged goes back to
//! its source for redelivery, the way an unacked message returns to a
//! broker queue when the channel closes.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::Notify;

use crate::message::{InboundMessage, OrderPlaced};

/// Transport failures.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Transport closed")]
    Closed,
}

/// A message handed out by a [`MessageSource`].
pub trait Delivery: Send {
    fn message(&self) -> &InboundMessage;

    /// Confirms the message so it is not delivered again.
    fn acknowledge(self);
}

/// Something that hands out deliveries.
#[async_trait]
pub trait MessageSource: Send + Sync {
    type Delivery: Delivery;

    /// Waits for at least one message and returns up to `max` of them.
    async fn next_batch(&self, max: usize) -> Result<Vec<Self::Delivery>, TransportError>;
}

#[derive(Default)]
struct Queue {
    pending: VecDeque<InboundMessage>,
    in_flight: usize,
    closed: bool,
}

#[derive(Default)]
struct Shared {
    queue: Mutex<Queue>,
    notify: Notify,
}

/// In-process queue with broker-like redelivery.
#[derive(Clone, Default)]
pub struct InMemoryTransport {
    shared: Arc<Shared>,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes an event as a new message and returns the message.
    pub fn publish(&self, payload: OrderPlaced) -> InboundMessage {
        let message = InboundMessage::new(payload);
        self.publish_message(message.clone());
        message
    }

    /// Publishes a message as-is, keeping its ID.
    pub fn publish_message(&self, message: InboundMessage) {
        self.shared.queue.lock().pending.push_back(message);
        self.shared.notify.notify_waiters();
    }

    /// Messages waiting to be handed out.
    pub fn pending(&self) -> usize {
        self.shared.queue.lock().pending.len()
    }

    /// Messages handed out and not yet acknowledged or returned.
    pub fn in_flight(&self) -> usize {
        self.shared.queue.lock().in_flight
    }

    /// Stops handing out messages once the queue is drained.
    pub fn close(&self) {
        self.shared.queue.lock().closed = true;
        self.shared.notify.notify_waiters();
    }
}

#[async_trait]
impl MessageSource for InMemoryTransport {
    type Delivery = InMemoryDelivery;

    async fn next_batch(&self, max: usize) -> Result<Vec<InMemoryDelivery>, TransportError> {
        loop {
            let notified = self.shared.notify.notified();
            {
                let mut queue = self.shared.queue.lock();
                if !queue.pending.is_empty() {
                    let take = max.max(1).min(queue.pending.len());
                    let messages: Vec<_> = queue.pending.drain(..take).collect();
                    queue.in_flight += messages.len();
                    return Ok(messages
                        .into_iter()
                        .map(|message| InMemoryDelivery {
                            message,
                            acknowledged: false,
                            shared: self.shared.clone(),
                        })
                        .collect());
                }
                if queue.closed {
                    return Err(TransportError::Closed);
                }
            }
            notified.await;
        }
    }
}

/// Delivery from an [`InMemoryTransport`].
pub struct InMemoryDelivery {
    message: InboundMessage,
    acknowledged: bool,
    shared: Arc<Shared>,
}

impl Delivery for InMemoryDelivery {
    fn message(&self) -> &InboundMessage {
        &self.message
    }

    fn acknowledge(mut self) {
        self.acknowledged = true;
    }
}

impl Drop for InMemoryDelivery {
    fn drop(&mut self) {
        let mut queue = self.shared.queue.lock();
        queue.in_flight = queue.in_flight.saturating_sub(1);
        if self.acknowledged {
            return;
        }
        let mut message = self.message.clone();
        message.delivery_attempt += 1;
        tracing::debug!(
            message_id = %message.message_id,
            delivery_attempt = message.delivery_attempt,
            "Message returned for redelivery"
        );
        queue.pending.push_front(message);
        drop(queue);
        self.shared.notify.notify_waiters();
    }
}
