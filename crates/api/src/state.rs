//! Shared application state and consumer wiring.

use std::sync::Arc;

use fulfillment::{
    ConfirmationHandler, ConsumerStats, EventConsumer, InMemoryMailer, InMemoryPriceClient,
    InMemoryTransport, PRICE_SERVICE, PricingService, ReservationHandler,
};
use inventory::ReservationLedger;
use resilience::{CallGateway, CircuitBreakerRegistry, ConfigResult, RetryExecutor};
use store::{
    DeadLetterStore, InMemoryDeadLetterStore, InMemoryNotificationHistory,
    InMemoryProcessedMessages, InMemoryStockStore, NotificationHistoryStore, PostgresStore,
    ProcessedMessageStore, StockStore,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::Config;

pub type Ledger = ReservationLedger<Arc<dyn StockStore>>;
pub type Pricing = PricingService<Arc<InMemoryPriceClient>>;
pub type ReservationConsumer = EventConsumer<ReservationHandler<Arc<dyn StockStore>>>;
pub type ConfirmationConsumer = EventConsumer<ConfirmationHandler<Arc<InMemoryMailer>>>;

/// The store implementations the process runs on.
#[derive(Clone)]
pub struct Stores {
    pub stock: Arc<dyn StockStore>,
    pub dead_letters: Arc<dyn DeadLetterStore>,
    pub history: Arc<dyn NotificationHistoryStore>,
    pub processed: Arc<dyn ProcessedMessageStore>,
}

impl Stores {
    pub fn in_memory() -> Self {
        Self {
            stock: Arc::new(InMemoryStockStore::new()),
            dead_letters: Arc::new(InMemoryDeadLetterStore::new()),
            history: Arc::new(InMemoryNotificationHistory::new()),
            processed: Arc::new(InMemoryProcessedMessages::new()),
        }
    }

    pub fn postgres(store: PostgresStore) -> Self {
        Self {
            stock: Arc::new(store.clone()),
            dead_letters: Arc::new(store.clone()),
            history: Arc::new(store.clone()),
            processed: Arc::new(store),
        }
    }
}

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub ledger: Arc<Ledger>,
    pub breakers: Arc<CircuitBreakerRegistry>,
    pub pricing: Pricing,
    pub dead_letters: Arc<dyn DeadLetterStore>,
    pub history: Arc<dyn NotificationHistoryStore>,
    /// Feeds the reservation consumer.
    pub reservations: InMemoryTransport,
    /// Feeds the confirmation consumer.
    pub confirmations: InMemoryTransport,
    pub mailer: Arc<InMemoryMailer>,
}

/// Consumers built alongside the state, not yet running.
pub struct Consumers {
    pub reservation: ReservationConsumer,
    pub confirmation: ConfirmationConsumer,
}

impl Consumers {
    /// Runs both consumers on their transports until `shutdown` fires.
    pub fn spawn(
        self,
        state: &AppState,
        shutdown: CancellationToken,
    ) -> Vec<JoinHandle<ConsumerStats>> {
        let reservation = self.reservation;
        let reservations = state.reservations.clone();
        let reservation_shutdown = shutdown.clone();

        let confirmation = self.confirmation;
        let confirmations = state.confirmations.clone();

        vec![
            tokio::spawn(async move { reservation.run(&reservations, reservation_shutdown).await }),
            tokio::spawn(async move { confirmation.run(&confirmations, shutdown).await }),
        ]
    }
}

/// Builds the state and consumers from configuration.
///
/// The reservation consumer gets the idempotency guard when
/// `config.idempotency_guard` is set. Confirmation emails are safe to send
/// twice and never use it. Backoff waits end early when `shutdown` fires.
pub fn build(
    config: &Config,
    stores: Stores,
    shutdown: CancellationToken,
) -> ConfigResult<(Arc<AppState>, Consumers)> {
    config.retry.validate()?;
    let breakers = Arc::new(CircuitBreakerRegistry::new(config.breaker.clone())?);
    breakers.get_or_create(PRICE_SERVICE);

    let pricing = PricingService::new(
        Arc::new(InMemoryPriceClient::new()),
        CallGateway::new(breakers.clone()),
    )
    .with_timeout(config.price_service_timeout);

    let ledger = Arc::new(ReservationLedger::new(stores.stock.clone()));
    let mailer = Arc::new(InMemoryMailer::new());

    let mut reservation = EventConsumer::new(ReservationHandler::new(ledger.clone()));
    if config.idempotency_guard {
        reservation = reservation.with_idempotency_guard(stores.processed.clone());
    }

    let retry = RetryExecutor::new(fulfillment::ORDER_CONFIRMATION, config.retry.clone())
        .with_cancellation(shutdown);
    let confirmation = EventConsumer::new(ConfirmationHandler::with_retry(
        mailer.clone(),
        retry,
        stores.history.clone(),
        stores.dead_letters.clone(),
    ));

    let state = Arc::new(AppState {
        ledger,
        breakers,
        pricing,
        dead_letters: stores.dead_letters,
        history: stores.history,
        reservations: InMemoryTransport::new(),
        confirmations: InMemoryTransport::new(),
        mailer,
    });

    Ok((
        state,
        Consumers {
            reservation,
            confirmation,
        },
    ))
}

/// In-memory state with default configuration, for tests and local runs.
pub fn create_default_state() -> ConfigResult<(Arc<AppState>, Consumers)> {
    build(
        &Config::default(),
        Stores::in_memory(),
        CancellationToken::new(),
    )
}
