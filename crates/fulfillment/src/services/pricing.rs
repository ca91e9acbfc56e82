//! Product pricing behind the call gateway.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::{Classify, ErrorKind, ProductId};
use parking_lot::RwLock;
use resilience::CallGateway;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Dependency name of the price service in the breaker registry.
pub const PRICE_SERVICE: &str = "price-service";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);
const FALLBACK_PRICE_CENTS: i64 = 9999;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub product_id: ProductId,
    pub product_name: String,
    pub price_cents: i64,
    pub currency: String,
    /// True when the quote is the default rather than the service's answer.
    pub is_fallback: bool,
}

impl PriceQuote {
    pub fn new(product_id: ProductId, product_name: impl Into<String>, price_cents: i64) -> Self {
        Self {
            product_id,
            product_name: product_name.into(),
            price_cents,
            currency: "USD".to_string(),
            is_fallback: false,
        }
    }

    /// Default quote served while the price service is unusable.
    pub fn fallback(product_id: ProductId) -> Self {
        let product_name = format!("Product {product_id}");
        Self {
            product_id,
            product_name,
            price_cents: FALLBACK_PRICE_CENTS,
            currency: "USD".to_string(),
            is_fallback: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PriceError {
    #[error("Price service unavailable: {0}")]
    Unavailable(String),

    #[error("No price for product {0}")]
    NotFound(ProductId),
}

impl Classify for PriceError {
    fn kind(&self) -> ErrorKind {
        match self {
            PriceError::Unavailable(_) => ErrorKind::Transient,
            PriceError::NotFound(_) => ErrorKind::Permanent,
        }
    }
}

#[async_trait]
pub trait PriceClient: Send + Sync {
    async fn fetch_price(&self, product_id: &ProductId) -> Result<PriceQuote, PriceError>;
}

#[async_trait]
impl<T: PriceClient + ?Sized> PriceClient for Arc<T> {
    async fn fetch_price(&self, product_id: &ProductId) -> Result<PriceQuote, PriceError> {
        (**self).fetch_price(product_id).await
    }
}

/// Price client backed by a map, with switchable failure and latency.
#[derive(Default)]
pub struct InMemoryPriceClient {
    prices: RwLock<HashMap<ProductId, PriceQuote>>,
    failing: RwLock<bool>,
    latency: RwLock<Duration>,
}

impl InMemoryPriceClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_price(&self, product_id: ProductId, product_name: &str, price_cents: i64) {
        let quote = PriceQuote::new(product_id.clone(), product_name, price_cents);
        self.prices.write().insert(product_id, quote);
    }

    pub fn set_failing(&self, failing: bool) {
        *self.failing.write() = failing;
    }

    pub fn set_latency(&self, latency: Duration) {
        *self.latency.write() = latency;
    }
}

#[async_trait]
impl PriceClient for InMemoryPriceClient {
    async fn fetch_price(&self, product_id: &ProductId) -> Result<PriceQuote, PriceError> {
        let latency = *self.latency.read();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if *self.failing.read() {
            return Err(PriceError::Unavailable("connection reset".to_string()));
        }
        self.prices
            .read()
            .get(product_id)
            .cloned()
            .ok_or_else(|| PriceError::NotFound(product_id.clone()))
    }
}

/// Quotes prices, degrading to [`PriceQuote::fallback`] instead of failing.
pub struct PricingService<C: PriceClient> {
    client: C,
    gateway: CallGateway,
    timeout: Duration,
}

impl<C: PriceClient> PricingService<C> {
    pub fn new(client: C, gateway: CallGateway) -> Self {
        Self {
            client,
            gateway,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    #[tracing::instrument(skip(self, product_id), fields(product_id = %product_id))]
    pub async fn quote(&self, product_id: &ProductId) -> PriceQuote {
        self.gateway
            .call(
                PRICE_SERVICE,
                self.timeout,
                || self.client.fetch_price(product_id),
                |cause| {
                    tracing::info!(%cause, "Serving fallback price");
                    PriceQuote::fallback(product_id.clone())
                },
            )
            .await
    }
}
