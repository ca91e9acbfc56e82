//! Price lookups through the price-service breaker.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::ProductId;
use fulfillment::PriceQuote;

use crate::state::AppState;

/// GET /prices/{product_id}: never fails; serves the fallback quote while
/// the price service is unusable.
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(product_id): Path<String>,
) -> Json<PriceQuote> {
    Json(state.pricing.quote(&ProductId::new(product_id)).await)
}
