//! Inbound order events for the in-process transports.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use common::{MessageId, OrderId};
use fulfillment::{LineItem, OrderPlaced};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct OrderPlacedRequest {
    pub order_id: Option<String>,
    pub customer_id: String,
    pub customer_email: Option<String>,
    #[serde(default)]
    pub items: Vec<LineItem>,
}

#[derive(Serialize)]
pub struct PublishedResponse {
    pub order_id: OrderId,
    pub reservation_message_id: MessageId,
    pub confirmation_message_id: MessageId,
}

/// POST /events/order-placed: publishes the event to both consumers.
#[tracing::instrument(skip(state, req))]
pub async fn order_placed(
    State(state): State<Arc<AppState>>,
    Json(req): Json<OrderPlacedRequest>,
) -> Result<(StatusCode, Json<PublishedResponse>), ApiError> {
    if req.customer_id.trim().is_empty() {
        return Err(ApiError::BadRequest("customer_id is required".to_string()));
    }
    if let Some(item) = req.items.iter().find(|item| item.unit_price_cents < 0) {
        return Err(ApiError::BadRequest(format!(
            "unit_price_cents must not be negative for product {}",
            item.product_id
        )));
    }
    if OrderPlaced::checked_total_cents(&req.items).is_none() {
        return Err(ApiError::BadRequest("order total is out of range".to_string()));
    }

    let order_id = match req.order_id {
        Some(id) if !id.trim().is_empty() => OrderId::new(id),
        _ => OrderId::generate(),
    };
    let event = OrderPlaced::new(
        order_id.clone(),
        req.customer_id,
        req.customer_email,
        req.items,
    );

    let reservation = state.reservations.publish(event.clone());
    let confirmation = state.confirmations.publish(event);
    tracing::info!(order_id = %order_id, "Order placed event published");

    Ok((
        StatusCode::ACCEPTED,
        Json(PublishedResponse {
            order_id,
            reservation_message_id: reservation.message_id,
            confirmation_message_id: confirmation.message_id,
        }),
    ))
}
