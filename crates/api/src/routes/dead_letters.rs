//! Dead-letter queue inspection and resubmission.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use fulfillment::{ORDER_CONFIRMATION, OrderPlaced};
use serde::Serialize;
use store::FailedOperation;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Serialize)]
pub struct SizeResponse {
    pub size: usize,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Serialize)]
pub struct ClearResponse {
    pub message: String,
    pub cleared: usize,
}

/// GET /dlq
pub async fn list(State(state): State<Arc<AppState>>) -> Result<Json<Vec<FailedOperation>>, ApiError> {
    Ok(Json(state.dead_letters.list().await?))
}

/// GET /dlq/size
pub async fn size(State(state): State<Arc<AppState>>) -> Result<Json<SizeResponse>, ApiError> {
    let size = state.dead_letters.size().await?;
    metrics::gauge!("dead_letter_queue_size").set(size as f64);
    Ok(Json(SizeResponse { size }))
}

/// DELETE /dlq
#[tracing::instrument(skip(state))]
pub async fn clear(State(state): State<Arc<AppState>>) -> Result<Json<ClearResponse>, ApiError> {
    let cleared = state.dead_letters.clear().await?;
    tracing::warn!(cleared, "Dead-letter queue cleared by operator");
    Ok(Json(ClearResponse {
        message: "Dead letter queue cleared successfully".to_string(),
        cleared,
    }))
}

/// POST /dlq/retry: takes the oldest entry and publishes its order again.
///
/// An entry that cannot be resubmitted is put back at the end of the queue.
#[tracing::instrument(skip(state))]
pub async fn retry(State(state): State<Arc<AppState>>) -> Result<Json<MessageResponse>, ApiError> {
    let Some(entry) = state.dead_letters.poll().await? else {
        return Ok(Json(MessageResponse {
            message: "No failed notifications to retry".to_string(),
        }));
    };

    let order = if entry.operation == ORDER_CONFIRMATION {
        serde_json::from_value::<OrderPlaced>(entry.payload.clone()).ok()
    } else {
        None
    };
    let Some(order) = order else {
        tracing::warn!(id = %entry.id, operation = %entry.operation, "Entry cannot be resubmitted");
        let operation = entry.operation.clone();
        state.dead_letters.enqueue(entry).await?;
        return Err(ApiError::BadRequest(format!(
            "Operation {operation} cannot be resubmitted"
        )));
    };

    let order_id = order.order_id.clone();
    state.confirmations.publish(order);
    metrics::counter!("dead_letter_retries_total").increment(1);
    tracing::info!(order_id = %order_id, attempts = entry.attempts, "Resubmitted parked confirmation");

    Ok(Json(MessageResponse {
        message: format!("Notification retry initiated for order: {order_id}"),
    }))
}
