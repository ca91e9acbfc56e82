//! Notification history.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::OrderId;
use store::NotificationRecord;

use crate::error::ApiError;
use crate::state::AppState;

/// GET /notifications
pub async fn list(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<NotificationRecord>>, ApiError> {
    Ok(Json(state.history.all().await?))
}

/// GET /notifications/order/{order_id}
pub async fn by_order(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<String>,
) -> Result<Json<Vec<NotificationRecord>>, ApiError> {
    Ok(Json(state.history.by_order(&OrderId::new(order_id)).await?))
}
