//! Stock levels.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use chrono::{DateTime, Utc};
use common::ProductId;
use inventory::InventoryItem;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ProvisionRequest {
    pub available: u32,
}

#[derive(Serialize)]
pub struct StockResponse {
    pub product_id: ProductId,
    pub available: u32,
    pub reserved: u32,
    pub total: u64,
    pub updated_at: DateTime<Utc>,
}

impl From<InventoryItem> for StockResponse {
    fn from(item: InventoryItem) -> Self {
        Self {
            product_id: item.product_id().clone(),
            available: item.available(),
            reserved: item.reserved(),
            total: item.total(),
            updated_at: item.updated_at(),
        }
    }
}

/// GET /inventory
pub async fn list(State(state): State<Arc<AppState>>) -> Result<Json<Vec<StockResponse>>, ApiError> {
    let items = state.ledger.list().await?;
    Ok(Json(items.into_iter().map(StockResponse::from).collect()))
}

/// GET /inventory/{product_id}
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(product_id): Path<String>,
) -> Result<Json<StockResponse>, ApiError> {
    let item = state.ledger.get(&ProductId::new(product_id)).await?;
    Ok(Json(item.into()))
}

/// PUT /inventory/{product_id}: sets available stock, keeping reservations.
#[tracing::instrument(skip(state, req))]
pub async fn provision(
    State(state): State<Arc<AppState>>,
    Path(product_id): Path<String>,
    Json(req): Json<ProvisionRequest>,
) -> Result<Json<StockResponse>, ApiError> {
    let item = state
        .ledger
        .provision(&ProductId::new(product_id), req.available)
        .await?;
    Ok(Json(item.into()))
}
