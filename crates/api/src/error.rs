//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use inventory::InventoryError;
use store::StoreError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Inventory rule violation or storage failure.
    Inventory(InventoryError),
    /// Storage failure.
    Store(StoreError),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Inventory(err) => inventory_error_to_response(err),
            ApiError::Store(err) => internal(err.to_string()),
            ApiError::Internal(msg) => internal(msg),
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

/// Logs the detail and hides it from the client.
fn internal(detail: String) -> (StatusCode, String) {
    tracing::error!(error = %detail, "internal server error");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error".to_string(),
    )
}

fn inventory_error_to_response(err: InventoryError) -> (StatusCode, String) {
    match &err {
        InventoryError::NotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
        InventoryError::InsufficientQuantity { .. } | InventoryError::InvalidState { .. } => {
            (StatusCode::CONFLICT, err.to_string())
        }
        InventoryError::InvalidQuantity { .. } => (StatusCode::BAD_REQUEST, err.to_string()),
        InventoryError::Store(_) => internal(err.to_string()),
    }
}

impl From<InventoryError> for ApiError {
    fn from(err: InventoryError) -> Self {
        ApiError::Inventory(err)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Store(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::ProductId;

    #[test]
    fn test_status_codes() {
        let cases = [
            (
                ApiError::NotFound("missing".to_string()),
                StatusCode::NOT_FOUND,
            ),
            (
                ApiError::Inventory(InventoryError::NotFound(ProductId::from("P-1"))),
                StatusCode::NOT_FOUND,
            ),
            (
                ApiError::Inventory(InventoryError::InsufficientQuantity {
                    product_id: ProductId::from("P-1"),
                    available: 1,
                    requested: 2,
                }),
                StatusCode::CONFLICT,
            ),
            (
                ApiError::Store(StoreError::Unavailable("down".to_string())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, status) in cases {
            assert_eq!(error.into_response().status(), status);
        }
    }
}
