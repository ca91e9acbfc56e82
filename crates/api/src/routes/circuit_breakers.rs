//! Circuit breaker inspection and reset.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use resilience::{CircuitBreaker, CircuitBreakerMetrics, CircuitState};
use serde::Serialize;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Serialize)]
pub struct CircuitBreakerResponse {
    pub name: String,
    pub state: CircuitState,
    pub metrics: CircuitBreakerMetrics,
}

impl From<&CircuitBreaker> for CircuitBreakerResponse {
    fn from(breaker: &CircuitBreaker) -> Self {
        Self {
            name: breaker.name().to_string(),
            state: breaker.state(),
            metrics: breaker.metrics(),
        }
    }
}

/// GET /circuit-breakers
pub async fn list(State(state): State<Arc<AppState>>) -> Json<Vec<CircuitBreakerResponse>> {
    Json(
        state
            .breakers
            .all()
            .iter()
            .map(|breaker| CircuitBreakerResponse::from(breaker.as_ref()))
            .collect(),
    )
}

/// GET /circuit-breakers/{name}
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<CircuitBreakerResponse>, ApiError> {
    let breaker = find(&state, &name)?;
    Ok(Json(CircuitBreakerResponse::from(breaker.as_ref())))
}

/// POST /circuit-breakers/{name}/reset: forces the breaker back to CLOSED.
#[tracing::instrument(skip(state))]
pub async fn reset(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<CircuitBreakerResponse>, ApiError> {
    let breaker = find(&state, &name)?;
    breaker.reset();
    tracing::info!(breaker = %name, "Circuit breaker reset by operator");
    Ok(Json(CircuitBreakerResponse::from(breaker.as_ref())))
}

fn find(state: &AppState, name: &str) -> Result<Arc<CircuitBreaker>, ApiError> {
    state
        .breakers
        .get(name)
        .ok_or_else(|| ApiError::NotFound(format!("Circuit breaker {name} not found")))
}
