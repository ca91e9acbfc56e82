//! Health check endpoint.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use resilience::CircuitState;
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Status {
    #[serde(rename = "UP")]
    Up,
    #[serde(rename = "DOWN")]
    Down,
    #[serde(rename = "UNKNOWN")]
    Unknown,
}

impl From<CircuitState> for Status {
    fn from(state: CircuitState) -> Self {
        match state {
            CircuitState::Closed => Status::Up,
            CircuitState::Open => Status::Down,
            CircuitState::HalfOpen => Status::Unknown,
        }
    }
}

#[derive(Serialize)]
pub struct ComponentHealth {
    pub status: Status,
    pub state: CircuitState,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: Status,
    pub circuit_breakers: BTreeMap<String, ComponentHealth>,
}

/// GET /health: DOWN (503) while any breaker is open.
pub async fn check(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    let circuit_breakers: BTreeMap<_, _> = state
        .breakers
        .all()
        .into_iter()
        .map(|breaker| {
            let circuit = breaker.state();
            (
                breaker.name().to_string(),
                ComponentHealth {
                    status: circuit.into(),
                    state: circuit,
                },
            )
        })
        .collect();

    let status = if circuit_breakers
        .values()
        .any(|component| component.status == Status::Down)
    {
        Status::Down
    } else {
        Status::Up
    };
    let code = match status {
        Status::Down => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::OK,
    };

    (
        code,
        Json(HealthResponse {
            status,
            circuit_breakers,
        }),
    )
}
