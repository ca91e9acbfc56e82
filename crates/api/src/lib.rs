//! Operator HTTP surface for the fulfillment service.
//!
//! Exposes health derived from circuit breaker states, breaker inspection
//! and reset, the dead-letter queue, stock levels, notification history and
//! price lookups, with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use state::{AppState, Consumers, Stores, build, create_default_state};

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/circuit-breakers", get(routes::circuit_breakers::list))
        .route("/circuit-breakers/{name}", get(routes::circuit_breakers::get))
        .route(
            "/circuit-breakers/{name}/reset",
            post(routes::circuit_breakers::reset),
        )
        .route(
            "/dlq",
            get(routes::dead_letters::list).delete(routes::dead_letters::clear),
        )
        .route("/dlq/size", get(routes::dead_letters::size))
        .route("/dlq/retry", post(routes::dead_letters::retry))
        .route("/inventory", get(routes::inventory::list))
        .route(
            "/inventory/{product_id}",
            get(routes::inventory::get).put(routes::inventory::provision),
        )
        .route("/notifications", get(routes::notifications::list))
        .route(
            "/notifications/order/{order_id}",
            get(routes::notifications::by_order),
        )
        .route("/prices/{product_id}", get(routes::prices::get))
        .route("/events/order-placed", post(routes::events::order_placed))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
