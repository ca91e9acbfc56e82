//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use api::{AppState, Consumers};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::ProductId;
use metrics_exporter_prometheus::PrometheusHandle;
use store::FailedOperation;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

fn setup() -> (axum::Router, Arc<AppState>, Consumers) {
    let (state, consumers) = api::create_default_state().unwrap();
    let app = api::create_app(state.clone(), get_metrics_handle());
    (app, state, consumers)
}

async fn send(
    app: &axum::Router,
    method: &str,
    uri: &str,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let mut request = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            request = request.header("content-type", "application/json");
            Body::from(serde_json::to_string(&json).unwrap())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(request.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
    };
    (status, json)
}

fn order_json(order_id: &str) -> serde_json::Value {
    serde_json::json!({
        "order_id": order_id,
        "customer_id": "customer-1",
        "customer_email": "customer@example.com",
        "items": [{
            "product_id": "SKU-001",
            "product_name": "Widget",
            "quantity": 2,
            "unit_price_cents": 1000
        }]
    })
}

async fn eventually(mut check: impl AsyncFnMut() -> bool) {
    for _ in 0..200 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

#[tokio::test]
async fn test_health_check() {
    let (app, _, _) = setup();

    let (status, json) = send(&app, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "UP");
    assert_eq!(json["circuit_breakers"]["price-service"]["status"], "UP");
    assert_eq!(json["circuit_breakers"]["price-service"]["state"], "CLOSED");
}

#[tokio::test]
async fn test_open_breaker_reports_down_until_reset() {
    let (app, state, _) = setup();
    state.pricing.client().set_failing(true);

    for _ in 0..5 {
        let (status, json) = send(&app, "GET", "/prices/SKU-001", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["is_fallback"], true);
    }

    let (status, json) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["status"], "DOWN");
    assert_eq!(json["circuit_breakers"]["price-service"]["status"], "DOWN");

    let (_, json) = send(&app, "GET", "/circuit-breakers/price-service", None).await;
    assert_eq!(json["state"], "OPEN");
    assert_eq!(json["metrics"]["failed_calls"], 5);

    let (status, json) = send(&app, "POST", "/circuit-breakers/price-service/reset", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["state"], "CLOSED");

    let (status, json) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "UP");
}

#[tokio::test]
async fn test_circuit_breakers_list_and_unknown() {
    let (app, _, _) = setup();

    let (status, json) = send(&app, "GET", "/circuit-breakers", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json[0]["name"], "price-service");

    let (status, _) = send(&app, "GET", "/circuit-breakers/nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "POST", "/circuit-breakers/nope/reset", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_price_lookup() {
    let (app, state, _) = setup();
    state
        .pricing
        .client()
        .set_price(ProductId::from("SKU-001"), "Widget", 1250);

    let (status, json) = send(&app, "GET", "/prices/SKU-001", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["price_cents"], 1250);
    assert_eq!(json["is_fallback"], false);
}

#[tokio::test]
async fn test_inventory_provision_and_get() {
    let (app, _, _) = setup();

    let (status, json) = send(
        &app,
        "PUT",
        "/inventory/SKU-001",
        Some(serde_json::json!({ "available": 100 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["available"], 100);
    assert_eq!(json["reserved"], 0);

    let (status, json) = send(&app, "GET", "/inventory/SKU-001", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total"], 100);

    let (_, json) = send(&app, "GET", "/inventory", None).await;
    assert_eq!(json.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_inventory_unknown_product() {
    let (app, _, _) = setup();

    let (status, json) = send(&app, "GET", "/inventory/SKU-404", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json["error"].as_str().unwrap().contains("SKU-404"));
}

#[tokio::test]
async fn test_dead_letter_queue_endpoints() {
    let (app, state, _) = setup();

    let (status, json) = send(&app, "POST", "/dlq/retry", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["message"], "No failed notifications to retry");

    let order: fulfillment::OrderPlaced =
        serde_json::from_value(serde_json::json!({
            "order_id": "order-9",
            "customer_id": "customer-1",
            "customer_email": "customer@example.com",
            "total_cents": 0,
            "timestamp": "2024-01-01T00:00:00Z"
        }))
        .unwrap();
    for _ in 0..2 {
        state
            .dead_letters
            .enqueue(FailedOperation::new(
                "order-9",
                fulfillment::ORDER_CONFIRMATION,
                serde_json::to_value(&order).unwrap(),
                "smtp down",
                3,
            ))
            .await
            .unwrap();
    }

    let (_, json) = send(&app, "GET", "/dlq/size", None).await;
    assert_eq!(json["size"], 2);

    let (_, json) = send(&app, "GET", "/dlq", None).await;
    assert_eq!(json[0]["correlation_key"], "order-9");
    assert_eq!(json[0]["attempts"], 3);

    let (status, json) = send(&app, "POST", "/dlq/retry", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        json["message"],
        "Notification retry initiated for order: order-9"
    );
    assert_eq!(state.confirmations.pending(), 1);

    let (status, json) = send(&app, "DELETE", "/dlq", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["cleared"], 1);

    let (_, json) = send(&app, "GET", "/dlq/size", None).await;
    assert_eq!(json["size"], 0);
}

#[tokio::test]
async fn test_publish_order_placed() {
    let (app, state, _) = setup();

    let (status, json) = send(
        &app,
        "POST",
        "/events/order-placed",
        Some(order_json("order-1")),
    )
    .await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(json["order_id"], "order-1");
    assert_ne!(
        json["reservation_message_id"],
        json["confirmation_message_id"]
    );
    assert_eq!(state.reservations.pending(), 1);
    assert_eq!(state.confirmations.pending(), 1);
}

#[tokio::test]
async fn test_publish_requires_customer() {
    let (app, _, _) = setup();

    let (status, _) = send(
        &app,
        "POST",
        "/events/order-placed",
        Some(serde_json::json!({ "customer_id": " " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_publish_rejects_bad_prices() {
    let (app, state, _) = setup();

    let (status, json) = send(
        &app,
        "POST",
        "/events/order-placed",
        Some(serde_json::json!({
            "customer_id": "customer-1",
            "items": [
                { "product_id": "A", "product_name": "A", "quantity": 2, "unit_price_cents": i64::MAX / 2 + 1 },
                { "product_id": "B", "product_name": "B", "quantity": 1, "unit_price_cents": i64::MAX }
            ]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "order total is out of range");

    let (status, json) = send(
        &app,
        "POST",
        "/events/order-placed",
        Some(serde_json::json!({
            "customer_id": "customer-1",
            "items": [{ "product_id": "A", "product_name": "A", "quantity": 1, "unit_price_cents": -5 }]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("negative"));

    assert_eq!(state.reservations.pending(), 0);
    assert_eq!(state.confirmations.pending(), 0);
}

#[tokio::test]
async fn test_order_flows_through_consumers() {
    let (app, state, consumers) = setup();
    let shutdown = CancellationToken::new();
    let workers = consumers.spawn(&state, shutdown.clone());

    send(
        &app,
        "PUT",
        "/inventory/SKU-001",
        Some(serde_json::json!({ "available": 10 })),
    )
    .await;
    send(
        &app,
        "POST",
        "/events/order-placed",
        Some(order_json("order-7")),
    )
    .await;

    eventually(async || {
        let (_, json) = send(&app, "GET", "/notifications/order/order-7", None).await;
        json.as_array().is_some_and(|records| !records.is_empty())
    })
    .await;
    eventually(async || {
        let (_, json) = send(&app, "GET", "/inventory/SKU-001", None).await;
        json["reserved"] == 2
    })
    .await;

    let (_, json) = send(&app, "GET", "/notifications/order/order-7", None).await;
    assert_eq!(json[0]["status"], "SENT");
    assert_eq!(json[0]["subject"], "Order Confirmation - Order #order-7");
    assert_eq!(state.mailer.sent().len(), 1);

    shutdown.cancel();
    for worker in workers {
        let stats = worker.await.unwrap();
        assert_eq!(stats.acknowledged, 1);
    }
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let (app, _, _) = setup();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()["content-type"].to_str().unwrap();
    assert!(content_type.starts_with("text/plain"));
}
