//! PostgreSQL integration tests
//!
//! These tests share one PostgreSQL container and truncate all tables
//! before each test, so they run serially.
//!
//! ```bash
//! cargo test -p store --test postgres_integration
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use common::{MessageId, OrderId, ProductId};
use serial_test::serial;
use sqlx::PgPool;
use store::{
    DeadLetterStore, FailedOperation, NotificationHistoryStore, NotificationRecord,
    NotificationStatus, NotificationType, PostgresStore, ProcessedMessageStore, StockRecord,
    StockStore,
};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_fulfillment_tables.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

async fn get_test_store() -> PostgresStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(10)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query(
        "TRUNCATE TABLE stock_levels, dead_letters, notification_history, processed_messages",
    )
    .execute(&pool)
    .await
    .unwrap();

    PostgresStore::new(pool)
}

fn dead_letter(key: &str) -> FailedOperation {
    FailedOperation::new(
        key,
        "order_confirmation",
        serde_json::json!({"order_id": key, "items": []}),
        "smtp unavailable",
        3,
    )
}

#[tokio::test]
#[serial]
async fn test_stock_put_and_get() {
    let store = get_test_store().await;
    let id = ProductId::new("SKU-001");

    assert!(StockStore::get(&store, &id).await.unwrap().is_none());

    let mut record = StockRecord::new(id.clone(), 10);
    record.reserved = 4;
    store.put(record).await.unwrap();

    let loaded = StockStore::get(&store, &id).await.unwrap().unwrap();
    assert_eq!(loaded.available, 10);
    assert_eq!(loaded.reserved, 4);
}

#[tokio::test]
#[serial]
async fn test_stock_put_overwrites() {
    let store = get_test_store().await;
    let id = ProductId::new("SKU-001");

    store.put(StockRecord::new(id.clone(), 10)).await.unwrap();
    store.put(StockRecord::new(id.clone(), 7)).await.unwrap();

    let loaded = StockStore::get(&store, &id).await.unwrap().unwrap();
    assert_eq!(loaded.available, 7);
    assert_eq!(StockStore::list(&store).await.unwrap().len(), 1);
}

#[tokio::test]
#[serial]
async fn test_stock_list_is_ordered() {
    let store = get_test_store().await;
    for sku in ["SKU-C", "SKU-A", "SKU-B"] {
        store
            .put(StockRecord::new(ProductId::new(sku), 1))
            .await
            .unwrap();
    }

    let ids: Vec<String> = StockStore::list(&store)
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.product_id.to_string())
        .collect();
    assert_eq!(ids, vec!["SKU-A", "SKU-B", "SKU-C"]);
}

#[tokio::test]
#[serial]
async fn test_dead_letters_keep_fifo_order_and_payload() {
    let store = get_test_store().await;
    store.enqueue(dead_letter("order-1")).await.unwrap();
    store.enqueue(dead_letter("order-2")).await.unwrap();

    let listed = DeadLetterStore::list(&store).await.unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].correlation_key, "order-1");
    assert_eq!(listed[0].payload["order_id"], "order-1");
    assert_eq!(listed[0].attempts, 3);

    let first = store.poll().await.unwrap().unwrap();
    assert_eq!(first.correlation_key, "order-1");
    assert_eq!(store.size().await.unwrap(), 1);
}

#[tokio::test]
#[serial]
async fn test_dead_letter_clear_reports_count() {
    let store = get_test_store().await;
    for i in 0..4 {
        store
            .enqueue(dead_letter(&format!("order-{i}")))
            .await
            .unwrap();
    }

    assert_eq!(store.clear().await.unwrap(), 4);
    assert_eq!(store.size().await.unwrap(), 0);
    assert!(store.poll().await.unwrap().is_none());
}

#[tokio::test]
#[serial]
async fn test_concurrent_polls_claim_each_entry_once() {
    let store = get_test_store().await;
    for i in 0..30 {
        store
            .enqueue(dead_letter(&format!("order-{i}")))
            .await
            .unwrap();
    }

    let mut handles = Vec::new();
    for _ in 0..5 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            let mut taken = Vec::new();
            while let Some(entry) = store.poll().await.unwrap() {
                taken.push(entry.id);
            }
            taken
        }));
    }

    let results = futures_util::future::join_all(handles).await;
    let mut seen = HashSet::new();
    for ids in results {
        for id in ids.unwrap() {
            assert!(seen.insert(id), "entry claimed twice");
        }
    }
    assert_eq!(seen.len(), 30);
}

#[tokio::test]
#[serial]
async fn test_notification_history_round_trip() {
    let store = get_test_store().await;
    let order = OrderId::from("order-42");

    let sent = NotificationRecord::sent(
        order.clone(),
        "alice@example.com",
        NotificationType::OrderConfirmation,
        "Order Confirmation - Order #order-42",
        2,
    );
    let sent_id = sent.notification_id;
    store.record(sent).await.unwrap();
    store
        .record(NotificationRecord::failed(
            OrderId::from("order-43"),
            "bob@example.com",
            NotificationType::OrderConfirmation,
            "Order Confirmation - Order #order-43",
            3,
            "mailbox full",
        ))
        .await
        .unwrap();

    let loaded = NotificationHistoryStore::get(&store, sent_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(loaded.status, NotificationStatus::Sent);
    assert_eq!(loaded.attempt_count, 2);
    assert_eq!(loaded.notification_type, NotificationType::OrderConfirmation);

    assert_eq!(store.by_order(&order).await.unwrap().len(), 1);
    assert_eq!(store.all().await.unwrap().len(), 2);
    assert_eq!(
        store
            .count_by_status(NotificationStatus::Failed)
            .await
            .unwrap(),
        1
    );
}

#[tokio::test]
#[serial]
async fn test_processed_messages_mark_once() {
    let store = get_test_store().await;
    let id = MessageId::new();

    assert!(!store.contains(id).await.unwrap());
    assert!(store.mark_processed(id).await.unwrap());
    assert!(!store.mark_processed(id).await.unwrap());
    assert!(store.contains(id).await.unwrap());
}
