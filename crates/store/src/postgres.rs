use async_trait::async_trait;
use common::{MessageId, OrderId, ProductId};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    DeadLetterStore, FailedOperation, NotificationHistoryStore, NotificationRecord,
    NotificationStatus, ProcessedMessageStore, Result, StockRecord, StockStore, StoreError,
};

const DEAD_LETTER_COLUMNS: &str =
    "id, correlation_key, operation, payload, error_message, attempts, failed_at";

const HISTORY_COLUMNS: &str = "notification_id, order_id, recipient, notification_type, status, \
     subject, attempt_count, error_message, created_at, sent_at, last_attempt_at";

/// PostgreSQL-backed implementation of every store contract.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn to_u32(table: &'static str, column: &str, value: i64) -> Result<u32> {
        u32::try_from(value).map_err(|_| StoreError::Corrupt {
            table,
            reason: format!("{column} out of range: {value}"),
        })
    }

    fn row_to_stock(row: PgRow) -> Result<StockRecord> {
        Ok(StockRecord {
            product_id: ProductId::new(row.try_get::<String, _>("product_id")?),
            available: Self::to_u32("stock_levels", "available", row.try_get("available")?)?,
            reserved: Self::to_u32("stock_levels", "reserved", row.try_get("reserved")?)?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_dead_letter(row: PgRow) -> Result<FailedOperation> {
        Ok(FailedOperation {
            id: row.try_get::<Uuid, _>("id")?,
            correlation_key: row.try_get("correlation_key")?,
            operation: row.try_get("operation")?,
            payload: row.try_get("payload")?,
            error_message: row.try_get("error_message")?,
            attempts: Self::to_u32("dead_letters", "attempts", row.try_get("attempts")?)?,
            failed_at: row.try_get("failed_at")?,
        })
    }

    fn row_to_notification(row: PgRow) -> Result<NotificationRecord> {
        let notification_type: String = row.try_get("notification_type")?;
        let status: String = row.try_get("status")?;

        Ok(NotificationRecord {
            notification_id: row.try_get::<Uuid, _>("notification_id")?,
            order_id: OrderId::new(row.try_get::<String, _>("order_id")?),
            recipient: row.try_get("recipient")?,
            notification_type: notification_type.parse().map_err(|reason| {
                StoreError::Corrupt {
                    table: "notification_history",
                    reason,
                }
            })?,
            status: status.parse().map_err(|reason| StoreError::Corrupt {
                table: "notification_history",
                reason,
            })?,
            subject: row.try_get("subject")?,
            attempt_count: Self::to_u32(
                "notification_history",
                "attempt_count",
                row.try_get("attempt_count")?,
            )?,
            error_message: row.try_get("error_message")?,
            created_at: row.try_get("created_at")?,
            sent_at: row.try_get("sent_at")?,
            last_attempt_at: row.try_get("last_attempt_at")?,
        })
    }
}

#[async_trait]
impl StockStore for PostgresStore {
    async fn get(&self, product_id: &ProductId) -> Result<Option<StockRecord>> {
        let row = sqlx::query(
            "SELECT product_id, available, reserved, updated_at FROM stock_levels WHERE product_id = $1",
        )
        .bind(product_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_stock).transpose()
    }

    async fn put(&self, record: StockRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO stock_levels (product_id, available, reserved, updated_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (product_id) DO UPDATE
            SET available = EXCLUDED.available,
                reserved = EXCLUDED.reserved,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(record.product_id.as_str())
        .bind(i64::from(record.available))
        .bind(i64::from(record.reserved))
        .bind(record.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list(&self) -> Result<Vec<StockRecord>> {
        let rows = sqlx::query(
            "SELECT product_id, available, reserved, updated_at FROM stock_levels ORDER BY product_id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_stock).collect()
    }
}

#[async_trait]
impl DeadLetterStore for PostgresStore {
    async fn enqueue(&self, entry: FailedOperation) -> Result<()> {
        tracing::error!(
            correlation_key = %entry.correlation_key,
            operation = %entry.operation,
            attempts = entry.attempts,
            error = %entry.error_message,
            "Operation parked in dead letter queue"
        );

        sqlx::query(
            r#"
            INSERT INTO dead_letters (id, correlation_key, operation, payload, error_message, attempts, failed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(entry.id)
        .bind(&entry.correlation_key)
        .bind(&entry.operation)
        .bind(&entry.payload)
        .bind(&entry.error_message)
        .bind(i64::from(entry.attempts))
        .bind(entry.failed_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list(&self) -> Result<Vec<FailedOperation>> {
        let rows = sqlx::query(&format!(
            "SELECT {DEAD_LETTER_COLUMNS} FROM dead_letters ORDER BY seq ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_dead_letter).collect()
    }

    async fn size(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM dead_letters")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as usize)
    }

    async fn poll(&self) -> Result<Option<FailedOperation>> {
        // SKIP LOCKED keeps concurrent pollers from claiming the same row.
        let row = sqlx::query(&format!(
            r#"
            DELETE FROM dead_letters
            WHERE seq = (
                SELECT seq FROM dead_letters
                ORDER BY seq ASC
                FOR UPDATE SKIP LOCKED
                LIMIT 1
            )
            RETURNING {DEAD_LETTER_COLUMNS}
            "#
        ))
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_dead_letter).transpose()
    }

    async fn clear(&self) -> Result<usize> {
        let result = sqlx::query("DELETE FROM dead_letters")
            .execute(&self.pool)
            .await?;
        let removed = result.rows_affected() as usize;
        tracing::info!(removed, "Dead letter queue cleared");
        Ok(removed)
    }
}

#[async_trait]
impl NotificationHistoryStore for PostgresStore {
    async fn record(&self, record: NotificationRecord) -> Result<()> {
        sqlx::query(&format!(
            r#"
            INSERT INTO notification_history ({HISTORY_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#
        ))
        .bind(record.notification_id)
        .bind(record.order_id.as_str())
        .bind(&record.recipient)
        .bind(record.notification_type.as_str())
        .bind(record.status.as_str())
        .bind(&record.subject)
        .bind(i64::from(record.attempt_count))
        .bind(&record.error_message)
        .bind(record.created_at)
        .bind(record.sent_at)
        .bind(record.last_attempt_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, notification_id: Uuid) -> Result<Option<NotificationRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {HISTORY_COLUMNS} FROM notification_history WHERE notification_id = $1"
        ))
        .bind(notification_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_notification).transpose()
    }

    async fn by_order(&self, order_id: &OrderId) -> Result<Vec<NotificationRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {HISTORY_COLUMNS} FROM notification_history WHERE order_id = $1 ORDER BY seq ASC"
        ))
        .bind(order_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_notification).collect()
    }

    async fn all(&self) -> Result<Vec<NotificationRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {HISTORY_COLUMNS} FROM notification_history ORDER BY seq ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_notification).collect()
    }

    async fn count_by_status(&self, status: NotificationStatus) -> Result<usize> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM notification_history WHERE status = $1")
                .bind(status.as_str())
                .fetch_one(&self.pool)
                .await?;
        Ok(count.max(0) as usize)
    }
}

#[async_trait]
impl ProcessedMessageStore for PostgresStore {
    async fn contains(&self, message_id: MessageId) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM processed_messages WHERE message_id = $1)",
        )
        .bind(message_id.as_uuid())
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn mark_processed(&self, message_id: MessageId) -> Result<bool> {
        let result = sqlx::query(
            "INSERT INTO processed_messages (message_id) VALUES ($1) ON CONFLICT DO NOTHING",
        )
        .bind(message_id.as_uuid())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}
