//! Subscriber directory: read side of the subscriber list.
//!
//! The list is owned by the chat command surface; the pipeline only reads it,
//! live, at dispatch time.

use async_trait::async_trait;
use sqlx::PgPool;

use lootwatch_common::error::AppError;
use lootwatch_common::types::Subscriber;

#[async_trait]
pub trait SubscriberDirectory: Send + Sync {
    /// Subscribers with `subscribed = true`, in registration order.
    async fn list_subscribed(&self) -> Result<Vec<Subscriber>, AppError>;

    /// Total number of known subscribers, subscribed or not.
    async fn count_all(&self) -> Result<usize, AppError>;
}

/// PostgreSQL-backed directory (`subscribers` table).
pub struct PgSubscriberDirectory {
    pool: PgPool,
}

impl PgSubscriberDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubscriberDirectory for PgSubscriberDirectory {
    async fn list_subscribed(&self) -> Result<Vec<Subscriber>, AppError> {
        let subscribers: Vec<Subscriber> = sqlx::query_as(
            r#"
            SELECT id, display_name, delivery_address, subscribed
            FROM subscribers
            WHERE subscribed = true
            ORDER BY created_at, id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(subscribers)
    }

    async fn count_all(&self) -> Result<usize, AppError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM subscribers")
            .fetch_one(&self.pool)
            .await?;

        Ok(count as usize)
    }
}
