//! Announcement ledger: durable record of promotions already announced.
//!
//! Keyed by promotion id with upsert semantics: recording the same id twice
//! leaves exactly one record. Records never expire.
//!
//! Storage failures are always surfaced. Treating a failed read as "not
//! announced" would re-announce; treating it as "announced" would lose the
//! promotion. The caller decides, never this module.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use tokio::sync::RwLock;

use lootwatch_common::error::AppError;
use lootwatch_common::types::{AnnouncementRecord, FreePromotion};

/// Storage backend for announcement records.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<AnnouncementRecord>, AppError>;

    /// Insert or overwrite the record with the same id.
    async fn upsert(&self, record: &AnnouncementRecord) -> Result<(), AppError>;

    /// All records, most recently announced first.
    async fn list(&self) -> Result<Vec<AnnouncementRecord>, AppError>;
}

/// PostgreSQL-backed store (`announced_promotions` table).
pub struct PgLedgerStore {
    pool: PgPool,
}

impl PgLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn get(&self, id: &str) -> Result<Option<AnnouncementRecord>, AppError> {
        let record: Option<AnnouncementRecord> = sqlx::query_as(
            "SELECT id, title, announced_at, end_date FROM announced_promotions WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn upsert(&self, record: &AnnouncementRecord) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO announced_promotions (id, title, announced_at, end_date)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE
            SET title = EXCLUDED.title,
                announced_at = EXCLUDED.announced_at,
                end_date = EXCLUDED.end_date
            "#,
        )
        .bind(&record.id)
        .bind(&record.title)
        .bind(record.announced_at)
        .bind(record.end_date)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list(&self) -> Result<Vec<AnnouncementRecord>, AppError> {
        let records: Vec<AnnouncementRecord> = sqlx::query_as(
            "SELECT id, title, announced_at, end_date FROM announced_promotions ORDER BY announced_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }
}

/// Process-local store, for dry runs and tests.
#[derive(Default)]
pub struct InMemoryLedgerStore {
    records: RwLock<BTreeMap<String, AnnouncementRecord>>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn get(&self, id: &str) -> Result<Option<AnnouncementRecord>, AppError> {
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn upsert(&self, record: &AnnouncementRecord) -> Result<(), AppError> {
        self.records
            .write()
            .await
            .insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn list(&self) -> Result<Vec<AnnouncementRecord>, AppError> {
        let mut records: Vec<_> = self.records.read().await.values().cloned().collect();
        records.sort_by(|a, b| b.announced_at.cmp(&a.announced_at));
        Ok(records)
    }
}

/// Membership test + idempotent record on top of a `LedgerStore`.
#[derive(Clone)]
pub struct AnnouncementLedger {
    store: Arc<dyn LedgerStore>,
}

impl AnnouncementLedger {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    pub async fn is_announced(&self, id: &str) -> Result<bool, AppError> {
        Ok(self.store.get(id).await?.is_some())
    }

    /// Record the promotion as announced now. Repeating the call for the same id
    /// overwrites the existing record.
    pub async fn record_announced(
        &self,
        promotion: &FreePromotion,
    ) -> Result<AnnouncementRecord, AppError> {
        let record = AnnouncementRecord::from_promotion(promotion, Utc::now());
        self.store.upsert(&record).await?;

        tracing::debug!(
            promotion_id = %record.id,
            title = %record.title,
            "Promotion recorded as announced"
        );

        Ok(record)
    }

    pub async fn history(&self) -> Result<Vec<AnnouncementRecord>, AppError> {
        self.store.list().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn promo(id: &str, title: &str) -> FreePromotion {
        FreePromotion {
            id: id.to_string(),
            title: title.to_string(),
            url: format!("https://store.epicgames.com/it/p/{}", id),
            end_date: Some(Utc.with_ymd_and_hms(2024, 5, 23, 15, 0, 0).unwrap()),
        }
    }

    #[tokio::test]
    async fn test_unknown_id_is_not_announced() {
        let ledger = AnnouncementLedger::new(Arc::new(InMemoryLedgerStore::new()));
        assert!(!ledger.is_announced("missing").await.unwrap());
    }

    #[tokio::test]
    async fn test_recorded_id_is_announced() {
        let ledger = AnnouncementLedger::new(Arc::new(InMemoryLedgerStore::new()));
        let record = ledger.record_announced(&promo("A", "Hades")).await.unwrap();

        assert_eq!(record.id, "A");
        assert_eq!(record.title, "Hades");
        assert_eq!(
            record.end_date,
            Some(Utc.with_ymd_and_hms(2024, 5, 23, 15, 0, 0).unwrap())
        );
        assert!(ledger.is_announced("A").await.unwrap());
    }

    #[tokio::test]
    async fn test_record_twice_keeps_single_record() {
        let store = Arc::new(InMemoryLedgerStore::new());
        let ledger = AnnouncementLedger::new(store.clone());

        ledger.record_announced(&promo("A", "Hades")).await.unwrap();
        ledger
            .record_announced(&promo("A", "Hades (GOTY)"))
            .await
            .unwrap();

        assert_eq!(store.len().await, 1);
        let history = ledger.history().await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].title, "Hades (GOTY)");
    }

    #[tokio::test]
    async fn test_history_newest_first() {
        let store = Arc::new(InMemoryLedgerStore::new());
        let old = AnnouncementRecord {
            id: "old".to_string(),
            title: "Old".to_string(),
            announced_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            end_date: None,
        };
        let new = AnnouncementRecord {
            id: "new".to_string(),
            title: "New".to_string(),
            announced_at: Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(),
            end_date: None,
        };
        store.upsert(&old).await.unwrap();
        store.upsert(&new).await.unwrap();

        let ids: Vec<_> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["new", "old"]);
    }
}
