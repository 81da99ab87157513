// src/store/sqlite.rs

//! SQLite storage backend.
//!
//! Records live in one table: key columns for lookup plus the full
//! record as a JSON payload. Migrations are idempotent CREATE
//! statements run at connect time.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqlitePool, SqlitePoolOptions};
use sqlx::Row;

use crate::error::{PersistenceError, Result};
use crate::models::{Confidence, NormalizationOutcome, Record};

use super::{
    PersistedId, QueryFilter, RecordStore, StoredRecord, merge_preferring_non_empty,
};

/// SQLite-backed record store.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connect and run migrations.
    ///
    /// Accepts sqlx SQLite URLs, e.g. `sqlite://sarkari.db` or
    /// `sqlite::memory:`.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(PersistenceError::from)?
            .create_if_missing(true);

        // an in-memory database exists per connection; more than one
        // connection would each see an empty schema
        let max_connections = if database_url.contains(":memory:") {
            1
        } else {
            5
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(PersistenceError::from)?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// In-memory store for tests.
    pub async fn in_memory() -> Result<Self> {
        Self::connect("sqlite::memory:").await
    }

    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS records (
                id          INTEGER PRIMARY KEY,
                natural_key TEXT UNIQUE NOT NULL,
                page_type   TEXT NOT NULL,
                source_url  TEXT NOT NULL,
                title       TEXT,
                confidence  TEXT NOT NULL,
                payload     TEXT NOT NULL,
                fetched_at  TEXT NOT NULL,
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_records_page_type ON records(page_type);
            CREATE INDEX IF NOT EXISTS idx_records_source_url ON records(source_url);
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(PersistenceError::from)?;
        Ok(())
    }
}

/// Upsert against an open connection so single and batched writes share
/// one code path.
async fn upsert_one(
    conn: &mut SqliteConnection,
    outcome: &NormalizationOutcome,
) -> Result<PersistedId> {
    let record = &outcome.record;
    let key = record.natural_key();
    let payload = serde_json::to_value(record)?;
    let now = Utc::now().to_rfc3339();

    let existing = sqlx::query("SELECT id, payload, source_url FROM records WHERE natural_key = ?")
        .bind(&key)
        .fetch_optional(&mut *conn)
        .await
        .map_err(PersistenceError::from)?;

    match existing {
        Some(row) => {
            let id: i64 = row.get("id");
            let stored_url: String = row.get("source_url");
            if stored_url != record.source_url() {
                log::warn!(
                    "natural key '{}' seen from both {} and {}; merging into one row",
                    key,
                    stored_url,
                    record.source_url()
                );
            }

            let stored: Value = serde_json::from_str(row.get::<String, _>("payload").as_str())?;
            let merged = merge_preferring_non_empty(&stored, &payload);

            sqlx::query(
                "UPDATE records
                 SET payload = ?, title = COALESCE(?, title), confidence = ?,
                     fetched_at = ?, updated_at = ?
                 WHERE id = ?",
            )
            .bind(merged.to_string())
            .bind(record.title())
            .bind(outcome.confidence.as_str())
            .bind(record.fetched_at().to_rfc3339())
            .bind(&now)
            .bind(id)
            .execute(&mut *conn)
            .await
            .map_err(PersistenceError::from)?;

            Ok(PersistedId(id))
        }
        None => {
            let inserted = sqlx::query(
                "INSERT INTO records
                     (natural_key, page_type, source_url, title, confidence,
                      payload, fetched_at, created_at, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&key)
            .bind(record.page_type().as_str())
            .bind(record.source_url())
            .bind(record.title())
            .bind(outcome.confidence.as_str())
            .bind(payload.to_string())
            .bind(record.fetched_at().to_rfc3339())
            .bind(&now)
            .bind(&now)
            .execute(&mut *conn)
            .await
            .map_err(PersistenceError::from)?;

            Ok(PersistedId(inserted.last_insert_rowid()))
        }
    }
}

fn row_to_stored(row: &sqlx::sqlite::SqliteRow) -> Result<StoredRecord> {
    let payload: String = row.get("payload");
    let record: Record = serde_json::from_str(&payload)?;
    let confidence = row
        .get::<String, _>("confidence")
        .parse::<Confidence>()
        .unwrap_or(Confidence::Deterministic);
    let updated_at = DateTime::parse_from_rfc3339(row.get::<String, _>("updated_at").as_str())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now());

    Ok(StoredRecord {
        id: row.get("id"),
        record,
        confidence,
        updated_at,
    })
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn upsert(&self, outcome: &NormalizationOutcome) -> Result<PersistedId> {
        let mut conn = self.pool.acquire().await.map_err(PersistenceError::from)?;
        upsert_one(&mut conn, outcome).await
    }

    async fn upsert_batch(&self, outcomes: &[NormalizationOutcome]) -> Result<Vec<PersistedId>> {
        let mut tx = self.pool.begin().await.map_err(PersistenceError::from)?;
        let mut ids = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            ids.push(upsert_one(&mut tx, outcome).await?);
        }
        tx.commit().await.map_err(PersistenceError::from)?;
        Ok(ids)
    }

    async fn query(&self, filter: &QueryFilter, limit: u32) -> Result<Vec<StoredRecord>> {
        let page_type = filter.page_type.map(|pt| pt.as_str().to_string());
        let contains = filter.contains.clone();

        let rows = sqlx::query(
            "SELECT id, payload, confidence, updated_at FROM records
             WHERE (?1 IS NULL OR page_type = ?1)
               AND (?2 IS NULL OR instr(lower(payload), lower(?2)) > 0)
             ORDER BY updated_at DESC, id DESC
             LIMIT ?3",
        )
        .bind(page_type)
        .bind(contains)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(PersistenceError::from)?;

        rows.iter().map(row_to_stored).collect()
    }

    async fn find_by_natural_key(&self, key: &str) -> Result<Option<StoredRecord>> {
        let row = sqlx::query(
            "SELECT id, payload, confidence, updated_at FROM records WHERE natural_key = ?",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(PersistenceError::from)?;

        row.as_ref().map(row_to_stored).transpose()
    }

    async fn find_by_source_url(&self, url: &str) -> Result<Option<StoredRecord>> {
        let row = sqlx::query(
            "SELECT id, payload, confidence, updated_at FROM records
             WHERE source_url = ?
             ORDER BY updated_at DESC, id DESC
             LIMIT 1",
        )
        .bind(url)
        .fetch_optional(&self.pool)
        .await
        .map_err(PersistenceError::from)?;

        row.as_ref().map(row_to_stored).transpose()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::models::{
        AggregatorItem, AggregatorRecord, PageType, RecruitmentDetail,
    };

    fn outcome_for(record: Record) -> NormalizationOutcome {
        NormalizationOutcome {
            record,
            confidence: Confidence::Deterministic,
            warnings: vec![],
        }
    }

    fn recruitment(eligibility: Option<&str>) -> Record {
        Record::Recruitment(RecruitmentDetail {
            source_url: "https://example.com/up-police/".into(),
            fetched_at: Utc::now(),
            title: Some("UP Police Constable Recruitment 2026".into()),
            organization: Some("UPPRPB".into()),
            advt_no: Some("05/2026".into()),
            total_posts: Some(60244),
            vacancies: vec![],
            important_dates: vec![],
            fees: vec![],
            age_limits: vec![],
            eligibility: eligibility.map(String::from),
            selection_process: vec![],
            useful_links: vec![],
        })
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let store = SqliteStore::in_memory().await.unwrap();
        let outcome = outcome_for(recruitment(Some("12th pass")));

        let first = store.upsert(&outcome).await.unwrap();
        let second = store.upsert(&outcome).await.unwrap();
        assert_eq!(first, second);

        let all = store.query(&QueryFilter::default(), 10).await.unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn test_merge_never_clears_populated_fields() {
        let store = SqliteStore::in_memory().await.unwrap();
        store
            .upsert(&outcome_for(recruitment(Some("12th pass"))))
            .await
            .unwrap();

        // a later fetch lost the eligibility section
        store.upsert(&outcome_for(recruitment(None))).await.unwrap();

        let stored = store
            .find_by_natural_key("recruitment:upprpb|05/2026")
            .await
            .unwrap()
            .unwrap();
        let Record::Recruitment(detail) = stored.record else {
            panic!("expected recruitment");
        };
        assert_eq!(detail.eligibility.as_deref(), Some("12th pass"));
    }

    #[tokio::test]
    async fn test_batch_upsert_and_query_filter() {
        let store = SqliteStore::in_memory().await.unwrap();
        let aggregator = Record::Aggregator(AggregatorRecord {
            page_type: PageType::Jobs,
            source_url: "https://example.com/latest-jobs/".into(),
            fetched_at: Utc::now(),
            http_status: 200,
            title: Some("Latest Jobs".into()),
            items: vec![AggregatorItem {
                title: "Job A".into(),
                detail_url: "https://example.com/a/".into(),
                metadata_value: "15 January 2026".into(),
                category: "last_date".into(),
            }],
        });

        let ids = store
            .upsert_batch(&[
                outcome_for(aggregator),
                outcome_for(recruitment(Some("12th pass"))),
            ])
            .await
            .unwrap();
        assert_eq!(ids.len(), 2);

        let jobs = store
            .query(
                &QueryFilter {
                    page_type: Some(PageType::Jobs),
                    contains: None,
                },
                10,
            )
            .await
            .unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].record.page_type(), PageType::Jobs);

        let upprpb = store
            .query(
                &QueryFilter {
                    page_type: None,
                    contains: Some("upprpb".into()),
                },
                10,
            )
            .await
            .unwrap();
        assert_eq!(upprpb.len(), 1);
    }

    #[tokio::test]
    async fn test_find_by_natural_key_miss() {
        let store = SqliteStore::in_memory().await.unwrap();
        assert!(
            store
                .find_by_natural_key("recruitment:nobody|00/0000")
                .await
                .unwrap()
                .is_none()
        );
    }
}
