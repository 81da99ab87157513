// src/store/mod.rs

//! Persistence gateway for normalized records.
//!
//! Upserts deduplicate by each record's natural key and merge on
//! conflict, preferring the newer fetch's non-empty values: a populated
//! stored field is never overwritten by an empty one. The gateway is
//! append/merge-only and issues no deletes.

pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::Result;
use crate::models::{Confidence, NormalizationOutcome, PageType, Record};

// Re-export for convenience
pub use sqlite::SqliteStore;

/// Row identity assigned by the storage backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistedId(pub i64);

/// Filters accepted by `query`.
#[derive(Debug, Default, Clone)]
pub struct QueryFilter {
    pub page_type: Option<PageType>,
    /// Substring match against the stored payload (organization, title…)
    pub contains: Option<String>,
}

/// A record read back from storage.
#[derive(Debug, Clone)]
pub struct StoredRecord {
    pub id: i64,
    pub record: Record,
    pub confidence: Confidence,
    pub updated_at: DateTime<Utc>,
}

/// Trait for record storage backends.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert or merge one record; idempotent per natural key.
    async fn upsert(&self, outcome: &NormalizationOutcome) -> Result<PersistedId>;

    /// Upsert a batch inside a single transaction, all-or-nothing.
    async fn upsert_batch(&self, outcomes: &[NormalizationOutcome]) -> Result<Vec<PersistedId>>;

    /// Read back records, newest first.
    async fn query(&self, filter: &QueryFilter, limit: u32) -> Result<Vec<StoredRecord>>;

    /// Look up one record by its natural key.
    async fn find_by_natural_key(&self, key: &str) -> Result<Option<StoredRecord>>;

    /// Look up the newest record fetched from a URL (304 reuse path).
    async fn find_by_source_url(&self, url: &str) -> Result<Option<StoredRecord>>;
}

/// Field-wise JSON merge preferring the fresh value unless it is empty.
pub(crate) fn merge_preferring_non_empty(stored: &Value, fresh: &Value) -> Value {
    match (stored, fresh) {
        (Value::Object(old), Value::Object(new)) => {
            let mut out = old.clone();
            for (key, value) in new {
                let merged = match out.get(key) {
                    Some(existing) => merge_preferring_non_empty(existing, value),
                    None => value.clone(),
                };
                out.insert(key.clone(), merged);
            }
            Value::Object(out)
        }
        (old, new) if is_empty_value(new) && !is_empty_value(old) => old.clone(),
        (_, new) => new.clone(),
    }
}

fn is_empty_value(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(m) => m.is_empty(),
        _ => false,
    }
}
