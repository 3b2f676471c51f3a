//! State store for oa-harvest
//!
//! Three independently keyed SQLite key-value stores live in the data
//! directory, one file each:
//! - `entries` - id → [`HarvestRecord`](crate::types::HarvestRecord)
//! - `doi` - DOI → id
//! - `fail` - id → [`FailureRecord`](crate::types::FailureRecord)
//!
//! ## Single writer
//!
//! Every write method takes `&mut StateStore`, so only the task that owns the
//! store (the orchestrating task running phase 2 of each batch) can write.
//! Reads go through [`StoreReader`], a cheap clone that any task may hold.
//!
//! ## Submodules
//!
//! - [`migrations`] - open, schema creation, close, reset
//! - [`entries`] - harvest records
//! - [`identifiers`] - DOI → id mapping
//! - [`failures`] - failure records

use crate::error::StoreError;
use crate::{Error, Result};
use serde::{Serialize, de::DeserializeOwned};
use sqlx::sqlite::SqlitePool;
use std::path::PathBuf;

mod entries;
mod failures;
mod identifiers;
mod migrations;

/// Name of the harvest-record store
pub const ENTRIES_STORE: &str = "entries";
/// Name of the DOI → id store
pub const DOI_STORE: &str = "doi";
/// Name of the failure store
pub const FAIL_STORE: &str = "fail";

/// Row counts of the three stores
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Harvest records
    pub entries: u64,
    /// DOI mappings
    pub identifiers: u64,
    /// Failure records
    pub failures: u64,
}

/// Read-only handle on the state store, safe to clone into any task
#[derive(Clone)]
pub struct StoreReader {
    entries: SqlitePool,
    doi: SqlitePool,
    fail: SqlitePool,
}

/// Owning handle on the state store; the only way to write
pub struct StateStore {
    reader: StoreReader,
    data_dir: PathBuf,
}

impl StateStore {
    /// Read-only handle sharing the same pools
    pub fn reader(&self) -> StoreReader {
        self.reader.clone()
    }

    /// Directory holding the three store files
    pub fn data_dir(&self) -> &std::path::Path {
        &self.data_dir
    }
}

impl std::ops::Deref for StateStore {
    type Target = StoreReader;

    fn deref(&self) -> &StoreReader {
        &self.reader
    }
}

impl StoreReader {
    /// Row counts of the three stores
    pub async fn stats(&self) -> Result<StoreStats> {
        Ok(StoreStats {
            entries: count(&self.entries, ENTRIES_STORE).await?,
            identifiers: count(&self.doi, DOI_STORE).await?,
            failures: count(&self.fail, FAIL_STORE).await?,
        })
    }
}

async fn count(pool: &SqlitePool, store: &'static str) -> Result<u64> {
    let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM kv")
        .fetch_one(pool)
        .await
        .map_err(|e| query_failed(store, "count", e))?;
    Ok(n as u64)
}

async fn get_raw(pool: &SqlitePool, store: &'static str, key: &str) -> Result<Option<String>> {
    sqlx::query_scalar("SELECT value FROM kv WHERE key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await
        .map_err(|e| query_failed(store, "get", e))
}

async fn get_json<T: DeserializeOwned>(
    pool: &SqlitePool,
    store: &'static str,
    key: &str,
) -> Result<Option<T>> {
    match get_raw(pool, store, key).await? {
        Some(raw) => decode(store, key, &raw).map(Some),
        None => Ok(None),
    }
}

fn decode<T: DeserializeOwned>(store: &'static str, key: &str, raw: &str) -> Result<T> {
    serde_json::from_str(raw).map_err(|e| {
        Error::Store(StoreError::Corrupt {
            store,
            key: key.to_string(),
            reason: e.to_string(),
        })
    })
}

/// Upsert many values in one transaction.
async fn put_many<T: Serialize>(
    pool: &SqlitePool,
    store: &'static str,
    items: &[(String, &T)],
) -> Result<()> {
    if items.is_empty() {
        return Ok(());
    }
    let now = chrono::Utc::now().timestamp();
    let mut tx = pool
        .begin()
        .await
        .map_err(|e| query_failed(store, "begin transaction", e))?;

    for (key, value) in items {
        let raw = serde_json::to_string(value)?;
        sqlx::query(
            r#"
            INSERT INTO kv (key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(raw)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| query_failed(store, "put", e))?;
    }

    tx.commit()
        .await
        .map_err(|e| query_failed(store, "commit", e))?;
    Ok(())
}

fn query_failed(store: &'static str, operation: &str, e: sqlx::Error) -> Error {
    Error::Store(StoreError::QueryFailed(format!(
        "{} on {}: {}",
        operation, store, e
    )))
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
