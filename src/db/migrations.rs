//! Store lifecycle: open, schema migrations, close and reset.

use crate::error::StoreError;
use crate::{Error, Result};
use sqlx::SqliteConnection;
use sqlx::sqlite::SqlitePool;
use std::path::Path;

use super::{DOI_STORE, ENTRIES_STORE, FAIL_STORE, StateStore, StoreReader};

impl StateStore {
    /// Open the three stores under `data_dir`, creating the directory and files if absent.
    pub async fn open(data_dir: &Path) -> Result<Self> {
        tokio::fs::create_dir_all(data_dir).await.map_err(|e| {
            Error::Store(StoreError::ConnectionFailed(format!(
                "Failed to create data directory '{}': {}",
                data_dir.display(),
                e
            )))
        })?;

        let reader = StoreReader {
            entries: open_store(data_dir, ENTRIES_STORE).await?,
            doi: open_store(data_dir, DOI_STORE).await?,
            fail: open_store(data_dir, FAIL_STORE).await?,
        };

        tracing::info!(data_dir = %data_dir.display(), "State store opened");

        Ok(Self {
            reader,
            data_dir: data_dir.to_path_buf(),
        })
    }

    /// Close all three stores
    pub async fn close(self) {
        self.reader.entries.close().await;
        self.reader.doi.close().await;
        self.reader.fail.close().await;
    }

    /// Close all three stores and delete the data directory.
    ///
    /// Irreversible: every record, mapping and failure is lost.
    pub async fn reset(self) -> Result<()> {
        let data_dir = self.data_dir.clone();
        self.close().await;

        match tokio::fs::remove_dir_all(&data_dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(Error::Io(e)),
        }

        tracing::warn!(data_dir = %data_dir.display(), "State store reset");
        Ok(())
    }
}

async fn open_store(data_dir: &Path, name: &'static str) -> Result<SqlitePool> {
    use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode};

    let options = SqliteConnectOptions::new()
        .filename(data_dir.join(format!("{}.sqlite", name)))
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal);

    let pool = SqlitePool::connect_with(options).await.map_err(|e| {
        Error::Store(StoreError::ConnectionFailed(format!(
            "Failed to open {} store: {}",
            name, e
        )))
    })?;

    run_migrations(&pool, name).await?;
    Ok(pool)
}

async fn run_migrations(pool: &SqlitePool, name: &'static str) -> Result<()> {
    let mut conn = pool.acquire().await.map_err(|e| {
        Error::Store(StoreError::ConnectionFailed(format!(
            "Failed to acquire connection for {}: {}",
            name, e
        )))
    })?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(&mut *conn)
    .await
    .map_err(|e| migration_failed(name, "create schema_version table", e))?;

    let current_version: Option<i64> =
        sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
            .fetch_one(&mut *conn)
            .await
            .map_err(|e| migration_failed(name, "query schema version", e))?;

    if current_version.unwrap_or(0) < 1 {
        migrate_v1(&mut conn, name).await?;
    }

    Ok(())
}

/// Migration v1: key-value table
async fn migrate_v1(conn: &mut SqliteConnection, name: &'static str) -> Result<()> {
    tracing::debug!(store = name, "Applying store migration v1");

    sqlx::query("BEGIN")
        .execute(&mut *conn)
        .await
        .map_err(|e| migration_failed(name, "begin transaction", e))?;

    let result = async {
        sqlx::query(
            r#"
            CREATE TABLE kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&mut *conn)
        .await
        .map_err(|e| migration_failed(name, "create kv table", e))?;

        sqlx::query("INSERT INTO schema_version (version, applied_at) VALUES (1, ?)")
            .bind(chrono::Utc::now().timestamp())
            .execute(&mut *conn)
            .await
            .map_err(|e| migration_failed(name, "record migration", e))?;

        Ok::<(), Error>(())
    }
    .await;

    match result {
        Ok(()) => {
            sqlx::query("COMMIT")
                .execute(&mut *conn)
                .await
                .map_err(|e| migration_failed(name, "commit migration v1", e))?;
        }
        Err(e) => {
            let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
            return Err(e);
        }
    }

    Ok(())
}

fn migration_failed(name: &str, what: &str, e: sqlx::Error) -> Error {
    Error::Store(StoreError::MigrationFailed(format!(
        "Failed to {} in {} store: {}",
        what, name, e
    )))
}
