//! DOI → id mapping (`doi` store).
//!
//! A mapping is created once per unique DOI and never changes afterwards.

use crate::Result;
use crate::types::HarvestId;

use super::{DOI_STORE, StateStore, StoreReader, decode, get_raw, query_failed};

impl StoreReader {
    /// Look up the id minted for a DOI
    pub async fn lookup_doi(&self, doi: &str) -> Result<Option<HarvestId>> {
        match get_raw(&self.doi, DOI_STORE, doi).await? {
            Some(raw) => decode(DOI_STORE, doi, &raw).map(Some),
            None => Ok(None),
        }
    }
}

impl StateStore {
    /// Persist `doi → id` unless the DOI is already mapped.
    ///
    /// Returns the id that is mapped after the call: `id` if it was inserted,
    /// the existing id otherwise.
    pub async fn insert_doi(&mut self, doi: &str, id: HarvestId) -> Result<HarvestId> {
        let pool = &self.reader.doi;
        let mut tx = pool
            .begin()
            .await
            .map_err(|e| query_failed(DOI_STORE, "begin transaction", e))?;

        sqlx::query(
            r#"
            INSERT INTO kv (key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO NOTHING
            "#,
        )
        .bind(doi)
        .bind(serde_json::to_string(&id)?)
        .bind(chrono::Utc::now().timestamp())
        .execute(&mut *tx)
        .await
        .map_err(|e| query_failed(DOI_STORE, "insert", e))?;

        let raw: String = sqlx::query_scalar("SELECT value FROM kv WHERE key = ?")
            .bind(doi)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| query_failed(DOI_STORE, "read back", e))?;

        tx.commit()
            .await
            .map_err(|e| query_failed(DOI_STORE, "commit", e))?;

        decode(DOI_STORE, doi, &raw)
    }
}
