//! Failure records (`fail` store).

use crate::Result;
use crate::types::{FailureRecord, HarvestId};

use super::{FAIL_STORE, StateStore, StoreReader, decode, get_json, query_failed};

impl StoreReader {
    /// Fetch the failure recorded for an id
    pub async fn get_failure(&self, id: HarvestId) -> Result<Option<FailureRecord>> {
        get_json(&self.fail, FAIL_STORE, &id.as_key()).await
    }

    /// All recorded failures, ordered by id
    pub async fn failures(&self) -> Result<Vec<(HarvestId, FailureRecord)>> {
        let rows: Vec<(String, String)> = sqlx::query_as("SELECT key, value FROM kv ORDER BY key")
            .fetch_all(&self.fail)
            .await
            .map_err(|e| query_failed(FAIL_STORE, "list", e))?;

        rows.into_iter()
            .map(|(key, raw)| {
                let id = key.parse().map_err(|e: uuid::Error| {
                    crate::Error::Store(crate::error::StoreError::Corrupt {
                        store: FAIL_STORE,
                        key: key.clone(),
                        reason: e.to_string(),
                    })
                })?;
                Ok((id, decode(FAIL_STORE, &key, &raw)?))
            })
            .collect()
    }
}

impl StateStore {
    /// Drop failure records, used once an entry has been harvested successfully
    pub async fn remove_failures(&mut self, ids: &[HarvestId]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let mut tx = self
            .reader
            .fail
            .begin()
            .await
            .map_err(|e| query_failed(FAIL_STORE, "begin transaction", e))?;

        for id in ids {
            sqlx::query("DELETE FROM kv WHERE key = ?")
                .bind(id.as_key())
                .execute(&mut *tx)
                .await
                .map_err(|e| query_failed(FAIL_STORE, "delete", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| query_failed(FAIL_STORE, "commit", e))?;
        Ok(())
    }
}
