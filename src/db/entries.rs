//! Harvest records (`entries` store).

use crate::Result;
use crate::types::{FailureRecord, HarvestId, HarvestRecord};

use super::{ENTRIES_STORE, FAIL_STORE, StateStore, StoreReader, get_json, put_many};

impl StoreReader {
    /// Fetch the harvest record stored for an id
    pub async fn get_entry(&self, id: HarvestId) -> Result<Option<HarvestRecord>> {
        get_json(&self.entries, ENTRIES_STORE, &id.as_key()).await
    }

    /// True if the id already has a recorded valid PDF
    pub async fn has_valid_pdf(&self, id: HarvestId) -> Result<bool> {
        Ok(self
            .get_entry(id)
            .await?
            .is_some_and(|record| record.has_valid_pdf()))
    }
}

impl StateStore {
    /// Store (or replace) one harvest record
    pub async fn put_entry(&mut self, record: &HarvestRecord) -> Result<()> {
        put_many(
            &self.reader.entries,
            ENTRIES_STORE,
            &[(record.id.as_key(), record)],
        )
        .await
    }

    /// Persist the outcome of a whole batch.
    ///
    /// Every record is written to `entries` (one transaction), and the failures
    /// to `fail` (one transaction). Records that succeeded have any stale
    /// failure from an earlier run removed.
    pub async fn record_outcomes(
        &mut self,
        outcomes: &[(HarvestRecord, Option<FailureRecord>)],
    ) -> Result<()> {
        let records: Vec<(String, &HarvestRecord)> = outcomes
            .iter()
            .map(|(record, _)| (record.id.as_key(), record))
            .collect();
        put_many(&self.reader.entries, ENTRIES_STORE, &records).await?;

        let failures: Vec<(String, &FailureRecord)> = outcomes
            .iter()
            .filter_map(|(record, failure)| failure.as_ref().map(|f| (record.id.as_key(), f)))
            .collect();
        put_many(&self.reader.fail, FAIL_STORE, &failures).await?;

        let recovered: Vec<HarvestId> = outcomes
            .iter()
            .filter(|(record, failure)| failure.is_none() && record.valid_fulltext_pdf)
            .map(|(record, _)| record.id)
            .collect();
        self.remove_failures(&recovered).await
    }
}
