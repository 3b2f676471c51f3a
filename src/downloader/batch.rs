//! Three-phase processing of one batch.

use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};

use super::Harvester;
use crate::error::Result;
use crate::fetch::{ContentCheck, DownloadOutcome, sniff_file};
use crate::resolver::ResolvedEntry;
use crate::types::{
    EntryState, Event, FailureRecord, HarvestId, HarvestRecord, Resource, ResultCode,
};
use crate::utils::{remove_if_empty, remove_quietly, sha256_file};

/// Counters for one processed batch
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Entries downloaded
    pub queued: usize,
    /// Entries with a valid PDF
    pub succeeded: usize,
    /// Entries recorded as failed
    pub failed: usize,
    /// Successful entries whose artifacts could not be stored
    pub archive_failures: usize,
}

/// Download that passed validation, handed to phase 3
struct Harvested {
    id: HarvestId,
    pdf: PathBuf,
    metadata: serde_json::Value,
}

fn transition(id: HarvestId, state: EntryState) {
    tracing::debug!(id = %id, state = ?state, "Entry state");
}

/// Clean up after a failed entry. A download cut off by the deadline is
/// partial and always removed; otherwise only an empty file is.
async fn discard_download(id: HarvestId, dest: &Path, code: ResultCode) {
    let removed = if code == ResultCode::Timeout {
        remove_quietly(dest).await
    } else {
        remove_if_empty(dest).await.map(|_| ())
    };
    if let Err(e) = removed {
        tracing::warn!(id = %id, path = %dest.display(), error = %e, "Failed to remove download");
    }
}

impl Harvester {
    /// Download, record and archive one batch.
    ///
    /// Entry failures never abort the batch; the returned error is reserved
    /// for state store failures in phase 2.
    pub async fn process_batch(&mut self, index: usize, batch: Vec<ResolvedEntry>) -> Result<BatchReport> {
        let workers = self.config.harvest.worker_count();
        let task_timeout = self.config.harvest.task_timeout;
        let mut report = BatchReport {
            queued: batch.len(),
            ..BatchReport::default()
        };

        tracing::info!(batch = index, size = batch.len(), workers, "Downloading batch");
        self.emit_event(Event::BatchStarted {
            index,
            size: batch.len(),
        });

        // Phase 1: bounded concurrent downloads
        let fetcher = &self.fetcher;
        let downloads: Vec<(ResolvedEntry, DownloadOutcome)> = stream::iter(batch)
            .map(|entry| async move {
                transition(entry.id(), EntryState::Downloading);
                let outcome = fetcher
                    .download_one(&entry.urls, &entry.record.doi, &entry.dest_path, task_timeout)
                    .await;
                (entry, outcome)
            })
            .buffer_unordered(workers)
            .collect()
            .await;

        // Phase 2: validation and state writes, single task
        let target_mime = self.config.harvest.target_mime.clone();
        let mut outcomes = Vec::with_capacity(downloads.len());
        let mut harvested = Vec::new();
        let mut events = Vec::with_capacity(downloads.len());

        for (entry, outcome) in downloads {
            let id = entry.id();
            let (harvester_used, url_used, result, last_attempt) = match outcome {
                DownloadOutcome::Succeeded { harvester, url } => {
                    let checked = self.validate_download(&entry, &target_mime).await;
                    (Some(harvester), Some(url), checked, None)
                }
                DownloadOutcome::Failed {
                    code,
                    attempted_url,
                    last_attempt,
                } => (None, attempted_url, Err(code), last_attempt),
            };

            let (resources, failure) = match result {
                Ok(resource) => (vec![resource], None),
                Err(code) => {
                    discard_download(id, &entry.dest_path, code).await;
                    (
                        Vec::new(),
                        Some(FailureRecord {
                            result_code: code,
                            attempted_url: url_used.clone(),
                            last_attempt,
                        }),
                    )
                }
            };

            match &failure {
                None => {
                    transition(id, EntryState::Succeeded);
                    events.push(Event::EntryHarvested {
                        id,
                        harvester: harvester_used.clone().unwrap_or_default(),
                        url: url_used.clone().unwrap_or_default(),
                    });
                    harvested.push(Harvested {
                        id,
                        pdf: entry.dest_path.clone(),
                        metadata: entry.record.metadata.clone(),
                    });
                }
                Some(f) => {
                    transition(id, EntryState::Failed);
                    tracing::error!(
                        id = %id,
                        doi = %entry.record.doi,
                        code = %f.result_code,
                        url = ?f.attempted_url,
                        "Entry failed"
                    );
                    events.push(Event::EntryFailed {
                        id,
                        code: f.result_code,
                    });
                }
            }

            let record = HarvestRecord {
                id,
                doi: entry.record.doi,
                domain: entry.record.domain,
                chosen_locations: entry.record.chosen_locations,
                harvester_used: failure.is_none().then_some(harvester_used).flatten(),
                url_used,
                valid_fulltext_pdf: failure.is_none(),
                resources,
                harvested_date: chrono::Utc::now(),
            };
            outcomes.push((record, failure));
        }

        self.store.record_outcomes(&outcomes).await?;
        report.succeeded = harvested.len();
        report.failed = outcomes.len() - harvested.len();
        for (record, failure) in &outcomes {
            if failure.is_some() {
                transition(record.id, EntryState::Recorded);
            }
        }
        for event in events {
            self.emit_event(event);
        }

        // Phase 3: bounded concurrent artifact storage
        let artifacts = &self.artifacts;
        let archived: Vec<(HarvestId, Result<String>)> = stream::iter(harvested)
            .map(|item| async move {
                transition(item.id, EntryState::Uploading);
                let result = artifacts.archive(item.id, &item.pdf, &item.metadata).await;
                (item.id, result)
            })
            .buffer_unordered(workers)
            .collect()
            .await;

        for (id, result) in archived {
            match result {
                Ok(path) => {
                    transition(id, EntryState::Archived);
                    self.emit_event(Event::EntryArchived { id, path });
                }
                Err(e) => {
                    report.archive_failures += 1;
                    tracing::error!(id = %id, error = %e, "Failed to store artifacts");
                }
            }
        }

        Ok(report)
    }

    /// Sniff a downloaded file and describe it as a resource.
    async fn validate_download(
        &self,
        entry: &ResolvedEntry,
        target_mime: &str,
    ) -> std::result::Result<Resource, ResultCode> {
        let id = entry.id();
        let check = match sniff_file(&entry.dest_path, target_mime).await {
            Ok(check) => check,
            Err(e) => {
                tracing::warn!(id = %id, error = %e, "Failed to read download");
                return Err(ResultCode::IoError);
            }
        };

        match check {
            ContentCheck::Valid { .. } => {}
            other => {
                tracing::warn!(
                    id = %id,
                    check = ?other,
                    expected = %target_mime,
                    "Downloaded file failed validation"
                );
                return Err(ResultCode::InvalidContent);
            }
        }

        let (sha256, size_bytes) = sha256_file(&entry.dest_path).await.map_err(|e| {
            tracing::warn!(id = %id, error = %e, "Failed to checksum download");
            ResultCode::IoError
        })?;

        Ok(Resource {
            kind: "pdf".to_string(),
            path: self.artifacts.remote_pdf_path(id),
            sha256,
            size_bytes,
        })
    }
}
