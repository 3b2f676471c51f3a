//! The harvest run loop.

use std::collections::HashSet;
use std::path::Path;

use super::Harvester;
use crate::error::Result;
use crate::metadata::{EntryFilter, MetadataStream, count_entries};
use crate::sampler::SampleWindow;
use crate::types::{EntryState, Event, HarvestSummary};

/// Deterministic sample of the stream
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SampleSpec {
    /// Number of entries to keep; must be below the number of input records
    pub size: usize,
    /// Generator seed
    pub seed: u64,
}

/// Per-run options
#[derive(Default)]
pub struct HarvestOptions {
    /// Only process a seeded sample of the stream.
    ///
    /// Entries are resolved before the sample is drawn, so an entry left out
    /// of the sample still has its DOI mapped to a new id. Later runs over
    /// the same dump skip it as already seen unless
    /// [`HarvestConfig::reprocess`](crate::config::HarvestConfig::reprocess)
    /// is set.
    pub sample: Option<SampleSpec>,
    /// DOIs to drop without touching the store
    pub skip_set: HashSet<String>,
    /// Only entries accepted by this predicate are considered
    pub filter: Option<EntryFilter>,
}

impl Harvester {
    /// Harvest every entry of a metadata dump.
    ///
    /// Batches are read, downloaded, recorded and archived strictly one after
    /// the other. Entry failures are recorded in the store and counted in the
    /// summary; only a missing input, an invalid sample or a state store
    /// failure stops the run.
    ///
    /// # Errors
    /// - [`Error::NotFound`](crate::Error::NotFound) if `input` does not exist
    /// - [`Error::SampleRange`](crate::Error::SampleRange) if the sample size is
    ///   not strictly between zero and the number of records
    pub async fn harvest(&mut self, input: &Path, options: HarvestOptions) -> Result<HarvestSummary> {
        let total = count_entries(input).await?;
        let mut window = options
            .sample
            .map(|s| SampleWindow::new(s.size, total, s.seed))
            .transpose()?;

        let mut stream = MetadataStream::open(input, self.resolver.clone(), self.config.harvest.batch_size)?
            .with_reprocess(self.config.harvest.reprocess)
            .with_skip_set(options.skip_set);
        if let Some(filter) = options.filter {
            stream = stream.with_filter(filter);
        }

        tracing::info!(
            input = %input.display(),
            total_entries = total,
            sample = ?options.sample,
            reprocess = self.config.harvest.reprocess,
            "Starting harvest"
        );
        self.emit_event(Event::RunStarted {
            total_entries: total,
        });

        let mut summary = HarvestSummary {
            total_entries: total,
            ..HarvestSummary::default()
        };
        let mut sampled_out = 0;
        let mut index = 0;

        while let Some(batch) = stream.next_batch(&mut self.store).await? {
            let batch = match window.as_mut() {
                Some(window) => {
                    let read = batch.len();
                    let kept = window.apply_to_batch(batch);
                    tracing::debug!(
                        batch = index,
                        count = read - kept.len(),
                        state = ?EntryState::Skipped,
                        "Entries outside the sample"
                    );
                    sampled_out += read - kept.len();
                    kept
                }
                None => batch,
            };

            if !batch.is_empty() {
                let report = self.process_batch(index, batch).await?;
                summary.queued += report.queued;
                summary.succeeded += report.succeeded;
                summary.failed += report.failed;
                summary.archive_failures += report.archive_failures;

                tracing::info!(
                    batch = index,
                    processed = stream.lines_read(),
                    total,
                    succeeded = report.succeeded,
                    failed = report.failed,
                    "Batch completed"
                );
                self.emit_event(Event::BatchCompleted {
                    index,
                    processed: stream.lines_read(),
                    total,
                });
                index += 1;
            }

            if window.as_ref().is_some_and(|w| w.is_exhausted()) {
                tracing::debug!("Sample exhausted, stopping stream");
                break;
            }
        }

        summary.skipped = stream.skipped() + sampled_out;
        tracing::info!(
            succeeded = summary.succeeded,
            skipped = summary.skipped,
            archive_failures = summary.archive_failures,
            "failed {} / {}",
            summary.failed,
            summary.total_entries
        );
        self.emit_event(Event::RunCompleted {
            summary: summary.clone(),
        });

        Ok(summary)
    }
}
