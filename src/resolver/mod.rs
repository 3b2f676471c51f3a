//! Entry resolution: raw record → ranked candidate URLs + normalized record.
//!
//! Resolution consults the state store for identity. A DOI seen for the first
//! time gets a fresh id whose mapping is persisted before anything else
//! happens to the entry, so a crash can never mint two ids for one DOI.

mod ranking;

pub use ranking::{
    RANKING_RULES, RankingRule, SourceRule, classify, closed_access_url, latest_observation,
    ranked_urls,
};

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::Result;
use crate::db::StateStore;
use crate::publisher::Publisher;
use crate::types::{CandidateLocation, Entry, EntryState, HarvestId};

/// Entry fields carried from resolution to the harvest record and metadata artifact
#[derive(Clone, Debug, PartialEq)]
pub struct NormalizedRecord {
    /// Entry identifier
    pub id: HarvestId,
    /// Publication DOI
    pub doi: String,
    /// Domain tag
    pub domain: Option<String>,
    /// Normalized publisher name
    pub publisher: Option<String>,
    /// Locations of the latest observation
    pub chosen_locations: Vec<CandidateLocation>,
    /// Full input record with the id added, written as `<id>.json`
    pub metadata: serde_json::Value,
}

/// An entry ready for download
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedEntry {
    /// Candidate URLs, most trusted first
    pub urls: Vec<String>,
    /// Normalized record
    pub record: NormalizedRecord,
    /// Where the download task writes the PDF
    pub dest_path: PathBuf,
}

impl ResolvedEntry {
    /// Entry identifier
    pub fn id(&self) -> HarvestId {
        self.record.id
    }
}

/// Why an entry was dropped
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// DOI is in the caller's skip set
    InSkipSet,
    /// No observation or no usable candidate URL
    NoCandidate,
    /// DOI already has an id and reprocessing was not requested
    AlreadySeen,
    /// Reprocessing was requested but a valid PDF is already recorded
    AlreadyHarvested,
}

/// Outcome of resolving one entry
#[derive(Clone, Debug, PartialEq)]
pub enum Resolution {
    /// Entry should be downloaded
    Resolved(ResolvedEntry),
    /// Entry is dropped; this is normal control flow, not an error
    Skip(SkipReason),
}

impl Resolution {
    /// Lifecycle state the entry moves to
    pub fn state(&self) -> EntryState {
        match self {
            Resolution::Resolved(_) => EntryState::Queued,
            Resolution::Skip(_) => EntryState::Skipped,
        }
    }
}

/// Turns raw entries into [`ResolvedEntry`]s
#[derive(Clone, Debug)]
pub struct EntryResolver {
    working_dir: PathBuf,
    publishers: Vec<Publisher>,
}

impl EntryResolver {
    /// Create a resolver writing downloads under `working_dir`.
    ///
    /// `publishers` are the API integrations that are configured; only they can
    /// turn a closed-access publication into a candidate.
    pub fn new(working_dir: &Path, publishers: Vec<Publisher>) -> Self {
        Self {
            working_dir: working_dir.to_path_buf(),
            publishers,
        }
    }

    /// Candidate URLs for an entry, from its latest observation
    pub fn candidate_urls(&self, entry: &Entry) -> Vec<String> {
        let Some((_, observation)) = latest_observation(entry) else {
            return Vec::new();
        };
        if observation.is_oa {
            ranked_urls(observation)
        } else {
            closed_access_url(entry, &self.publishers)
                .into_iter()
                .collect()
        }
    }

    /// Resolve one entry against the store.
    ///
    /// Store failures are returned as errors; every other way an entry can be
    /// dropped is a [`Resolution::Skip`].
    pub async fn resolve(
        &self,
        store: &mut StateStore,
        entry: Entry,
        reprocess: bool,
        skip_set: &HashSet<String>,
    ) -> Result<Resolution> {
        if skip_set.contains(&entry.doi) {
            return Ok(Resolution::Skip(SkipReason::InSkipSet));
        }

        let urls = self.candidate_urls(&entry);
        if urls.is_empty() {
            return Ok(Resolution::Skip(SkipReason::NoCandidate));
        }

        let id = match store.lookup_doi(&entry.doi).await? {
            None => {
                let id = store.insert_doi(&entry.doi, HarvestId::new_v4()).await?;
                tracing::debug!(doi = %entry.doi, id = %id, "Minted identifier");
                id
            }
            Some(_) if !reprocess => return Ok(Resolution::Skip(SkipReason::AlreadySeen)),
            Some(id) => {
                if store.has_valid_pdf(id).await? {
                    return Ok(Resolution::Skip(SkipReason::AlreadyHarvested));
                }
                id
            }
        };

        let chosen_locations = latest_observation(&entry)
            .map(|(_, obs)| obs.oa_locations.clone())
            .unwrap_or_default();

        let mut metadata = serde_json::to_value(&entry)?;
        if let Some(map) = metadata.as_object_mut() {
            map.insert("id".to_string(), serde_json::Value::String(id.as_key()));
        }

        Ok(Resolution::Resolved(ResolvedEntry {
            urls,
            dest_path: self.working_dir.join(format!("{}.pdf", id.as_key())),
            record: NormalizedRecord {
                id,
                doi: entry.doi,
                domain: entry.bso_classification,
                publisher: entry.publisher_normalized,
                chosen_locations,
                metadata,
            },
        }))
    }
}
