//! Core types for oa-harvest

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Stable identifier minted once per unique DOI (UUIDv4)
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HarvestId(pub Uuid);

impl HarvestId {
    /// Mint a fresh random identifier
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }

    /// Hyphenated lowercase form, used as store key and file stem
    pub fn as_key(&self) -> String {
        self.0.hyphenated().to_string()
    }
}

impl std::fmt::Display for HarvestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl std::str::FromStr for HarvestId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Raw publication record, one line of the metadata dump
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Entry {
    /// DOI, used as dedup key
    pub doi: String,

    /// Domain tag
    #[serde(default)]
    pub bso_classification: Option<String>,

    /// Normalized publisher name
    #[serde(default)]
    pub publisher_normalized: Option<String>,

    /// Observations keyed by snapshot date
    pub oa_details: BTreeMap<String, Observation>,

    /// Remaining fields, carried through to the metadata artifact
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// One dated observation of a publication's open-access status
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Observation {
    /// Whether the publication was open access at this snapshot
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_oa: bool,

    /// Known hosting locations
    #[serde(default, deserialize_with = "null_as_default")]
    pub oa_locations: Vec<CandidateLocation>,
}

/// One known hosting location for a publication's PDF
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateLocation {
    /// Direct PDF link, absent for landing-page-only locations
    #[serde(default)]
    pub url_for_pdf: Option<String>,

    /// Normalized repository name (e.g. "arXiv", "HAL")
    #[serde(default)]
    pub repository_normalized: Option<String>,

    /// "repository" or "publisher"
    #[serde(default)]
    pub host_type: Option<String>,

    /// Whether the source marked this location as the best one
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_best: bool,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A stored artifact belonging to a harvested entry
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    /// Resource kind ("pdf")
    pub kind: String,
    /// Sharded storage path of the artifact
    pub path: String,
    /// Hex SHA-256 of the downloaded file
    pub sha256: String,
    /// Size of the downloaded file in bytes
    pub size_bytes: u64,
}

/// Persisted outcome of a download attempt for one entry
///
/// Written once per processing of an entry, success or failure, and replaced
/// wholesale when the entry is reprocessed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HarvestRecord {
    /// Entry identifier
    pub id: HarvestId,
    /// Publication DOI
    pub doi: String,
    /// Domain tag copied from the input
    pub domain: Option<String>,
    /// Locations of the latest observation
    pub chosen_locations: Vec<CandidateLocation>,
    /// Strategy that produced the file (`None` on failure)
    pub harvester_used: Option<String>,
    /// URL that produced the file, or the last one attempted
    pub url_used: Option<String>,
    /// Whether a valid PDF was obtained
    pub valid_fulltext_pdf: bool,
    /// Stored artifacts
    pub resources: Vec<Resource>,
    /// When this record was written
    pub harvested_date: DateTime<Utc>,
}

impl HarvestRecord {
    /// True if the record lists a valid PDF, in which case the entry is never redownloaded
    /// (even when reprocessing is requested).
    pub fn has_valid_pdf(&self) -> bool {
        self.valid_fulltext_pdf
    }
}

/// Machine-readable reason for an entry failure
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultCode {
    /// Last attempt received this non-2xx HTTP status
    Http(u16),
    /// Last attempt failed before a response was received
    RequestFailure,
    /// Content did not match the expected document type
    InvalidContent,
    /// The download task exceeded its deadline
    Timeout,
    /// Local file handling failed
    IoError,
    /// The entry had no candidate URL to try
    NoCandidate,
    /// Every candidate URL was attempted and failed
    Exhausted,
}

impl std::fmt::Display for ResultCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResultCode::Http(code) => write!(f, "http_{}", code),
            ResultCode::RequestFailure => write!(f, "request_failure"),
            ResultCode::InvalidContent => write!(f, "invalid_content"),
            ResultCode::Timeout => write!(f, "timeout"),
            ResultCode::IoError => write!(f, "io_error"),
            ResultCode::NoCandidate => write!(f, "no_candidate"),
            ResultCode::Exhausted => write!(f, "exhausted"),
        }
    }
}

/// Persisted failure details, keyed by the same id as the [`HarvestRecord`]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    /// Why the entry failed
    pub result_code: ResultCode,
    /// Last URL attempted
    pub attempted_url: Option<String>,
    /// Reason the last attempt failed, when `result_code` is [`ResultCode::Exhausted`]
    #[serde(default)]
    pub last_attempt: Option<ResultCode>,
}

/// Lifecycle of one entry through a harvest run
///
/// `Discovered → {Skipped | Queued} → Downloading → {Succeeded → Uploading → Archived | Failed → Recorded}`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryState {
    /// Read from the metadata stream
    Discovered,
    /// Dropped by dedup, skip set, sampling or missing candidates (terminal)
    Skipped,
    /// Resolved and waiting in a batch
    Queued,
    /// A download task is running
    Downloading,
    /// A valid file was downloaded and recorded
    Succeeded,
    /// Artifacts are being stored
    Uploading,
    /// Artifacts are stored (terminal)
    Archived,
    /// All candidates failed or the content was invalid
    Failed,
    /// Failure has been persisted (terminal)
    Recorded,
}

/// Counters reported at the end of a harvest run
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarvestSummary {
    /// Entries in the input stream
    pub total_entries: usize,
    /// Entries handed to the download coordinator
    pub queued: usize,
    /// Entries dropped by the resolver or the sample
    pub skipped: usize,
    /// Entries with a valid PDF
    pub succeeded: usize,
    /// Entries recorded as failed
    pub failed: usize,
    /// Successful downloads whose artifacts could not be stored
    pub archive_failures: usize,
}

/// Progress events emitted during a harvest run
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Input counted, run is starting
    RunStarted {
        /// Entries in the input stream
        total_entries: usize,
    },
    /// A batch is about to be downloaded
    BatchStarted {
        /// Zero-based batch number
        index: usize,
        /// Entries in the batch
        size: usize,
    },
    /// An entry produced a valid PDF
    EntryHarvested {
        /// Entry identifier
        id: HarvestId,
        /// Strategy that produced the file
        harvester: String,
        /// URL that produced the file
        url: String,
    },
    /// An entry failed and its failure was recorded
    EntryFailed {
        /// Entry identifier
        id: HarvestId,
        /// Failure reason
        code: ResultCode,
    },
    /// An entry's artifacts were stored
    EntryArchived {
        /// Entry identifier
        id: HarvestId,
        /// Sharded storage directory
        path: String,
    },
    /// A batch finished all three phases
    BatchCompleted {
        /// Zero-based batch number
        index: usize,
        /// Input entries read so far
        processed: usize,
        /// Entries in the input stream
        total: usize,
    },
    /// The run finished
    RunCompleted {
        /// Final counters
        summary: HarvestSummary,
    },
}
