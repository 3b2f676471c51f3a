//! Configuration types for oa-harvest
//!
//! A [`Config`] is built once at startup (by hand or by deserializing a
//! JSON/TOML document supplied by the embedding application) and then
//! shared read-only as `Arc<Config>` by every component.

use crate::error::{Error, Result};
use crate::publisher::Publisher;
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// Download behavior (batching, concurrency, timeouts, content checks)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HarvestConfig {
    /// Entries per batch (default: 100)
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Download and archive worker pool size (default: 2 × available cores)
    #[serde(default)]
    pub concurrency: Option<usize>,

    /// Time one entry may spend downloading across all its candidates
    /// (default: 30 seconds). Waits for a publisher throttle slot are not
    /// counted.
    #[serde(default = "default_task_timeout", with = "duration_serde")]
    pub task_timeout: Duration,

    /// Maximum number of HTML redirect pages followed by the generic fetch (default: 5)
    #[serde(default = "default_redirect_max_hops")]
    pub redirect_max_hops: u32,

    /// Wait before following an HTML redirect page (default: 5 seconds)
    #[serde(default = "default_redirect_backoff", with = "duration_serde")]
    pub redirect_backoff: Duration,

    /// Expected MIME type of downloaded documents (default: "application/pdf")
    #[serde(default = "default_target_mime")]
    pub target_mime: String,

    /// Gzip artifacts before storing them
    #[serde(default)]
    pub compress: bool,

    /// Revisit DOIs that were already seen (entries with a valid PDF are still skipped)
    #[serde(default)]
    pub reprocess: bool,

    /// User agent sent by the generic fetch
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            concurrency: None,
            task_timeout: default_task_timeout(),
            redirect_max_hops: default_redirect_max_hops(),
            redirect_backoff: default_redirect_backoff(),
            target_mime: default_target_mime(),
            compress: false,
            reprocess: false,
            user_agent: default_user_agent(),
        }
    }
}

impl HarvestConfig {
    /// Effective worker pool size
    pub fn worker_count(&self) -> usize {
        self.concurrency.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get() * 2)
                .unwrap_or(4)
        })
    }
}

/// Local state locations
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Directory holding the `entries`, `doi` and `fail` stores (default: "./data/state")
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Directory for in-flight downloads and artifacts (default: "./data/tmp")
    #[serde(default = "default_working_dir")]
    pub working_dir: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            working_dir: default_working_dir(),
        }
    }
}

/// Artifact destination settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Blob-store container receiving harvested artifacts (default: "harvested_publications")
    #[serde(default = "default_container")]
    pub container: String,

    /// Container holding the arXiv PDF mirror (None disables mirror retrieval)
    #[serde(default = "default_arxiv_container")]
    pub arxiv_container: Option<String>,

    /// Local directory mirroring the blob-store layout, used when no blob store is configured
    #[serde(default = "default_mirror_dir")]
    pub local_mirror_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            container: default_container(),
            arxiv_container: default_arxiv_container(),
            local_mirror_dir: default_mirror_dir(),
        }
    }
}

/// Sliding fixed-window request limit
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ThrottleConfig {
    /// Requests allowed per window (default: 60)
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,

    /// Window length (default: 600 seconds)
    #[serde(default = "default_window", with = "duration_serde")]
    pub window: Duration,

    /// Extra wait added after a computed throttle delay (default: 1 second)
    #[serde(default = "default_padding", with = "duration_serde")]
    pub padding: Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            max_requests: default_max_requests(),
            window: default_window(),
            padding: default_padding(),
        }
    }
}

/// Credentials and limits for one publisher text-and-data-mining API
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PublisherApiConfig {
    /// Which publisher this client talks to
    pub publisher: Publisher,

    /// API token
    pub token: String,

    /// Override of the publisher's API base URL
    #[serde(default)]
    pub base_url: Option<String>,

    /// Request throttle
    #[serde(default)]
    pub throttle: ThrottleConfig,
}

/// Main configuration for [`Harvester`](crate::Harvester)
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Download behavior
    #[serde(default)]
    pub harvest: HarvestConfig,

    /// Local state locations
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// Artifact destination
    #[serde(default)]
    pub storage: StorageConfig,

    /// Publisher API integrations
    #[serde(default)]
    pub publisher_apis: Vec<PublisherApiConfig>,
}

impl Config {
    /// Reject settings that would make a run impossible.
    pub fn validate(&self) -> Result<()> {
        if self.harvest.batch_size == 0 {
            return Err(Error::Config {
                message: "batch_size must be at least 1".to_string(),
                key: Some("batch_size".to_string()),
            });
        }
        if self.harvest.concurrency == Some(0) {
            return Err(Error::Config {
                message: "concurrency must be at least 1".to_string(),
                key: Some("concurrency".to_string()),
            });
        }
        for api in &self.publisher_apis {
            if api.throttle.max_requests == 0 || api.throttle.window.is_zero() {
                return Err(Error::Config {
                    message: format!(
                        "throttle for {} needs a non-zero request limit and window",
                        api.publisher
                    ),
                    key: Some("throttle".to_string()),
                });
            }
        }
        Ok(())
    }

    /// API settings for a publisher, if that integration is configured
    pub fn publisher_api(&self, publisher: Publisher) -> Option<&PublisherApiConfig> {
        self.publisher_apis.iter().find(|p| p.publisher == publisher)
    }
}

fn default_batch_size() -> usize {
    100
}

fn default_task_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_redirect_max_hops() -> u32 {
    5
}

fn default_redirect_backoff() -> Duration {
    Duration::from_secs(5)
}

fn default_target_mime() -> String {
    "application/pdf".to_string()
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data/state")
}

fn default_working_dir() -> PathBuf {
    PathBuf::from("./data/tmp")
}

fn default_container() -> String {
    "harvested_publications".to_string()
}

fn default_arxiv_container() -> Option<String> {
    Some("arxiv_harvesting".to_string())
}

fn default_mirror_dir() -> PathBuf {
    PathBuf::from("./data/mirror")
}

fn default_max_requests() -> u32 {
    60
}

fn default_window() -> Duration {
    Duration::from_secs(600)
}

fn default_padding() -> Duration {
    Duration::from_secs(1)
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
