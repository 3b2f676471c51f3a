//! Download strategies
//!
//! Each candidate URL is handled by one [`Strategy`], chosen from the URL's
//! source signature:
//! - [`Strategy::Arxiv`] rewrites arXiv URLs to the PDF mirror held in the
//!   blob store (only when a blob store and arXiv container are configured)
//! - [`Strategy::Publisher`] calls an authenticated publisher API for URLs
//!   hosted by a configured publisher
//! - [`Strategy::Generic`] fetches over HTTP, following interstitial pages
//!
//! [`Fetcher::download_one`] walks the candidates in order and stops at the
//! first attempt that succeeds. Attempts share one deadline budget; waiting
//! for a publisher throttle slot happens outside it.

pub mod arxiv;
pub mod generic;
pub mod tdm;
pub mod validate;

pub use arxiv::arxiv_mirror_path;
pub use generic::{GenericFetcher, find_redirect};
pub use tdm::{PublisherApi, TdmClient};
pub use validate::{ContentCheck, PDF_MAGIC, sniff_file};

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::error::FetchError;
use crate::publisher::Publisher;
use crate::storage::BlobStore;
use crate::types::ResultCode;

/// How one candidate URL is downloaded
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Strategy {
    /// Blob-store arXiv mirror
    Arxiv,
    /// Authenticated publisher API
    Publisher(Publisher),
    /// Plain HTTP fetch
    Generic,
}

impl Strategy {
    /// Name recorded as `harvester_used`
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Arxiv => "arxiv",
            Strategy::Publisher(p) => p.name(),
            Strategy::Generic => "standard",
        }
    }
}

/// Result of walking all candidates of one entry
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// A strategy wrote the file
    Succeeded {
        /// Strategy that succeeded
        harvester: String,
        /// URL that succeeded
        url: String,
    },
    /// No candidate produced a file
    Failed {
        /// `Exhausted` once every candidate failed, otherwise `Timeout` or `NoCandidate`
        code: ResultCode,
        /// Last URL attempted
        attempted_url: Option<String>,
        /// Reason the last attempt failed
        last_attempt: Option<ResultCode>,
    },
}

/// Strategy dispatcher shared by all download tasks
#[derive(Clone)]
pub struct Fetcher {
    generic: GenericFetcher,
    blob_store: Option<Arc<dyn BlobStore>>,
    arxiv_container: Option<String>,
    publishers: HashMap<Publisher, Arc<dyn PublisherApi>>,
}

impl Fetcher {
    /// Create a dispatcher with only the generic strategy enabled
    pub fn new(generic: GenericFetcher) -> Self {
        Self {
            generic,
            blob_store: None,
            arxiv_container: None,
            publishers: HashMap::new(),
        }
    }

    /// Enable the arXiv mirror strategy.
    pub fn with_arxiv_mirror(mut self, store: Arc<dyn BlobStore>, container: String) -> Self {
        self.blob_store = Some(store);
        self.arxiv_container = Some(container);
        self
    }

    /// Enable a publisher API strategy.
    pub fn with_publisher(mut self, client: Arc<dyn PublisherApi>) -> Self {
        self.publishers.insert(client.publisher(), client);
        self
    }

    /// Publishers with an enabled API strategy
    pub fn publishers(&self) -> Vec<Publisher> {
        let mut enabled: Vec<Publisher> = self.publishers.keys().copied().collect();
        enabled.sort_by_key(|p| p.name());
        enabled
    }

    /// Strategy used for a URL
    pub fn select_strategy(&self, url: &str) -> Strategy {
        if self.blob_store.is_some()
            && self.arxiv_container.is_some()
            && arxiv_mirror_path(url).is_some()
        {
            return Strategy::Arxiv;
        }
        match Publisher::from_url(url) {
            Some(p) if self.publishers.contains_key(&p) => Strategy::Publisher(p),
            _ => Strategy::Generic,
        }
    }

    async fn attempt(
        &self,
        strategy: Strategy,
        url: &str,
        doi: &str,
        dest: &Path,
    ) -> Result<String, FetchError> {
        match strategy {
            Strategy::Arxiv => {
                let (Some(store), Some(container)) = (&self.blob_store, &self.arxiv_container)
                else {
                    return Err(FetchError::RequestFailure {
                        url: url.to_string(),
                        status: None,
                        reason: "arXiv mirror not configured".to_string(),
                    });
                };
                arxiv::fetch_from_mirror(store.as_ref(), container, url, dest).await?;
                Ok(strategy.name().to_string())
            }
            Strategy::Publisher(p) => {
                let client = self.publishers.get(&p).ok_or_else(|| FetchError::RequestFailure {
                    url: url.to_string(),
                    status: None,
                    reason: format!("no {} client configured", p),
                })?;
                let (status, source) = client.download(doi, dest).await?;
                tracing::debug!(doi = %doi, status, source = %source, "Publisher API download");
                Ok(source)
            }
            Strategy::Generic => {
                self.generic.fetch(url, dest).await?;
                Ok(strategy.name().to_string())
            }
        }
    }

    /// Try each candidate in order, stopping at the first success.
    ///
    /// Attempt failures are logged and the next candidate is tried. The
    /// entry fails with [`ResultCode::Exhausted`] once every candidate has
    /// failed, keeping the last attempt's code alongside.
    ///
    /// `budget` bounds the time spent inside attempts. Throttle waits before
    /// a publisher API request are not charged to it. When the budget runs
    /// out the entry fails with [`ResultCode::Timeout`] and the remaining
    /// candidates are not tried.
    pub async fn download_one(
        &self,
        urls: &[String],
        doi: &str,
        dest: &Path,
        budget: Duration,
    ) -> DownloadOutcome {
        let mut remaining = budget;
        let mut last: Option<(String, ResultCode)> = None;

        for url in urls {
            let strategy = self.select_strategy(url);
            tracing::debug!(doi = %doi, url = %url, strategy = strategy.name(), "Attempting download");

            if let Strategy::Publisher(p) = strategy
                && let Some(client) = self.publishers.get(&p)
            {
                client.wait_for_slot().await;
            }

            let started = Instant::now();
            let result = tokio::time::timeout(remaining, self.attempt(strategy, url, doi, dest))
                .await
                .unwrap_or_else(|_| Err(FetchError::Timeout(budget)));
            remaining = remaining.saturating_sub(started.elapsed());

            match result {
                Ok(harvester) => {
                    return DownloadOutcome::Succeeded {
                        harvester,
                        url: url.clone(),
                    };
                }
                Err(FetchError::Timeout(limit)) => {
                    tracing::warn!(
                        doi = %doi,
                        url = %url,
                        strategy = strategy.name(),
                        timeout_secs = limit.as_secs_f64(),
                        "Download task timed out"
                    );
                    return DownloadOutcome::Failed {
                        code: ResultCode::Timeout,
                        attempted_url: Some(url.clone()),
                        last_attempt: last.map(|(_, code)| code),
                    };
                }
                Err(e) => {
                    tracing::warn!(
                        doi = %doi,
                        url = %url,
                        strategy = strategy.name(),
                        error = %e,
                        "Download attempt failed"
                    );
                    last = Some((url.clone(), e.result_code()));
                }
            }
        }

        match last {
            Some((url, code)) => DownloadOutcome::Failed {
                code: ResultCode::Exhausted,
                attempted_url: Some(url),
                last_attempt: Some(code),
            },
            None => DownloadOutcome::Failed {
                code: ResultCode::NoCandidate,
                attempted_url: None,
                last_attempt: None,
            },
        }
    }
}
