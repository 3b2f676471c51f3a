//! Construction and teardown of the [`Harvester`].

use std::sync::Arc;

use super::Harvester;
use crate::artifacts::ArtifactManager;
use crate::config::Config;
use crate::db::{StateStore, StoreReader};
use crate::error::{Error, Result};
use crate::fetch::{Fetcher, GenericFetcher, PublisherApi, TdmClient};
use crate::resolver::EntryResolver;
use crate::storage::{BlobStore, LocalMirror};
use crate::types::Event;

impl Harvester {
    /// Create a harvester from its configuration.
    ///
    /// This opens (or creates) the state store, creates the working
    /// directory, and builds one throttled API client per configured
    /// publisher. Without a `blob_store`, artifacts go to the local mirror and
    /// arXiv URLs are fetched over HTTP.
    pub async fn new(config: Config, blob_store: Option<Arc<dyn BlobStore>>) -> Result<Self> {
        let apis = config
            .publisher_apis
            .iter()
            .map(|api| {
                TdmClient::new(api, config.harvest.task_timeout)
                    .map(|client| Arc::new(client) as Arc<dyn PublisherApi>)
            })
            .collect::<Result<Vec<_>>>()?;

        Self::with_publisher_apis(config, blob_store, apis).await
    }

    /// Create a harvester with explicitly supplied publisher API clients.
    pub async fn with_publisher_apis(
        config: Config,
        blob_store: Option<Arc<dyn BlobStore>>,
        publisher_apis: Vec<Arc<dyn PublisherApi>>,
    ) -> Result<Self> {
        config.validate()?;

        let working_dir = &config.persistence.working_dir;
        tokio::fs::create_dir_all(working_dir).await.map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to create working directory '{}': {}",
                    working_dir.display(),
                    e
                ),
            ))
        })?;

        let store = StateStore::open(&config.persistence.data_dir).await?;

        let mut fetcher = Fetcher::new(GenericFetcher::new(&config.harvest)?);
        if let (Some(blob), Some(container)) = (&blob_store, &config.storage.arxiv_container) {
            fetcher = fetcher.with_arxiv_mirror(Arc::clone(blob), container.clone());
        }
        for api in publisher_apis {
            fetcher = fetcher.with_publisher(api);
        }

        let artifact_store: Arc<dyn BlobStore> = match blob_store {
            Some(store) => store,
            None => Arc::new(LocalMirror::new(config.storage.local_mirror_dir.clone())),
        };
        tracing::info!(
            storage = artifact_store.name(),
            container = %config.storage.container,
            publishers = ?fetcher.publishers(),
            workers = config.harvest.worker_count(),
            "Harvester initialized"
        );

        let artifacts = ArtifactManager::new(
            artifact_store,
            config.storage.container.clone(),
            config.harvest.compress,
        );
        let resolver = EntryResolver::new(working_dir, fetcher.publishers());

        // Create broadcast channel with buffer size of 1000 events
        let (event_tx, _rx) = tokio::sync::broadcast::channel(1000);

        Ok(Self {
            config: Arc::new(config),
            store,
            fetcher,
            artifacts,
            resolver,
            event_tx,
        })
    }

    /// Subscribe to progress events
    ///
    /// Multiple subscribers are supported. A subscriber that falls more than
    /// 1000 events behind receives `RecvError::Lagged`.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use oa_harvest::{Config, Harvester, HarvestOptions};
    /// use std::path::Path;
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let mut harvester = Harvester::new(Config::default(), None).await?;
    ///
    ///     let mut events = harvester.subscribe();
    ///     tokio::spawn(async move {
    ///         while let Ok(event) = events.recv().await {
    ///             tracing::info!(?event, "harvest event");
    ///         }
    ///     });
    ///
    ///     harvester
    ///         .harvest(Path::new("dump.jsonl.gz"), HarvestOptions::default())
    ///         .await?;
    ///     Ok(())
    /// }
    /// ```
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Current configuration
    pub fn config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Read-only handle on the state store
    pub fn reader(&self) -> StoreReader {
        self.store.reader()
    }

    /// Emit an event to all subscribers; dropped silently when nobody listens.
    pub(crate) fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }

    /// Close the state store.
    pub async fn close(self) {
        self.store.close().await;
    }

    /// Destroy all local state: the three stores and the working directory.
    ///
    /// Irreversible. Consumes the harvester so nothing can use the store
    /// afterwards.
    pub async fn reset(self) -> Result<()> {
        let working_dir = self.config.persistence.working_dir.clone();
        self.store.reset().await?;

        if let Err(e) = tokio::fs::remove_dir_all(&working_dir).await
            && e.kind() != std::io::ErrorKind::NotFound
        {
            return Err(e.into());
        }
        tracing::warn!(working_dir = %working_dir.display(), "Harvest state reset");
        Ok(())
    }
}
