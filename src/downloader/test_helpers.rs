//! Shared test helpers for creating Harvester instances in tests.

use crate::config::Config;
use crate::downloader::Harvester;
use crate::error::FetchError;
use crate::fetch::PublisherApi;
use crate::publisher::Publisher;
use crate::types::Event;
use async_trait::async_trait;
use flate2::Compression;
use flate2::write::GzEncoder;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::tempdir;

/// Config with every directory inside `root` and no waiting between redirects.
pub(crate) fn test_config(root: &Path) -> Config {
    let mut config = Config::default();
    config.persistence.data_dir = root.join("state");
    config.persistence.working_dir = root.join("tmp");
    config.storage.local_mirror_dir = root.join("mirror");
    config.harvest.concurrency = Some(4);
    config.harvest.batch_size = 10;
    config.harvest.redirect_backoff = Duration::ZERO;
    config.harvest.task_timeout = Duration::from_secs(5);
    config
}

/// Create a harvester over a fresh temp dir.
/// Returns the harvester and the tempdir (which must be kept alive).
pub(crate) async fn create_test_harvester() -> (Harvester, tempfile::TempDir) {
    let temp_dir = tempdir().unwrap();
    let harvester = Harvester::new(test_config(temp_dir.path()), None)
        .await
        .unwrap();
    (harvester, temp_dir)
}

/// One metadata line with an open-access observation listing `urls` as generic locations.
pub(crate) fn record_line(doi: &str, urls: &[String]) -> String {
    let locations: Vec<serde_json::Value> = urls
        .iter()
        .map(|url| {
            serde_json::json!({
                "url_for_pdf": url,
                "repository_normalized": null,
                "host_type": "publisher",
                "is_best": false
            })
        })
        .collect();
    serde_json::json!({
        "doi": doi,
        "bso_classification": "physics",
        "publisher_normalized": "Example Press",
        "title": format!("Paper {}", doi),
        "oa_details": {
            "2020": {"is_oa": false, "oa_locations": []},
            "2021": {"is_oa": true, "oa_locations": locations}
        }
    })
    .to_string()
}

/// Write a gzip JSONL dump.
pub(crate) fn write_dump(dir: &Path, lines: &[String]) -> PathBuf {
    let path = dir.join("dump.jsonl.gz");
    let mut encoder = GzEncoder::new(std::fs::File::create(&path).unwrap(), Compression::default());
    for line in lines {
        writeln!(encoder, "{}", line).unwrap();
    }
    encoder.finish().unwrap();
    path
}

/// Drain every event received so far.
pub(crate) fn drain(rx: &mut tokio::sync::broadcast::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Publisher API double writing a fixed body
pub(crate) struct FakePublisherApi {
    pub(crate) body: Vec<u8>,
    pub(crate) calls: AtomicUsize,
}

impl FakePublisherApi {
    pub(crate) fn new(body: &[u8]) -> Arc<Self> {
        Arc::new(Self {
            body: body.to_vec(),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl PublisherApi for FakePublisherApi {
    async fn download(&self, _doi: &str, dest: &Path) -> Result<(u16, String), FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::fs::write(dest, &self.body).await?;
        Ok((200, "wiley".to_string()))
    }

    fn publisher(&self) -> Publisher {
        Publisher::Wiley
    }
}
