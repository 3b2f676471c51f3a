//! Test configuration helpers for creating harvesters over temp directories

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use oa_harvest::{BlobStore, Config, Harvester, LocalMirror};

/// Container used for harvested artifacts in tests
pub const ARTIFACT_CONTAINER: &str = "harvested";

/// Container used for the arXiv mirror in tests
pub const ARXIV_CONTAINER: &str = "arxiv_mirror";

/// Config with every directory inside `root`, no redirect backoff and a short task timeout
pub fn test_config(root: &Path) -> Config {
    let mut config = Config::default();
    config.persistence.data_dir = root.join("state");
    config.persistence.working_dir = root.join("tmp");
    config.storage.local_mirror_dir = root.join("mirror");
    config.storage.container = ARTIFACT_CONTAINER.to_string();
    config.storage.arxiv_container = Some(ARXIV_CONTAINER.to_string());
    config.harvest.batch_size = 4;
    config.harvest.concurrency = Some(4);
    config.harvest.redirect_backoff = Duration::ZERO;
    config.harvest.task_timeout = Duration::from_secs(10);
    config
}

/// Harvester over a fresh temp dir, with a local mirror standing in for the blob store.
///
/// Returns the harvester, the mirror and the tempdir (which must be kept alive).
pub async fn create_harvester_with_mirror(
    configure: impl FnOnce(&mut Config),
) -> (Harvester, Arc<LocalMirror>, TempDir) {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut config = test_config(temp_dir.path());
    configure(&mut config);

    let mirror = Arc::new(LocalMirror::new(temp_dir.path().join("blobs")));
    let store: Arc<dyn BlobStore> = mirror.clone();
    let harvester = Harvester::new(config, Some(store)).await.unwrap();
    (harvester, mirror, temp_dir)
}
