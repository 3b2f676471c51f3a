//! Artifact management for successful downloads
//!
//! For each harvested id the manager writes `<id>.json` next to the PDF,
//! optionally gzips both files, and uploads them under the sharded directory
//! `ab/cd/ef/gh/<id>/` of the target container. Local files are removed
//! afterwards whether or not the upload worked.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::storage::{BlobStore, UploadItem};
use crate::types::HarvestId;
use crate::utils::{gzip_file, remove_quietly, sharded_path};

/// Stores the artifacts of harvested entries
#[derive(Clone)]
pub struct ArtifactManager {
    store: Arc<dyn BlobStore>,
    container: String,
    compress: bool,
}

impl ArtifactManager {
    /// Create a manager uploading into `container`
    pub fn new(store: Arc<dyn BlobStore>, container: impl Into<String>, compress: bool) -> Self {
        Self {
            store,
            container: container.into(),
            compress,
        }
    }

    /// Remote directory of an id
    pub fn remote_dir(id: HarvestId) -> String {
        sharded_path(&id.as_key())
    }

    /// Remote path the PDF of an id is stored under
    pub fn remote_pdf_path(&self, id: HarvestId) -> String {
        let suffix = if self.compress { ".gz" } else { "" };
        format!("{}/{}.pdf{}", Self::remote_dir(id), id.as_key(), suffix)
    }

    /// Store the PDF and metadata of one entry. Returns the remote directory.
    ///
    /// Local files (`pdf`, the metadata file and their `.gz` variants) are
    /// removed before returning, on success and on failure.
    pub async fn archive(
        &self,
        id: HarvestId,
        pdf: &Path,
        metadata: &serde_json::Value,
    ) -> Result<String> {
        let json = pdf.with_file_name(format!("{}.json", id.as_key()));
        let result = self.store_files(id, pdf, &json, metadata).await;

        for path in [pdf.to_path_buf(), json.clone(), gz_path(pdf), gz_path(&json)] {
            if let Err(e) = remove_quietly(&path).await {
                tracing::warn!(id = %id, path = %path.display(), error = %e, "Failed to remove local artifact");
            }
        }

        result
    }

    async fn store_files(
        &self,
        id: HarvestId,
        pdf: &Path,
        json: &Path,
        metadata: &serde_json::Value,
    ) -> Result<String> {
        tokio::fs::write(json, serde_json::to_vec_pretty(metadata)?).await?;

        let (pdf, json) = if self.compress {
            (gzip_file(pdf).await?, gzip_file(json).await?)
        } else {
            (pdf.to_path_buf(), json.to_path_buf())
        };

        let dir = Self::remote_dir(id);
        let items: Vec<UploadItem> = [pdf, json]
            .into_iter()
            .filter_map(|local| {
                let name = local.file_name()?.to_string_lossy().into_owned();
                Some((local, format!("{}/{}", dir, name)))
            })
            .collect();

        let failures: Vec<String> = self
            .store
            .upload(&self.container, &items)
            .await
            .into_iter()
            .zip(&items)
            .filter_map(|(result, (_, remote))| {
                result.err().map(|e| format!("{}: {}", remote, e))
            })
            .collect();

        if !failures.is_empty() {
            return Err(Error::Storage(format!(
                "{} upload to {} failed: {}",
                self.store.name(),
                self.container,
                failures.join("; ")
            )));
        }

        tracing::debug!(id = %id, container = %self.container, dir = %dir, "Artifacts stored");
        Ok(dir)
    }
}

fn gz_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".gz");
    PathBuf::from(name)
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LocalMirror;
    use async_trait::async_trait;
    use tempfile::tempdir;

    struct RejectingStore;

    #[async_trait]
    impl BlobStore for RejectingStore {
        async fn upload(&self, _container: &str, items: &[UploadItem]) -> Vec<Result<()>> {
            items
                .iter()
                .map(|_| Err(Error::Storage("quota exceeded".to_string())))
                .collect()
        }

        async fn list(&self, _container: &str, _prefix: &str) -> Result<Vec<String>> {
            Ok(Vec::new())
        }

        async fn download(&self, _container: &str, _remote: &str, _local: &Path) -> Result<()> {
            Err(Error::Storage("not found".to_string()))
        }

        fn name(&self) -> &'static str {
            "rejecting"
        }
    }

    fn id() -> HarvestId {
        "0f1e2d3c-4b5a-4978-8796-a5b4c3d2e1f0".parse().unwrap()
    }

    #[tokio::test]
    async fn uploads_pdf_and_metadata_under_sharded_dir() {
        let dir = tempdir().unwrap();
        let work = dir.path().join("tmp");
        std::fs::create_dir_all(&work).unwrap();
        let pdf = work.join(format!("{}.pdf", id()));
        std::fs::write(&pdf, b"%PDF-1.4").unwrap();
        let mirror = Arc::new(LocalMirror::new(dir.path().join("mirror")));
        let manager = ArtifactManager::new(mirror.clone(), "pubs", false);

        let remote = manager
            .archive(id(), &pdf, &serde_json::json!({"id": id().to_string(), "doi": "10.1/a"}))
            .await
            .unwrap();

        assert_eq!(remote, format!("0f/1e/2d/3c/{}", id()));
        assert_eq!(
            mirror.list("pubs", "").await.unwrap(),
            vec![
                format!("0f/1e/2d/3c/{0}/{0}.json", id()),
                format!("0f/1e/2d/3c/{0}/{0}.pdf", id()),
            ]
        );
        let stored = std::fs::read_to_string(
            mirror
                .object_path("pubs", &format!("{}/{}.json", remote, id()))
                .unwrap(),
        )
        .unwrap();
        let meta: serde_json::Value = serde_json::from_str(&stored).unwrap();
        assert_eq!(meta["doi"], "10.1/a");
        assert_eq!(std::fs::read_dir(&work).unwrap().count(), 0, "working files removed");
    }

    #[tokio::test]
    async fn compression_gzips_both_files() {
        let dir = tempdir().unwrap();
        let pdf = dir.path().join(format!("{}.pdf", id()));
        std::fs::write(&pdf, b"%PDF-1.4").unwrap();
        let mirror = Arc::new(LocalMirror::new(dir.path().join("mirror")));
        let manager = ArtifactManager::new(mirror.clone(), "pubs", true);

        manager.archive(id(), &pdf, &serde_json::json!({})).await.unwrap();

        let listed = mirror.list("pubs", "").await.unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().all(|p| p.ends_with(".gz")));
        assert!(listed.contains(&manager.remote_pdf_path(id())));
    }

    #[tokio::test]
    async fn cleanup_runs_after_failed_upload() {
        let dir = tempdir().unwrap();
        let pdf = dir.path().join(format!("{}.pdf", id()));
        std::fs::write(&pdf, b"%PDF-1.4").unwrap();
        let manager = ArtifactManager::new(Arc::new(RejectingStore), "pubs", true);

        let result = manager.archive(id(), &pdf, &serde_json::json!({})).await;

        assert!(matches!(result, Err(Error::Storage(_))));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
