//! Directory-backed [`BlobStore`]

use super::{BlobStore, UploadItem};
use crate::{Error, Result};
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};

/// Blob store mirrored on the local file system as `<root>/<container>/<remote>`
#[derive(Clone, Debug)]
pub struct LocalMirror {
    root: PathBuf,
}

impl LocalMirror {
    /// Mirror rooted at `root`; directories are created on first upload
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Mirror root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Local location of a remote object.
    ///
    /// Rejects paths that would escape the container (absolute paths, `..`).
    pub fn object_path(&self, container: &str, remote: &str) -> Result<PathBuf> {
        let mut path = self.root.join(checked_segment(container)?);
        for part in remote.split('/').filter(|p| !p.is_empty()) {
            path.push(checked_segment(part)?);
        }
        Ok(path)
    }

    async fn copy_in(&self, container: &str, local: &Path, remote: &str) -> Result<()> {
        let dest = self.object_path(container, remote)?;
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(local, &dest).await.map_err(|e| {
            Error::Storage(format!(
                "failed to copy {} to {}: {}",
                local.display(),
                dest.display(),
                e
            ))
        })?;
        Ok(())
    }
}

fn checked_segment(part: &str) -> Result<&str> {
    let mut components = Path::new(part).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(part),
        _ => Err(Error::Storage(format!("invalid path segment: {:?}", part))),
    }
}

#[async_trait]
impl BlobStore for LocalMirror {
    async fn upload(&self, container: &str, items: &[UploadItem]) -> Vec<Result<()>> {
        let mut results = Vec::with_capacity(items.len());
        for (local, remote) in items {
            results.push(self.copy_in(container, local, remote).await);
        }
        results
    }

    async fn list(&self, container: &str, prefix: &str) -> Result<Vec<String>> {
        let base = self.root.join(checked_segment(container)?);
        let mut found = Vec::new();
        let mut pending = vec![(base, String::new())];

        while let Some((dir, rel)) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            while let Some(entry) = entries.next_entry().await? {
                let name = entry.file_name().to_string_lossy().into_owned();
                let child = if rel.is_empty() {
                    name
                } else {
                    format!("{}/{}", rel, name)
                };
                if entry.file_type().await?.is_dir() {
                    pending.push((entry.path(), child));
                } else if child.starts_with(prefix) {
                    found.push(child);
                }
            }
        }

        found.sort();
        Ok(found)
    }

    async fn download(&self, container: &str, remote: &str, local: &Path) -> Result<()> {
        let source = self.object_path(container, remote)?;
        if let Some(parent) = local.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(&source, local).await.map_err(|e| {
            Error::Storage(format!("{}/{}: {}", container, remote, e))
        })?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "local-mirror"
    }
}
