//! Blob-store collaborator
//!
//! Harvested artifacts and the arXiv PDF mirror live in an object store whose
//! client is supplied by the embedding application through [`BlobStore`].
//! [`LocalMirror`] implements the same contract on a local directory and is
//! used when no object store is configured.

mod local;

pub use local::LocalMirror;

use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// One file to upload: local source and remote object path
pub type UploadItem = (PathBuf, String);

/// Object-store client
///
/// Remote paths are `/`-separated and relative to the container.
///
/// # Examples
///
/// ```no_run
/// use oa_harvest::storage::{BlobStore, LocalMirror};
/// use std::path::PathBuf;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let store = LocalMirror::new("./mirror");
/// let results = store
///     .upload(
///         "harvested_publications",
///         &[(PathBuf::from("tmp/a.pdf"), "ab/cd/ef/gh/a/a.pdf".to_string())],
///     )
///     .await;
/// assert!(results.iter().all(|r| r.is_ok()));
///
/// let listed = store.list("harvested_publications", "ab/cd").await?;
/// println!("{:?}", listed);
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Upload files, returning one result per item in input order.
    ///
    /// A failed item does not stop the remaining uploads.
    async fn upload(&self, container: &str, items: &[UploadItem]) -> Vec<crate::Result<()>>;

    /// Remote paths in `container` starting with `prefix`, sorted.
    async fn list(&self, container: &str, prefix: &str) -> crate::Result<Vec<String>>;

    /// Fetch one object into `local`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`](crate::Error::Storage) if the object does not
    /// exist or cannot be read.
    async fn download(&self, container: &str, remote: &str, local: &Path) -> crate::Result<()>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}
