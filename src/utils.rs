//! Utility functions for file handling and storage paths

use crate::error::{Error, Result};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tokio::task::spawn_blocking;

/// Number of two-character directory levels in a sharded path
const SHARD_LEVELS: usize = 4;

/// Storage directory for an id: four two-character prefixes, then the id.
///
/// Hyphens are ignored when taking the prefixes, so a hyphenated UUID shards
/// on its first eight hex digits.
///
/// # Examples
///
/// ```
/// use oa_harvest::utils::sharded_path;
///
/// assert_eq!(
///     sharded_path("abcdefgh-1234"),
///     "ab/cd/ef/gh/abcdefgh-1234"
/// );
/// ```
pub fn sharded_path(id: &str) -> String {
    let chars: Vec<char> = id.chars().filter(|c| *c != '-').collect();
    let mut parts: Vec<String> = chars
        .chunks(2)
        .take(SHARD_LEVELS)
        .filter(|pair| pair.len() == 2)
        .map(|pair| pair.iter().collect())
        .collect();
    parts.push(id.to_string());
    parts.join("/")
}

fn append_gz(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".gz");
    PathBuf::from(name)
}

fn gzip_blocking(src: &Path) -> Result<PathBuf> {
    let dest = append_gz(src);
    let mut reader = BufReader::new(File::open(src)?);
    let mut encoder = GzEncoder::new(BufWriter::new(File::create(&dest)?), Compression::default());
    std::io::copy(&mut reader, &mut encoder)?;
    encoder.finish()?.flush()?;
    std::fs::remove_file(src)?;
    Ok(dest)
}

fn gunzip_blocking(src: &Path, dest: &Path) -> Result<u64> {
    let mut decoder = GzDecoder::new(BufReader::new(File::open(src)?));
    let mut writer = BufWriter::new(File::create(dest)?);
    let size = std::io::copy(&mut decoder, &mut writer)?;
    writer.flush()?;
    Ok(size)
}

fn sha256_blocking(path: &Path) -> Result<(String, u64)> {
    let mut hasher = Sha256::new();
    let mut reader = BufReader::new(File::open(path)?);
    let size = std::io::copy(&mut reader, &mut hasher)?;
    Ok((format!("{:x}", hasher.finalize()), size))
}

async fn blocking<T, F>(what: &'static str, f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    spawn_blocking(f)
        .await
        .map_err(|e| Error::Other(format!("{} task panicked: {}", what, e)))?
}

/// Compress `src` to `<src>.gz`, removing the original. Returns the new path.
pub async fn gzip_file(src: &Path) -> Result<PathBuf> {
    let src = src.to_path_buf();
    blocking("gzip", move || gzip_blocking(&src)).await
}

/// Decompress `src` into `dest`. Returns the decompressed size.
pub async fn gunzip_file(src: &Path, dest: &Path) -> Result<u64> {
    let (src, dest) = (src.to_path_buf(), dest.to_path_buf());
    blocking("gunzip", move || gunzip_blocking(&src, &dest)).await
}

/// Hex SHA-256 and size of a file
pub async fn sha256_file(path: &Path) -> Result<(String, u64)> {
    let path = path.to_path_buf();
    blocking("checksum", move || sha256_blocking(&path)).await
}

/// Remove a file, treating a missing file as already removed.
pub async fn remove_quietly(path: &Path) -> std::io::Result<()> {
    match tokio::fs::remove_file(path).await {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

/// Delete `path` if it exists and is empty. Returns true if it was deleted.
pub async fn remove_if_empty(path: &Path) -> std::io::Result<bool> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() && meta.len() == 0 => {
            tokio::fs::remove_file(path).await?;
            Ok(true)
        }
        Ok(_) => Ok(false),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn sharded_path_uses_first_eight_characters() {
        assert_eq!(
            sharded_path("0f1e2d3c-4b5a-6978-8796-a5b4c3d2e1f0"),
            "0f/1e/2d/3c/0f1e2d3c-4b5a-6978-8796-a5b4c3d2e1f0"
        );
        assert_eq!(sharded_path("abcdefghij"), "ab/cd/ef/gh/abcdefghij");
    }

    #[test]
    fn short_ids_get_fewer_levels() {
        assert_eq!(sharded_path("abc"), "ab/abc");
        assert_eq!(sharded_path(""), "");
    }

    #[tokio::test]
    async fn gzip_then_gunzip_restores_content() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("doc.pdf");
        std::fs::write(&src, b"%PDF-1.7 hello").unwrap();

        let gz = gzip_file(&src).await.unwrap();
        assert_eq!(gz, dir.path().join("doc.pdf.gz"));
        assert!(!src.exists(), "original is replaced by the archive");

        let out = dir.path().join("out.pdf");
        let size = gunzip_file(&gz, &out).await.unwrap();
        assert_eq!(size, 14);
        assert_eq!(std::fs::read(&out).unwrap(), b"%PDF-1.7 hello");
    }

    #[tokio::test]
    async fn sha256_of_known_content() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("abc");
        std::fs::write(&path, b"abc").unwrap();

        let (digest, size) = sha256_file(&path).await.unwrap();
        assert_eq!(
            digest,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(size, 3);
    }

    #[tokio::test]
    async fn remove_if_empty_keeps_non_empty_files() {
        let dir = tempdir().unwrap();
        let empty = dir.path().join("empty.pdf");
        let full = dir.path().join("full.pdf");
        std::fs::write(&empty, b"").unwrap();
        std::fs::write(&full, b"x").unwrap();

        assert!(remove_if_empty(&empty).await.unwrap());
        assert!(!remove_if_empty(&full).await.unwrap());
        assert!(!remove_if_empty(&dir.path().join("missing")).await.unwrap());
        assert!(!empty.exists());
        assert!(full.exists());
    }

    #[tokio::test]
    async fn remove_quietly_ignores_missing_files() {
        let dir = tempdir().unwrap();
        remove_quietly(&dir.path().join("missing")).await.unwrap();
    }
}
