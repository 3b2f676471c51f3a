//! arXiv strategy: map a PDF URL onto the mirror layout and fetch from the blob store
//!
//! The mirror stores each paper gzip-compressed as
//! `<category>/<yymm>/<number>/<number>.pdf.gz`. New-style identifiers
//! (`1501.00001`) use the category `arxiv`; old-style identifiers
//! (`quant-ph/0602109`) keep their archive name.

use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

use crate::error::FetchError;
use crate::storage::BlobStore;
use crate::utils::{gunzip_file, remove_quietly};

static NEW_STYLE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^(\d{4})\.\d{4,5}(v\d+)?$").ok());
static OLD_STYLE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^([a-z][a-z\-]*(?:\.[A-Z]{2})?)/((\d{4})\d{3}(v\d+)?)$").ok());

/// Mirror path for an arXiv PDF or abstract URL, `None` for any other URL.
///
/// # Examples
///
/// ```
/// use oa_harvest::fetch::arxiv_mirror_path;
///
/// assert_eq!(
///     arxiv_mirror_path("http://arxiv.org/pdf/1501.00001").as_deref(),
///     Some("arxiv/1501/1501.00001/1501.00001.pdf.gz")
/// );
/// assert_eq!(
///     arxiv_mirror_path("https://arxiv.org/pdf/quant-ph/0602109").as_deref(),
///     Some("quant-ph/0602/0602109/0602109.pdf.gz")
/// );
/// ```
pub fn arxiv_mirror_path(raw: &str) -> Option<String> {
    let url = url::Url::parse(raw).ok()?;
    let host = url.host_str()?.to_ascii_lowercase();
    if host != "arxiv.org" && !host.ends_with(".arxiv.org") {
        return None;
    }

    let path = url.path().trim_matches('/');
    let id = path
        .strip_prefix("pdf/")
        .or_else(|| path.strip_prefix("abs/"))?;
    let id = id.strip_suffix(".pdf").unwrap_or(id);

    if let Some(caps) = NEW_STYLE.as_ref()?.captures(id) {
        let yymm = caps.get(1)?.as_str();
        return Some(format!("arxiv/{yymm}/{id}/{id}.pdf.gz"));
    }
    let caps = OLD_STYLE.as_ref()?.captures(id)?;
    let category = caps.get(1)?.as_str();
    let number = caps.get(2)?.as_str();
    let yymm = caps.get(3)?.as_str();
    Some(format!("{category}/{yymm}/{number}/{number}.pdf.gz"))
}

/// Fetch the mirrored copy of `url` into `dest`.
pub(crate) async fn fetch_from_mirror(
    store: &dyn BlobStore,
    container: &str,
    url: &str,
    dest: &Path,
) -> Result<(), FetchError> {
    let remote = arxiv_mirror_path(url).ok_or_else(|| FetchError::RequestFailure {
        url: url.to_string(),
        status: None,
        reason: "not an arXiv identifier".to_string(),
    })?;

    let mut compressed = dest.as_os_str().to_owned();
    compressed.push(".gz");
    let compressed = std::path::PathBuf::from(compressed);

    let result = async {
        store
            .download(container, &remote, &compressed)
            .await
            .map_err(|e| FetchError::RequestFailure {
                url: url.to_string(),
                status: None,
                reason: format!("mirror object {}: {}", remote, e),
            })?;
        gunzip_file(&compressed, dest)
            .await
            .map_err(|e| FetchError::InvalidContent {
                url: url.to_string(),
                reason: format!("mirror object {} is not gzip: {}", remote, e),
            })
    }
    .await;

    discard_mirror_download(&compressed).await;
    result.map(|_| ())
}

/// Remove the compressed mirror copy. Failure only leaves a stray file behind.
async fn discard_mirror_download(path: &Path) {
    if let Err(e) = remove_quietly(path).await {
        tracing::warn!(path = %path.display(), error = %e, "Failed to remove mirror download");
    }
}
