//! Content sniffing for downloaded documents

use std::path::Path;
use tokio::io::AsyncReadExt;

/// Leading bytes of every PDF document
pub const PDF_MAGIC: &[u8] = b"%PDF-";

/// Signature expected at the start of a document of the given MIME type
pub fn magic_for(mime: &str) -> Option<&'static [u8]> {
    match mime.trim().to_ascii_lowercase().as_str() {
        "application/pdf" => Some(PDF_MAGIC),
        _ => None,
    }
}

/// True if `bytes` starts with the PDF signature
pub fn is_pdf(bytes: &[u8]) -> bool {
    bytes.starts_with(PDF_MAGIC)
}

/// Result of sniffing a downloaded file
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContentCheck {
    /// Non-empty and starts with the expected signature
    Valid {
        /// File size in bytes
        size: u64,
    },
    /// File does not exist
    Missing,
    /// File exists but is empty
    Empty,
    /// File does not start with the expected signature
    Mismatch,
}

impl ContentCheck {
    /// True for [`ContentCheck::Valid`]
    pub fn is_valid(&self) -> bool {
        matches!(self, ContentCheck::Valid { .. })
    }
}

/// Check a file against the signature of `target_mime`.
///
/// MIME types without a known signature only require a non-empty file.
pub async fn sniff_file(path: &Path, target_mime: &str) -> std::io::Result<ContentCheck> {
    let mut file = match tokio::fs::File::open(path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ContentCheck::Missing),
        Err(e) => return Err(e),
    };
    let size = file.metadata().await?.len();
    if size == 0 {
        return Ok(ContentCheck::Empty);
    }

    let Some(magic) = magic_for(target_mime) else {
        return Ok(ContentCheck::Valid { size });
    };
    let mut head = Vec::with_capacity(magic.len());
    (&mut file).take(magic.len() as u64).read_to_end(&mut head).await?;

    if head == magic {
        Ok(ContentCheck::Valid { size })
    } else {
        Ok(ContentCheck::Mismatch)
    }
}
