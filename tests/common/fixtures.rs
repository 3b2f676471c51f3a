//! Metadata and content fixtures

use flate2::Compression;
use flate2::write::GzEncoder;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Body served as a valid full-text PDF
pub const PDF_BODY: &[u8] = b"%PDF-1.7\n1 0 obj << /Type /Catalog >> endobj\n%%EOF\n";

/// Interstitial page pointing at `target` through the redirect anchor
pub fn interstitial_page(target: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
  <head><title>Redirecting</title></head>
  <body>
    <p>You are being redirected to the full text.</p>
    <a id="redirect" href="{}">Click here if nothing happens</a>
  </body>
</html>"#,
        target
    )
}

/// Metadata line whose latest observation is open access at `urls`
pub fn open_access_line(doi: &str, urls: &[&str]) -> String {
    let locations: Vec<serde_json::Value> = urls
        .iter()
        .map(|url| {
            serde_json::json!({
                "url_for_pdf": url,
                "repository_normalized": null,
                "host_type": "repository",
                "is_best": false
            })
        })
        .collect();
    serde_json::json!({
        "doi": doi,
        "bso_classification": "mathematics",
        "publisher_normalized": "Example Press",
        "title": format!("On {}", doi),
        "oa_details": {
            "2022": {"is_oa": true, "oa_locations": locations}
        }
    })
    .to_string()
}

/// Write a gzip-compressed JSONL dump into `dir`
pub fn write_gz_dump(dir: &Path, lines: &[String]) -> PathBuf {
    let path = dir.join("publications.jsonl.gz");
    let mut encoder = GzEncoder::new(std::fs::File::create(&path).unwrap(), Compression::default());
    for line in lines {
        writeln!(encoder, "{}", line).unwrap();
    }
    encoder.finish().unwrap();
    path
}

/// Store a gzip-compressed PDF at `remote` inside `container` of a local mirror root
pub fn seed_mirror_object(root: &Path, container: &str, remote: &str, body: &[u8]) {
    let path = root.join(container).join(remote);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    let mut encoder = GzEncoder::new(std::fs::File::create(&path).unwrap(), Compression::default());
    encoder.write_all(body).unwrap();
    encoder.finish().unwrap();
}
