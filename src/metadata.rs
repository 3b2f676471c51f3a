//! Streaming reader for the metadata dump
//!
//! The dump is gzip-compressed newline-delimited JSON, one [`Entry`] per line.
//! It is never loaded whole: [`MetadataStream`] decodes raw lines in chunks of
//! the batch size on the blocking pool and resolves them one by one until a
//! batch of [`ResolvedEntry`]s is full.
//!
//! Plain (uncompressed) files are accepted as well; the gzip magic decides.

use std::collections::{HashSet, VecDeque};
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;

use crate::db::StateStore;
use crate::error::{Error, Result};
use crate::resolver::{EntryResolver, Resolution, ResolvedEntry};
use crate::types::{Entry, EntryState};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const COUNT_CHUNK_SIZE: usize = 1024 * 1024;

fn transition(doi: &str, state: EntryState) {
    tracing::debug!(doi = %doi, state = ?state, "Entry state");
}

/// Predicate deciding whether a parsed entry is considered at all
pub type EntryFilter = Box<dyn Fn(&Entry) -> bool + Send + Sync>;

type LineReader = Box<dyn BufRead + Send>;

fn open_reader(path: &Path) -> Result<LineReader> {
    let file = File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Error::NotFound(path.to_path_buf()),
        _ => Error::Io(e),
    })?;
    let mut buffered = BufReader::with_capacity(COUNT_CHUNK_SIZE, file);
    let is_gzip = buffered.fill_buf()?.starts_with(&GZIP_MAGIC);

    if is_gzip {
        Ok(Box::new(BufReader::with_capacity(
            COUNT_CHUNK_SIZE,
            GzDecoder::new(buffered),
        )))
    } else {
        Ok(Box::new(buffered))
    }
}

/// Count the records of a dump without parsing them.
///
/// Scans the decompressed bytes in 1 MiB chunks and counts line breaks; a final
/// line without a trailing newline counts as a record.
pub async fn count_entries(path: &Path) -> Result<usize> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || count_lines(open_reader(&path)?))
        .await
        .map_err(|e| Error::Other(format!("line counting task failed: {}", e)))?
}

fn count_lines(mut reader: impl Read) -> Result<usize> {
    let mut buf = vec![0u8; COUNT_CHUNK_SIZE];
    let mut count = 0;
    let mut last = None;

    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        count += buf[..n].iter().filter(|&&b| b == b'\n').count();
        last = Some(buf[n - 1]);
    }

    if last.is_some_and(|b| b != b'\n') {
        count += 1;
    }
    Ok(count)
}

/// Lazy, finite, non-restartable sequence of resolved batches
pub struct MetadataStream {
    path: PathBuf,
    reader: Option<LineReader>,
    pending: VecDeque<String>,
    resolver: EntryResolver,
    batch_size: usize,
    reprocess: bool,
    skip_set: HashSet<String>,
    filter: Option<EntryFilter>,
    lines_read: usize,
    skipped: usize,
}

impl MetadataStream {
    /// Open a dump for streaming.
    ///
    /// Fails with [`Error::NotFound`] if the path does not exist.
    pub fn open(path: &Path, resolver: EntryResolver, batch_size: usize) -> Result<Self> {
        Ok(Self {
            path: path.to_path_buf(),
            reader: Some(open_reader(path)?),
            pending: VecDeque::new(),
            resolver,
            batch_size: batch_size.max(1),
            reprocess: false,
            skip_set: HashSet::new(),
            filter: None,
            lines_read: 0,
            skipped: 0,
        })
    }

    /// Revisit DOIs that already have an id.
    pub fn with_reprocess(mut self, reprocess: bool) -> Self {
        self.reprocess = reprocess;
        self
    }

    /// DOIs that are dropped without touching the store.
    pub fn with_skip_set(mut self, skip_set: HashSet<String>) -> Self {
        self.skip_set = skip_set;
        self
    }

    /// Only entries for which `filter` returns true are resolved.
    pub fn with_filter(mut self, filter: EntryFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Raw lines consumed so far
    pub fn lines_read(&self) -> usize {
        self.lines_read
    }

    /// Lines dropped so far (unparsable, filtered or skipped by the resolver)
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Resolve the next batch.
    ///
    /// Returns `Ok(None)` once the dump is exhausted. The last batch may be
    /// smaller than the batch size. Lines that do not parse or do not resolve
    /// are dropped without interrupting the stream.
    pub async fn next_batch(&mut self, store: &mut StateStore) -> Result<Option<Vec<ResolvedEntry>>> {
        let mut batch = Vec::with_capacity(self.batch_size);

        while batch.len() < self.batch_size {
            let Some(line) = self.next_line().await? else {
                break;
            };
            self.lines_read += 1;

            let entry: Entry = match serde_json::from_str(&line) {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(
                        path = %self.path.display(),
                        line = self.lines_read,
                        error = %e,
                        "Skipping unparsable metadata record"
                    );
                    self.skipped += 1;
                    continue;
                }
            };

            let doi = entry.doi.clone();
            transition(&doi, EntryState::Discovered);

            if self.filter.as_ref().is_some_and(|keep| !keep(&entry)) {
                transition(&doi, EntryState::Skipped);
                self.skipped += 1;
                continue;
            }

            let resolution = self
                .resolver
                .resolve(store, entry, self.reprocess, &self.skip_set)
                .await?;
            transition(&doi, resolution.state());
            match resolution {
                Resolution::Resolved(resolved) => batch.push(resolved),
                Resolution::Skip(reason) => {
                    tracing::debug!(doi = %doi, reason = ?reason, "Entry skipped");
                    self.skipped += 1;
                }
            }
        }

        Ok((!batch.is_empty()).then_some(batch))
    }

    async fn next_line(&mut self) -> Result<Option<String>> {
        loop {
            if let Some(line) = self.pending.pop_front() {
                if line.trim().is_empty() {
                    continue;
                }
                return Ok(Some(line));
            }
            if !self.fill_pending().await? {
                return Ok(None);
            }
        }
    }

    /// Decode up to one batch worth of raw lines. Returns false at end of input.
    async fn fill_pending(&mut self) -> Result<bool> {
        let Some(mut reader) = self.reader.take() else {
            return Ok(false);
        };
        let wanted = self.batch_size;

        let (reader, lines) = tokio::task::spawn_blocking(move || {
            let mut lines = Vec::with_capacity(wanted);
            let mut eof = false;
            while lines.len() < wanted {
                let mut line = String::new();
                match reader.read_line(&mut line) {
                    Ok(0) => {
                        eof = true;
                        break;
                    }
                    Ok(_) => lines.push(line),
                    Err(e) => return Err(Error::Io(e)),
                }
            }
            Ok(((!eof).then_some(reader), lines))
        })
        .await
        .map_err(|e| Error::Other(format!("metadata reader task failed: {}", e)))??;

        self.reader = reader;
        let got_any = !lines.is_empty();
        self.pending.extend(lines);
        Ok(got_any || self.reader.is_some())
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::publisher::Publisher;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;
    use tempfile::{TempDir, tempdir};

    fn record(doi: &str) -> String {
        format!(
            r#"{{"doi":"{doi}","bso_classification":"physics","publisher_normalized":"Other","oa_details":{{"2020":{{"is_oa":true,"oa_locations":[{{"url_for_pdf":"https://example.org/{doi}.pdf","repository_normalized":null,"host_type":"publisher","is_best":true}}]}}}}}}"#
        )
    }

    fn write_gz(dir: &Path, name: &str, lines: &[String]) -> PathBuf {
        let path = dir.join(name);
        let mut encoder = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
        for line in lines {
            writeln!(encoder, "{}", line).unwrap();
        }
        encoder.finish().unwrap();
        path
    }

    async fn setup() -> (TempDir, StateStore, EntryResolver) {
        let dir = tempdir().unwrap();
        let store = StateStore::open(&dir.path().join("state")).await.unwrap();
        let resolver = EntryResolver::new(&dir.path().join("tmp"), vec![Publisher::Wiley]);
        (dir, store, resolver)
    }

    #[tokio::test]
    async fn count_entries_counts_lines_of_gzip_dump() {
        let dir = tempdir().unwrap();
        let lines: Vec<String> = (0..250).map(|i| record(&format!("10.1/{i}"))).collect();
        let path = write_gz(dir.path(), "dump.jsonl.gz", &lines);

        assert_eq!(count_entries(&path).await.unwrap(), 250);
    }

    #[tokio::test]
    async fn count_entries_counts_unterminated_last_line() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("plain.jsonl");
        std::fs::write(&path, "{}\n{}\n{}").unwrap();

        assert_eq!(count_entries(&path).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn missing_input_is_not_found() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope.jsonl.gz");

        match count_entries(&missing).await {
            Err(Error::NotFound(p)) => assert_eq!(p, missing),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn batches_are_full_except_the_last() {
        let (dir, mut store, resolver) = setup().await;
        let lines: Vec<String> = (0..7).map(|i| record(&format!("10.1/{i}"))).collect();
        let path = write_gz(dir.path(), "dump.jsonl.gz", &lines);

        let mut stream = MetadataStream::open(&path, resolver, 3).unwrap();
        let mut sizes = Vec::new();
        while let Some(batch) = stream.next_batch(&mut store).await.unwrap() {
            sizes.push(batch.len());
        }

        assert_eq!(sizes, vec![3, 3, 1]);
        assert_eq!(stream.lines_read(), 7);
        assert!(stream.next_batch(&mut store).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn bad_and_unresolvable_lines_are_dropped_without_stopping() {
        let (dir, mut store, resolver) = setup().await;
        let lines = vec![
            record("10.1/a"),
            "{not json".to_string(),
            r#"{"doi":"10.1/empty","oa_details":{}}"#.to_string(),
            String::new(),
            record("10.1/b"),
        ];
        let path = write_gz(dir.path(), "dump.jsonl.gz", &lines);

        let mut stream = MetadataStream::open(&path, resolver, 10).unwrap();
        let batch = stream.next_batch(&mut store).await.unwrap().unwrap();

        let dois: Vec<&str> = batch.iter().map(|r| r.record.doi.as_str()).collect();
        assert_eq!(dois, vec!["10.1/a", "10.1/b"]);
        assert_eq!(stream.skipped(), 2);
    }

    #[tokio::test]
    async fn filter_and_skip_set_drop_entries() {
        let (dir, mut store, resolver) = setup().await;
        let lines: Vec<String> = ["10.1/a", "10.1/b", "10.1/c"].iter().map(|d| record(d)).collect();
        let path = write_gz(dir.path(), "dump.jsonl.gz", &lines);

        let mut stream = MetadataStream::open(&path, resolver, 10)
            .unwrap()
            .with_skip_set(["10.1/a".to_string()].into())
            .with_filter(Box::new(|e: &Entry| e.doi != "10.1/c"));
        let batch = stream.next_batch(&mut store).await.unwrap().unwrap();

        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].record.doi, "10.1/b");
        assert!(store.lookup_doi("10.1/c").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn second_pass_over_same_dump_yields_nothing() {
        let (dir, mut store, resolver) = setup().await;
        let lines: Vec<String> = (0..4).map(|i| record(&format!("10.1/{i}"))).collect();
        let path = write_gz(dir.path(), "dump.jsonl.gz", &lines);

        let mut first = MetadataStream::open(&path, resolver.clone(), 10).unwrap();
        assert_eq!(first.next_batch(&mut store).await.unwrap().unwrap().len(), 4);

        let mut second = MetadataStream::open(&path, resolver, 10).unwrap();
        assert!(second.next_batch(&mut store).await.unwrap().is_none());
    }
}
