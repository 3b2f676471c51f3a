//! Assertions over harvester events and the artifact mirror

use std::path::Path;
use oa_harvest::Event;
use tokio::sync::broadcast::Receiver;
use walkdir::WalkDir;

/// Every event received so far
pub fn collect_events(rx: &mut Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Files under `dir`, relative and sorted, with `/` separators
pub fn files_under(dir: &Path) -> Vec<String> {
    let mut files: Vec<String> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| {
            e.path()
                .strip_prefix(dir)
                .ok()
                .map(|p| p.to_string_lossy().replace('\\', "/"))
        })
        .collect();
    files.sort();
    files
}

/// Assert that the working directory holds no leftover files
pub fn assert_working_dir_empty(dir: &Path) {
    let leftovers = files_under(dir);
    assert!(
        leftovers.is_empty(),
        "working directory should be empty, found {:?}",
        leftovers
    );
}
