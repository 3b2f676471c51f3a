//! # oa-harvest
//!
//! Resumable harvester for open-access scholarly PDFs.
//!
//! ## Design Philosophy
//!
//! oa-harvest is designed to be:
//! - **Resumable** - Every DOI gets a permanent id before any network I/O, and
//!   every outcome is recorded, so a run can be restarted at any point
//! - **Idempotent** - Running twice over the same dump changes nothing
//! - **Streaming** - The metadata dump is never loaded whole
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Event-driven** - Consumers subscribe to events, no polling required
//!
//! ## Quick Start
//!
//! ```no_run
//! use oa_harvest::{Config, Harvester, HarvestOptions, SampleSpec};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::default();
//!     config.harvest.compress = true;
//!
//!     // Artifacts go to the local mirror when no blob store is given
//!     let mut harvester = Harvester::new(config, None).await?;
//!
//!     let mut events = harvester.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let summary = harvester
//!         .harvest(
//!             Path::new("bso-publications.jsonl.gz"),
//!             HarvestOptions {
//!                 sample: Some(SampleSpec { size: 100, seed: 1 }),
//!                 ..Default::default()
//!             },
//!         )
//!         .await?;
//!     println!("failed {} / {}", summary.failed, summary.total_entries);
//!
//!     harvester.close().await;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Artifact storage for harvested entries
pub mod artifacts;
/// Configuration types
pub mod config;
/// State store (entries, DOI mapping, failures)
pub mod db;
/// Download coordinator
pub mod downloader;
/// Error types
pub mod error;
/// Download strategies and content checks
pub mod fetch;
/// Streaming metadata reader
pub mod metadata;
/// Publisher API integrations
pub mod publisher;
/// Entry resolution and URL ranking
pub mod resolver;
/// Deterministic stream sampling
pub mod sampler;
/// Blob-store collaborator
pub mod storage;
/// Request throttling
pub mod throttle;
/// Core types
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use artifacts::ArtifactManager;
pub use config::{
    Config, HarvestConfig, PersistenceConfig, PublisherApiConfig, StorageConfig, ThrottleConfig,
};
pub use db::{StateStore, StoreReader, StoreStats};
pub use downloader::{BatchReport, HarvestOptions, Harvester, SampleSpec};
pub use error::{Error, FetchError, Result, StoreError};
pub use fetch::{DownloadOutcome, Fetcher, PublisherApi, Strategy, TdmClient};
pub use metadata::{EntryFilter, MetadataStream, count_entries};
pub use publisher::Publisher;
pub use resolver::{EntryResolver, Resolution, ResolvedEntry, SkipReason};
pub use sampler::SampleWindow;
pub use storage::{BlobStore, LocalMirror};
pub use throttle::Throttle;
pub use types::{
    CandidateLocation, Entry, EntryState, Event, FailureRecord, HarvestId, HarvestRecord,
    HarvestSummary, Observation, Resource, ResultCode,
};
