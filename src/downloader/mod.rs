//! Download coordinator split into focused submodules.
//!
//! The [`Harvester`] owns the state store and every shared client. Its
//! methods are organized by concern:
//! - [`lifecycle`] - construction, event subscription, close and reset
//! - [`harvest`] - the run loop over the metadata stream
//! - [`batch`] - the three-phase processing of one batch
//!
//! ## Batch phases
//!
//! 1. Download: a bounded pool runs one task per entry, each under the task
//!    timeout. Tasks only touch their own file and connection.
//! 2. Record: the orchestrating task alone validates every file and writes
//!    the outcome of the whole batch to the state store.
//! 3. Archive: a second bounded pool stores the artifacts of the successful
//!    entries.
//!
//! A phase starts only after the previous one has drained, and a batch is
//! fully processed before the next one is read.

mod batch;
mod harvest;
mod lifecycle;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use batch::BatchReport;
pub use harvest::{HarvestOptions, SampleSpec};

use std::sync::Arc;

use crate::artifacts::ArtifactManager;
use crate::config::Config;
use crate::db::StateStore;
use crate::fetch::Fetcher;
use crate::resolver::EntryResolver;
use crate::types::Event;

/// Harvesting engine
///
/// Not `Clone`: it owns the [`StateStore`], and with it the only write access
/// to the index. Hand out [`StoreReader`](crate::db::StoreReader)s for
/// concurrent reads.
pub struct Harvester {
    /// Configuration, shared read-only with every component
    pub(crate) config: Arc<Config>,
    /// State index (single writer)
    pub(crate) store: StateStore,
    /// Strategy dispatcher for phase 1
    pub(crate) fetcher: Fetcher,
    /// Artifact storage for phase 3
    pub(crate) artifacts: ArtifactManager,
    /// Resolver handed to each metadata stream
    pub(crate) resolver: EntryResolver,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: tokio::sync::broadcast::Sender<Event>,
}
