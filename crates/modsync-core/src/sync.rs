//! Synchronization against a mod server
//!
//! This module wires the pieces of one update together:
//! - [`ModSyncServer`]: what the engine needs from a server
//! - [`DownloadOrchestrator`]: bounded, cancellable fetching into staging
//! - [`StagingApplier`]: moving staged files into place
//! - [`SyncEngine`]: the analyze / download / apply state machine
//! - [`Recovery`]: finishing or discarding an interrupted update

mod engine;
mod executor;
mod orchestrator;
mod recovery;
mod reporting;
mod server;

pub use engine::{EngineState, SyncEngine, SyncPlan};
pub use executor::{ApplyReport, STAGING_PREFIX, StagingApplier, safe_join};
pub use orchestrator::{DownloadOrchestrator, DownloadProgress, DownloadReport, ProgressCallback};
pub use recovery::Recovery;
pub use reporting::SyncReporter;
pub use server::{FetchError, MirrorServer, ModSyncServer, SERVER_CONFIG_FILE_NAME, ServerConfig};

/// Version this client compares against the server's
pub const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Counts from one applied update
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncResult {
    /// Files added
    pub added: usize,
    /// Files updated
    pub updated: usize,
    /// Files deleted
    pub removed: usize,
    /// Bytes downloaded
    pub bytes: u64,
    /// Local case conflicts seen while hashing
    pub conflicts: usize,
}

impl SyncResult {
    /// Total operations performed
    #[must_use]
    pub const fn total_operations(&self) -> usize {
        self.added + self.updated + self.removed
    }
}
