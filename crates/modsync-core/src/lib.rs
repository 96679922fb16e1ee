//! # modsync-core
//!
//! Core library for keeping a local mod installation in line with a
//! server-declared file set.
//!
//! The library builds content-hash manifests of the configured sync paths,
//! diffs them against the server listing and the last synchronized listing,
//! downloads changed files into a staging directory with a bounded worker
//! pool, and persists sync state so an interrupted run is detected on the
//! next start.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Error taxonomy for sync operations
pub mod error;

/// Sync path validation, exclusion patterns and config loading
pub mod config;

/// Manifest types and local manifest construction
pub mod manifest;

/// Three-way manifest comparison
pub mod comparison;

/// Persisted sync state and startup checks
pub mod state;

/// Download orchestration, staging apply and the engine state machine
pub mod sync;

pub use comparison::{DiffEngine, ManifestDiff};
pub use config::{Config, ExclusionSet, PathPolicy, SyncPathEntry};
pub use error::{Result, SyncError};
pub use manifest::{FileRecord, Manifest, ManifestBuild, ManifestBuilder};
pub use state::{SyncState, SyncStateStore};
pub use sync::{
    DownloadOrchestrator, DownloadProgress, EngineState, FetchError, MirrorServer, ModSyncServer,
    Recovery, SyncEngine,
};
