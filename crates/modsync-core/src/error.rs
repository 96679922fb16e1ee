//! Error types for modsync operations.
//!
//! Every variant carries the path, file or step it refers to so the host
//! can tell the user what to act on.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using [`SyncError`]
pub type Result<T> = std::result::Result<T, SyncError>;

/// Errors surfaced by the synchronization engine.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A configured sync path is rooted.
    #[error("invalid sync path '{path}': paths must be relative to the installation root")]
    AbsolutePathRejected {
        /// The offending path as configured
        path: String,
    },

    /// A configured sync path resolves outside the installation root.
    #[error("invalid sync path '{path}': paths must stay within the installation root")]
    PathOutsideRoot {
        /// The offending path as configured
        path: String,
    },

    /// A configured sync path is otherwise unusable (empty, not UTF-8).
    #[error("invalid sync path '{path}': {reason}")]
    InvalidSyncPath {
        /// The offending path as configured
        path: String,
        /// Why the path was rejected
        reason: String,
    },

    /// An exclusion pattern could not be compiled.
    #[error("invalid exclusion pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// The offending pattern
        pattern: String,
        /// Compiler message
        reason: String,
    },

    /// A config value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A config file could not be read or parsed.
    #[error("failed to load config file {}: {reason}", path.display())]
    ConfigParse {
        /// Config file location
        path: PathBuf,
        /// Parser or I/O message
        reason: String,
    },

    /// The remote manifest, version or sync path listing was unavailable.
    #[error("failed to fetch {step} from server: {reason}")]
    ManifestFetch {
        /// Which request failed (version, sync paths, manifest)
        step: &'static str,
        /// Transport message
        reason: String,
    },

    /// A local file could not be read while building the manifest.
    #[error("failed to hash {}: {source}. Ensure no files are open and try again", path.display())]
    Hashing {
        /// File being hashed
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A single file download failed and the batch was cancelled.
    #[error("download of '{path}' failed: {reason}")]
    DownloadFailed {
        /// Relative path of the file that failed
        path: String,
        /// Fetch or write message
        reason: String,
    },

    /// The download batch was cancelled by the caller.
    #[error("download cancelled after {completed} of {total} files")]
    Cancelled {
        /// Files finished before the batch drained
        completed: usize,
        /// Files in the batch
        total: usize,
    },

    /// The previous synchronization did not complete.
    #[error(
        "previous update did not complete (staging: '{staging_dir}', {pending_deletes} pending deletions). \
         Run recovery to finish or discard it before syncing again"
    )]
    UnfinishedRunDetected {
        /// Staging directory recorded in the state file
        staging_dir: String,
        /// Number of deletions recorded in the state file
        pending_deletes: usize,
    },

    /// The unfinished update recorded a staging directory that no longer
    /// exists, so it cannot be finished.
    #[error(
        "staging directory '{staging_dir}' of the unfinished update is missing; \
         discard the update so the next sync downloads the files again"
    )]
    StagingMissing {
        /// Staging directory recorded in the state file
        staging_dir: String,
    },

    /// The state file exists but could not be parsed.
    #[error(
        "failed to parse state file {}: {reason}. If you have not edited it, delete it to force a fresh sync",
        path.display()
    )]
    StateCorrupt {
        /// State file location
        path: PathBuf,
        /// Parser message
        reason: String,
    },

    /// The state file could not be written.
    #[error("failed to persist state file {}: {reason}", path.display())]
    StatePersist {
        /// State file location
        path: PathBuf,
        /// I/O or serializer message
        reason: String,
    },

    /// A relative path would escape the directory it is joined onto.
    #[error("refusing unsafe relative path '{path}'")]
    UnsafePath {
        /// The offending relative path
        path: String,
    },

    /// Moving staged files into place or deleting removed files failed.
    #[error("failed to apply update at {}: {source}", path.display())]
    Apply {
        /// Path being written or removed
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// An engine operation was called in the wrong state.
    #[error("cannot {operation} while engine is {state}")]
    InvalidTransition {
        /// Operation attempted
        operation: &'static str,
        /// Current engine state
        state: String,
    },

    /// Other filesystem failure.
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        /// Path involved
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl SyncError {
    /// Build an [`SyncError::Io`] for `path`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error comes from sync path or pattern validation.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::AbsolutePathRejected { .. }
                | Self::PathOutsideRoot { .. }
                | Self::InvalidSyncPath { .. }
                | Self::InvalidPattern { .. }
                | Self::InvalidConfig(_)
                | Self::ConfigParse { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_path() {
        let err = SyncError::PathOutsideRoot {
            path: "../../etc/shadow".to_string(),
        };
        assert!(err.to_string().contains("../../etc/shadow"));
        assert!(err.is_validation());

        let err = SyncError::DownloadFailed {
            path: "BepInEx/plugins/a.dll".to_string(),
            reason: "connection reset".to_string(),
        };
        assert!(err.to_string().contains("BepInEx/plugins/a.dll"));
        assert!(!err.is_validation());
    }

    #[test]
    fn test_unfinished_run_is_actionable() {
        let err = SyncError::UnfinishedRunDetected {
            staging_dir: ".modsync-staging-x".to_string(),
            pending_deletes: 2,
        };
        let msg = err.to_string();
        assert!(msg.contains(".modsync-staging-x"));
        assert!(msg.contains("recovery"));
    }
}
