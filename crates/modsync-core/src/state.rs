//! Persisted sync state
//!
//! The state file records the remote manifest of the last successful sync
//! and, while an update is being applied, the staging directory and pending
//! deletions. A non-empty staging directory or deletion list at startup
//! means the previous run was interrupted.
//!
//! Every write goes to a temporary file in the same directory which is then
//! renamed over the state file, so a crash never leaves a torn file.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::error::{Result, SyncError};
use crate::manifest::Manifest;

/// State file name in the installation root
pub const STATE_FILE_NAME: &str = ".modsync";

/// Persisted synchronization state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncState {
    /// Remote manifest at the last successful sync
    #[serde(default)]
    pub previous_manifest: Manifest,
    /// Staging directory of an update being applied, empty when none
    #[serde(default)]
    pub staging_dir: String,
    /// Deletions of an update being applied, empty when none
    #[serde(default)]
    pub pending_deletes: Vec<String>,
    /// Manifest to commit once the pending update is applied
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_manifest: Option<Manifest>,
}

impl SyncState {
    /// Whether an update was started but not committed
    #[must_use]
    pub fn is_unfinished(&self) -> bool {
        !self.staging_dir.is_empty() || !self.pending_deletes.is_empty()
    }
}

/// Reads and atomically writes the state file
#[derive(Debug, Clone)]
pub struct SyncStateStore {
    path: PathBuf,
}

impl SyncStateStore {
    /// Store for the state file inside `root`
    #[must_use]
    pub fn new(root: &Path) -> Self {
        Self {
            path: root.join(STATE_FILE_NAME),
        }
    }

    /// Store for an explicit state file location
    #[must_use]
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// State file location
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the persisted state; a missing file yields the default state.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::StateCorrupt`] if the file cannot be parsed and
    /// [`SyncError::Io`] if it cannot be read.
    pub fn load(&self) -> Result<SyncState> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No state file at {}, starting fresh", self.path.display());
                return Ok(SyncState::default());
            }
            Err(e) => return Err(SyncError::io(&self.path, e)),
        };

        serde_json::from_str(&content).map_err(|e| SyncError::StateCorrupt {
            path: self.path.clone(),
            reason: e.to_string(),
        })
    }

    /// Refuse to start when a previous run did not complete.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::UnfinishedRunDetected`] when the state records a
    /// staging directory or pending deletions.
    pub fn startup_check(state: &SyncState) -> Result<()> {
        if state.is_unfinished() {
            return Err(SyncError::UnfinishedRunDetected {
                staging_dir: state.staging_dir.clone(),
                pending_deletes: state.pending_deletes.len(),
            });
        }
        Ok(())
    }

    /// Record an update that is about to be applied.
    ///
    /// The previous manifest is kept; `new_manifest` is stored separately so
    /// recovery can finish the update after a crash.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::StatePersist`] if the file cannot be written.
    pub fn mark_pending(
        &self,
        current: &SyncState,
        staging_dir: &Path,
        pending_deletes: &[String],
        new_manifest: &Manifest,
    ) -> Result<SyncState> {
        let state = SyncState {
            previous_manifest: current.previous_manifest.clone(),
            staging_dir: staging_dir.to_string_lossy().into_owned(),
            pending_deletes: pending_deletes.to_vec(),
            pending_manifest: Some(new_manifest.clone()),
        };
        self.write(&state)?;
        debug!(
            "Marked pending update: staging {}, {} deletions",
            state.staging_dir,
            state.pending_deletes.len()
        );
        Ok(state)
    }

    /// Advance the previous manifest and clear all pending fields.
    ///
    /// Only call once staged files are in place and removals are done.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::StatePersist`] if the file cannot be written.
    pub fn commit(&self, new_manifest: &Manifest) -> Result<SyncState> {
        let state = SyncState {
            previous_manifest: new_manifest.clone(),
            ..SyncState::default()
        };
        self.write(&state)?;
        info!("Committed sync state with {} files", new_manifest.len());
        Ok(state)
    }

    fn write(&self, state: &SyncState) -> Result<()> {
        let persist_err = |reason: String| SyncError::StatePersist {
            path: self.path.clone(),
            reason,
        };

        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let json = serde_json::to_vec_pretty(state).map_err(|e| persist_err(e.to_string()))?;

        let mut temp = NamedTempFile::new_in(dir).map_err(|e| persist_err(e.to_string()))?;
        temp.write_all(&json)
            .map_err(|e| persist_err(e.to_string()))?;
        temp.as_file()
            .sync_all()
            .map_err(|e| persist_err(e.to_string()))?;
        temp.persist(&self.path)
            .map_err(|e| persist_err(e.error.to_string()))?;

        Ok(())
    }
}
