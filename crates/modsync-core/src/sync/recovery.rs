//! Recovery of interrupted updates
//!
//! An update that was marked pending but never committed leaves its staging
//! directory and deletion list in the state file. Recovery either finishes
//! that update or throws it away.

use std::path::{Component, Path, PathBuf};

use tracing::info;

use super::executor::{ApplyReport, StagingApplier};
use crate::error::{Result, SyncError};
use crate::state::{SyncState, SyncStateStore};

/// Finishes or discards an unfinished update
pub struct Recovery;

impl Recovery {
    /// The unfinished update recorded for `root`, if any
    ///
    /// # Errors
    ///
    /// Returns an error if the state file cannot be read.
    pub fn pending(root: &Path) -> Result<Option<SyncState>> {
        let state = SyncStateStore::new(root).load()?;
        Ok(state.is_unfinished().then_some(state))
    }

    /// Apply the recorded staging directory and deletions, then commit.
    ///
    /// The pending manifest becomes the previous manifest; if none was
    /// recorded the previous manifest is kept. Returns an empty report when
    /// nothing is pending.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::UnsafePath`] if the recorded staging directory
    /// lies outside `root`, [`SyncError::StagingMissing`] if it no longer
    /// exists, or the first apply or persist error. The state file is left
    /// untouched in each case.
    pub fn resume(root: &Path) -> Result<ApplyReport> {
        let root = dunce::canonicalize(root).map_err(|e| SyncError::io(root, e))?;
        let store = SyncStateStore::new(&root);
        let state = store.load()?;
        if !state.is_unfinished() {
            info!("No unfinished update to resume");
            return Ok(ApplyReport::default());
        }

        let staging = recorded_staging(&root, &state)?.unwrap_or_default();
        if !staging.as_os_str().is_empty() && !staging.is_dir() {
            return Err(SyncError::StagingMissing {
                staging_dir: state.staging_dir,
            });
        }
        let report = StagingApplier::apply(&root, &staging, &state.pending_deletes)?;
        let manifest = state
            .pending_manifest
            .as_ref()
            .unwrap_or(&state.previous_manifest);
        store.commit(manifest)?;

        info!("Resumed unfinished update");
        Ok(report)
    }

    /// Delete the recorded staging directory and clear the pending fields,
    /// keeping the previous manifest.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::UnsafePath`] if the recorded staging directory
    /// lies outside `root`, or the first filesystem or persist error.
    pub fn discard(root: &Path) -> Result<()> {
        let root = dunce::canonicalize(root).map_err(|e| SyncError::io(root, e))?;
        let store = SyncStateStore::new(&root);
        let state = store.load()?;
        if !state.is_unfinished() {
            info!("No unfinished update to discard");
            return Ok(());
        }

        if let Some(staging) = recorded_staging(&root, &state)? {
            StagingApplier::remove_staging_dir(&staging)?;
        }
        store.commit(&state.previous_manifest)?;

        info!("Discarded unfinished update");
        Ok(())
    }
}

fn recorded_staging(root: &Path, state: &SyncState) -> Result<Option<PathBuf>> {
    if state.staging_dir.is_empty() {
        return Ok(None);
    }
    let recorded = Path::new(&state.staging_dir);
    let staging = if recorded.is_absolute() {
        recorded.to_path_buf()
    } else {
        root.join(recorded)
    };

    let escapes = staging
        .components()
        .any(|c| matches!(c, Component::ParentDir));
    if escapes || !staging.starts_with(root) || staging == root {
        return Err(SyncError::UnsafePath {
            path: state.staging_dir.clone(),
        });
    }
    Ok(Some(staging))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;
    use crate::manifest::{FileRecord, Manifest};

    fn create(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    /// Leave `root` as a crash after `mark_pending` would
    fn interrupted(root: &Path) -> (PathBuf, Manifest) {
        let root = dunce::canonicalize(root).unwrap();
        create(&root, "mods/old.dll", "old");
        create(&root, "mods/a.dll", "v1");
        let staging = StagingApplier::create_staging_dir(&root).unwrap();
        create(&staging, "mods/a.dll", "v2");

        let store = SyncStateStore::new(&root);
        let previous: Manifest = [("mods/a.dll", FileRecord::new(1)), ("mods/old.dll", FileRecord::new(2))]
            .into_iter()
            .collect();
        let current = store.commit(&previous).unwrap();
        let next: Manifest = [("mods/a.dll", FileRecord::new(3))].into_iter().collect();
        store
            .mark_pending(&current, &staging, &["mods/old.dll".to_string()], &next)
            .unwrap();
        (staging, next)
    }

    #[test]
    fn test_pending_reports_unfinished_state() {
        let tmp = TempDir::new().unwrap();
        assert!(Recovery::pending(tmp.path()).unwrap().is_none());

        interrupted(tmp.path());
        let pending = Recovery::pending(tmp.path()).unwrap().unwrap();
        assert_eq!(pending.pending_deletes, vec!["mods/old.dll"]);
    }

    #[test]
    fn test_resume_finishes_update() {
        let tmp = TempDir::new().unwrap();
        let (staging, next) = interrupted(tmp.path());

        let report = Recovery::resume(tmp.path()).unwrap();

        assert_eq!(report, ApplyReport { moved: 1, deleted: 1 });
        assert_eq!(fs::read_to_string(tmp.path().join("mods/a.dll")).unwrap(), "v2");
        assert!(!tmp.path().join("mods/old.dll").exists());
        assert!(!staging.exists());

        let state = SyncStateStore::new(tmp.path()).load().unwrap();
        assert!(!state.is_unfinished());
        assert_eq!(state.previous_manifest, next);
    }

    #[test]
    fn test_discard_keeps_previous_manifest() {
        let tmp = TempDir::new().unwrap();
        let (staging, _) = interrupted(tmp.path());

        Recovery::discard(tmp.path()).unwrap();

        assert!(!staging.exists());
        assert_eq!(fs::read_to_string(tmp.path().join("mods/a.dll")).unwrap(), "v1");
        assert!(tmp.path().join("mods/old.dll").exists());

        let state = SyncStateStore::new(tmp.path()).load().unwrap();
        assert!(!state.is_unfinished());
        assert_eq!(state.previous_manifest.len(), 2);
    }

    #[test]
    fn test_resume_without_pending_is_noop() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(Recovery::resume(tmp.path()).unwrap(), ApplyReport::default());
        Recovery::discard(tmp.path()).unwrap();
        assert!(!tmp.path().join(crate::state::STATE_FILE_NAME).exists());
    }

    #[test]
    fn test_resume_with_missing_staging_keeps_pending_state() {
        let tmp = TempDir::new().unwrap();
        let (staging, _) = interrupted(tmp.path());
        fs::remove_dir_all(&staging).unwrap();

        let result = Recovery::resume(tmp.path());

        assert!(matches!(result, Err(SyncError::StagingMissing { .. })));
        assert!(tmp.path().join("mods/old.dll").exists());
        let state = SyncStateStore::new(tmp.path()).load().unwrap();
        assert!(state.is_unfinished());
        assert_eq!(state.previous_manifest.len(), 2);

        Recovery::discard(tmp.path()).unwrap();
        assert!(Recovery::pending(tmp.path()).unwrap().is_none());
    }

    #[test]
    fn test_staging_outside_root_is_refused() {
        let tmp = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        let store = SyncStateStore::new(tmp.path());
        store
            .mark_pending(&SyncState::default(), outside.path(), &[], &Manifest::new())
            .unwrap();

        assert!(matches!(
            Recovery::resume(tmp.path()),
            Err(SyncError::UnsafePath { .. })
        ));
        assert!(outside.path().exists());
    }
}
