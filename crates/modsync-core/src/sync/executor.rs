//! Staging directory handling and apply
//!
//! Downloads land in a staging directory inside the installation root so
//! that moving them into place is a rename on the same filesystem.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{Result, SyncError};
use crate::manifest::normalize_path;

/// Prefix of staging directories created inside the root
pub const STAGING_PREFIX: &str = ".modsync-staging-";

/// Counts from one apply
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyReport {
    /// Staged files moved into the live tree
    pub moved: usize,
    /// Removed files deleted from the live tree
    pub deleted: usize,
}

/// Join a manifest-relative path onto `base`, refusing anything that could
/// land outside it.
///
/// # Errors
///
/// Returns [`SyncError::UnsafePath`] for empty paths, rooted paths, drive
/// prefixes and `..` segments.
pub fn safe_join(base: &Path, rel: &str) -> Result<PathBuf> {
    let normalized = normalize_path(rel);
    let unsafe_path = || SyncError::UnsafePath {
        path: rel.to_string(),
    };

    if normalized.is_empty() || rel.starts_with(['/', '\\']) {
        return Err(unsafe_path());
    }

    let mut joined = base.to_path_buf();
    for component in Path::new(&normalized).components() {
        match component {
            Component::Normal(part) if !part.to_string_lossy().contains(':') => joined.push(part),
            _ => return Err(unsafe_path()),
        }
    }
    Ok(joined)
}

/// Moves staged downloads into place and performs deletions
pub struct StagingApplier;

impl StagingApplier {
    /// Create a fresh, uniquely named staging directory inside `root`
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Io`] if the directory cannot be created.
    pub fn create_staging_dir(root: &Path) -> Result<PathBuf> {
        let dir = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(root)
            .map_err(|e| SyncError::io(root, e))?;
        let path = dir.keep();
        debug!("Created staging directory {}", path.display());
        Ok(path)
    }

    /// Delete a staging directory; a missing directory is not an error
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Io`] if the directory exists but cannot be removed.
    pub fn remove_staging_dir(staging: &Path) -> Result<()> {
        match fs::remove_dir_all(staging) {
            Ok(()) => {
                debug!("Removed staging directory {}", staging.display());
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SyncError::io(staging, e)),
        }
    }

    /// Move every file under `staging` to the same relative location under
    /// `root`, delete `deletes`, then remove the staging directory.
    ///
    /// A missing staging directory or an already-deleted file is skipped, so
    /// applying the same pending update twice is harmless.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Apply`] if a file cannot be moved or deleted and
    /// [`SyncError::UnsafePath`] if a deletion path escapes the root.
    pub fn apply(root: &Path, staging: &Path, deletes: &[String]) -> Result<ApplyReport> {
        let mut report = ApplyReport::default();

        if !staging.as_os_str().is_empty() && staging.is_dir() {
            for item in WalkDir::new(staging).sort_by_file_name() {
                let item = item.map_err(|e| {
                    let path = e.path().unwrap_or(staging).to_path_buf();
                    SyncError::Apply {
                        path,
                        source: e.into(),
                    }
                })?;
                if !item.file_type().is_file() {
                    continue;
                }
                let Ok(rel) = item.path().strip_prefix(staging) else {
                    continue;
                };
                let dest = root.join(rel);
                Self::move_file(item.path(), &dest)?;
                debug!("Applied {}", dest.display());
                report.moved += 1;
            }
        }

        for rel in deletes {
            let target = safe_join(root, rel)?;
            match fs::remove_file(&target) {
                Ok(()) => {
                    debug!("Deleted {}", target.display());
                    report.deleted += 1;
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    debug!("{} already gone", target.display());
                }
                Err(source) => {
                    return Err(SyncError::Apply {
                        path: target,
                        source,
                    });
                }
            }
        }

        if !staging.as_os_str().is_empty()
            && let Err(e) = Self::remove_staging_dir(staging)
        {
            warn!("Applied update but could not remove staging: {e}");
        }

        info!(
            "Applied update: {} files moved, {} deleted",
            report.moved, report.deleted
        );
        Ok(report)
    }

    /// Rename into place, falling back to copy + remove across filesystems
    fn move_file(source: &Path, dest: &Path) -> Result<()> {
        let apply_err = |path: &Path, source: io::Error| SyncError::Apply {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|e| apply_err(parent, e))?;
        }

        if fs::rename(source, dest).is_ok() {
            return Ok(());
        }

        fs::copy(source, dest).map_err(|e| apply_err(dest, e))?;
        fs::remove_file(source).map_err(|e| apply_err(source, e))?;
        Ok(())
    }
}
