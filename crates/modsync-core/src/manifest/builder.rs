//! Local manifest construction
//!
//! Walks each sync path, skips the patcher and no-sync marker files, hashes
//! every remaining file on a pool of scoped threads and merges the results
//! in enumeration order.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::thread;

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::checksum::FileChecksum;
use super::{FileRecord, Manifest, fold_key, normalize_path};
use crate::config::{ExclusionSet, SyncPathEntry};
use crate::error::{Result, SyncError};

/// Bootstrap patcher that applies pending updates; never self-managed
pub const PATCHER_PATH: &str = "BepInEx/patchers/Corter-ModSync-Patcher.dll";

/// File name suffixes that mark a file or directory as no-sync
pub const NOSYNC_MARKERS: [&str; 2] = [".nosync", ".nosync.txt"];

/// Two case variants of one path with different content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicatePath {
    /// Path whose content was kept (processed last)
    pub kept: String,
    /// Path whose content was replaced; its spelling stays in the manifest
    pub replaced: String,
    /// Checksum of the kept file
    pub kept_checksum: u32,
    /// Checksum of the replaced file
    pub replaced_checksum: u32,
}

/// Result of a manifest build
#[derive(Debug, Clone, Default)]
pub struct ManifestBuild {
    /// The merged manifest
    pub manifest: Manifest,
    /// Case-variant collisions resolved by keeping the later file
    pub conflicts: Vec<DuplicatePath>,
}

struct Candidate {
    rel: String,
    abs: PathBuf,
    no_sync: bool,
}

/// Builds a manifest from the files under the configured sync paths
pub struct ManifestBuilder {
    exclusions: ExclusionSet,
    workers: usize,
}

impl ManifestBuilder {
    /// Create a builder that applies `exclusions`
    #[must_use]
    pub fn new(exclusions: ExclusionSet) -> Self {
        let workers = thread::available_parallelism().map_or(4, NonZeroUsize::get);
        Self {
            exclusions,
            workers,
        }
    }

    /// Override the number of hashing threads
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Hash every file under `sync_paths`.
    ///
    /// Files under disabled sync paths, files carrying a no-sync marker and
    /// excluded files are included with `no_sync` set. Sync paths that do
    /// not exist are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Hashing`] if a file cannot be read and
    /// [`SyncError::Io`] if a directory cannot be walked.
    pub fn build(&self, root: &Path, sync_paths: &[SyncPathEntry]) -> Result<ManifestBuild> {
        let mut markers = MarkerIndex::new(root);
        let mut candidates = Vec::new();

        for entry in sync_paths {
            let base = root.join(&entry.path);
            if !base.exists() {
                debug!("Sync path {} does not exist, skipping", entry.path);
                continue;
            }
            self.collect(root, &base, entry.enabled, &mut markers, &mut candidates)?;
        }

        let checksums = self.hash_all(&candidates)?;

        let mut build = ManifestBuild::default();
        for (candidate, checksum) in candidates.into_iter().zip(checksums) {
            let record = FileRecord {
                checksum,
                no_sync: candidate.no_sync,
            };
            if let Some((replaced, old)) = build.manifest.insert(&candidate.rel, record)
                && old.checksum != checksum
            {
                warn!(
                    "Case-variant paths '{}' and '{}' differ in content, keeping content of '{}'",
                    replaced, candidate.rel, candidate.rel
                );
                build.conflicts.push(DuplicatePath {
                    kept: candidate.rel,
                    replaced,
                    kept_checksum: checksum,
                    replaced_checksum: old.checksum,
                });
            }
        }

        info!(
            "Hashed {} local files ({} case conflicts)",
            build.manifest.len(),
            build.conflicts.len()
        );

        Ok(build)
    }

    fn collect(
        &self,
        root: &Path,
        base: &Path,
        enabled: bool,
        markers: &mut MarkerIndex,
        candidates: &mut Vec<Candidate>,
    ) -> Result<()> {
        let patcher = fold_key(PATCHER_PATH);

        for item in WalkDir::new(base).follow_links(true).sort_by_file_name() {
            let item = item.map_err(|e| {
                let path = e.path().unwrap_or(base).to_path_buf();
                SyncError::io(path, e.into())
            })?;
            if !item.file_type().is_file() {
                continue;
            }

            let Ok(rel) = item.path().strip_prefix(root) else {
                continue;
            };
            let rel = normalize_path(&rel.to_string_lossy());

            if rel.to_lowercase() == patcher || is_marker(&rel) {
                continue;
            }

            let no_sync =
                !enabled || markers.is_marked(&rel) || self.exclusions.is_excluded_in_tree(&rel);

            candidates.push(Candidate {
                rel,
                abs: item.into_path(),
                no_sync,
            });
        }

        Ok(())
    }

    fn hash_all(&self, candidates: &[Candidate]) -> Result<Vec<u32>> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let chunk_size = candidates.len().div_ceil(self.workers);

        thread::scope(|scope| {
            let handles: Vec<_> = candidates
                .chunks(chunk_size)
                .map(|chunk| {
                    scope.spawn(move || {
                        chunk
                            .iter()
                            .map(|candidate| {
                                FileChecksum::compute(&candidate.abs).map_err(|source| {
                                    SyncError::Hashing {
                                        path: candidate.abs.clone(),
                                        source,
                                    }
                                })
                            })
                            .collect::<Result<Vec<u32>>>()
                    })
                })
                .collect();

            let mut checksums = Vec::with_capacity(candidates.len());
            for handle in handles {
                let part = handle
                    .join()
                    .unwrap_or_else(|payload| std::panic::resume_unwind(payload))?;
                checksums.extend(part);
            }
            Ok(checksums)
        })
    }
}

/// Whether a file name is itself a no-sync marker
fn is_marker(rel: &str) -> bool {
    let lower = rel.to_lowercase();
    NOSYNC_MARKERS.iter().any(|marker| lower.ends_with(marker))
}

/// Cached lookups of no-sync markers on disk.
///
/// A file is marked when `<file>.nosync` or `<file>.nosync.txt` exists, or
/// when any ancestor directory holds a `.nosync`/`.nosync.txt` file or is
/// itself marked the same way.
struct MarkerIndex {
    root: PathBuf,
    cache: HashMap<String, bool>,
}

impl MarkerIndex {
    fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            cache: HashMap::new(),
        }
    }

    fn is_marked(&mut self, rel: &str) -> bool {
        if self.has_sibling_marker(rel) {
            return true;
        }
        let mut end = rel.len();
        while let Some(idx) = rel[..end].rfind('/') {
            if self.dir_marked(&rel[..idx]) {
                return true;
            }
            end = idx;
        }
        false
    }

    fn dir_marked(&mut self, dir: &str) -> bool {
        if let Some(&marked) = self.cache.get(dir) {
            return marked;
        }
        let path = self.root.join(dir);
        let marked = NOSYNC_MARKERS
            .iter()
            .any(|marker| path.join(marker).is_file())
            || self.has_sibling_marker(dir);
        self.cache.insert(dir.to_string(), marked);
        marked
    }

    fn has_sibling_marker(&self, rel: &str) -> bool {
        NOSYNC_MARKERS
            .iter()
            .any(|marker| self.root.join(format!("{rel}{marker}")).exists())
    }
}
