//! Three-way manifest comparison
//!
//! Compares the local manifest against the remote manifest and the remote
//! manifest recorded at the last successful sync:
//! - Added: on the server, missing locally (or present but no-sync)
//! - Updated: changed on the server since the last sync and different locally
//! - Removed: previously synced, still present locally, gone from the server
//!
//! All lookups ignore case. The three lists are disjoint by construction.

use std::collections::BTreeSet;

use crate::manifest::{Manifest, fold_key};

/// Paths to add, update and remove
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestDiff {
    /// Remote files missing locally
    pub added: Vec<String>,
    /// Remote files whose local copy is stale
    pub updated: Vec<String>,
    /// Local files removed from the server
    pub removed: Vec<String>,
}

impl ManifestDiff {
    /// Check if there is nothing to do
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }

    /// Count total number of changes
    #[must_use]
    pub fn count(&self) -> usize {
        self.added.len() + self.updated.len() + self.removed.len()
    }

    /// Files that must be downloaded (added, then updated)
    #[must_use]
    pub fn downloads(&self) -> Vec<String> {
        self.added.iter().chain(&self.updated).cloned().collect()
    }
}

/// Computes [`ManifestDiff`]s
pub struct DiffEngine;

impl DiffEngine {
    /// Compare `local` against `remote` and the `previous` remote manifest.
    ///
    /// Output lists use the remote spelling for added and updated paths and
    /// the local spelling for removed paths, each sorted case-insensitively.
    #[must_use]
    pub fn compute(local: &Manifest, remote: &Manifest, previous: &Manifest) -> ManifestDiff {
        ManifestDiff {
            added: Self::added(local, remote),
            updated: Self::updated(local, remote, previous),
            removed: Self::removed(local, remote, previous),
        }
    }

    /// Remote paths with no usable local copy.
    ///
    /// A local file flagged no-sync counts as absent.
    #[must_use]
    pub fn added(local: &Manifest, remote: &Manifest) -> Vec<String> {
        remote
            .paths()
            .filter(|path| local.get(path).is_none_or(|record| record.no_sync))
            .map(str::to_string)
            .collect()
    }

    /// Paths changed on the server since the last sync whose local content
    /// does not already match.
    #[must_use]
    pub fn updated(local: &Manifest, remote: &Manifest, previous: &Manifest) -> Vec<String> {
        remote
            .iter()
            .filter(|(path, remote_record)| {
                let Some(local_record) = local.get(path) else {
                    return false;
                };
                if local_record.no_sync {
                    return false;
                }
                let changed_since_sync = previous
                    .get(path)
                    .is_none_or(|prev| prev.checksum != remote_record.checksum);
                changed_since_sync && remote_record.checksum != local_record.checksum
            })
            .map(|(path, _)| path.to_string())
            .collect()
    }

    /// Previously synced local paths no longer on the server.
    ///
    /// Files that never appeared in a remote manifest are never removed,
    /// and neither are local no-sync files.
    #[must_use]
    pub fn removed(local: &Manifest, remote: &Manifest, previous: &Manifest) -> Vec<String> {
        let previous_keys: BTreeSet<String> = previous.paths().map(fold_key).collect();
        local
            .iter()
            .filter(|(path, record)| {
                !record.no_sync && previous_keys.contains(&fold_key(path)) && !remote.contains(path)
            })
            .map(|(path, _)| path.to_string())
            .collect()
    }
}
