//! Manifest types and local manifest construction
//!
//! A manifest maps normalized relative paths to [`FileRecord`]s. Keys are
//! compared case-insensitively because installations commonly live on
//! case-insensitive filesystems, while the spelling first inserted for a key
//! is kept for display and I/O.

mod builder;
mod checksum;

#[cfg(test)]
mod integration_tests;

use std::collections::BTreeMap;
use std::collections::btree_map::Entry as Slot;

use serde::{Deserialize, Serialize};

pub use builder::{DuplicatePath, ManifestBuild, ManifestBuilder, NOSYNC_MARKERS, PATCHER_PATH};
pub use checksum::FileChecksum;

/// Checksum and sync flag for a single file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    /// CRC-32 of the full file content
    pub checksum: u32,
    /// Present locally but never applied automatically
    #[serde(default)]
    pub no_sync: bool,
}

impl FileRecord {
    /// Record for a file that participates in sync
    #[must_use]
    pub const fn new(checksum: u32) -> Self {
        Self {
            checksum,
            no_sync: false,
        }
    }

    /// Record for a file excluded from automatic handling
    #[must_use]
    pub const fn no_sync(checksum: u32) -> Self {
        Self {
            checksum,
            no_sync: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Entry {
    path: String,
    record: FileRecord,
}

/// Case-insensitive path to [`FileRecord`] mapping
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    from = "BTreeMap<String, FileRecord>",
    into = "BTreeMap<String, FileRecord>"
)]
pub struct Manifest {
    entries: BTreeMap<String, Entry>,
}

/// Convert a relative path to the canonical `/`-separated form.
///
/// Backslashes become forward slashes, `.` segments and empty segments are
/// dropped. `..` segments are kept so callers can still reject them.
#[must_use]
pub fn normalize_path(path: &str) -> String {
    path.replace('\\', "/")
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// Case-folded comparison key for a relative path
#[must_use]
pub fn fold_key(path: &str) -> String {
    normalize_path(path).to_lowercase()
}

impl Manifest {
    /// Create an empty manifest
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record, replacing the record of any case variant of the
    /// same path.
    ///
    /// The spelling seen first is kept. Returns that spelling and the
    /// replaced record, if any.
    pub fn insert(&mut self, path: &str, record: FileRecord) -> Option<(String, FileRecord)> {
        let path = normalize_path(path);
        match self.entries.entry(path.to_lowercase()) {
            Slot::Occupied(mut slot) => {
                let old = std::mem::replace(&mut slot.get_mut().record, record);
                Some((slot.get().path.clone(), old))
            }
            Slot::Vacant(slot) => {
                slot.insert(Entry { path, record });
                None
            }
        }
    }

    /// Look up a record by path, ignoring case
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&FileRecord> {
        self.entries.get(&fold_key(path)).map(|entry| &entry.record)
    }

    /// Whether the manifest holds `path`, ignoring case
    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(&fold_key(path))
    }

    /// Remove a path, ignoring case
    pub fn remove(&mut self, path: &str) -> Option<FileRecord> {
        self.entries.remove(&fold_key(path)).map(|entry| entry.record)
    }

    /// Number of files
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the manifest is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate paths and records in case-folded order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FileRecord)> {
        self.entries
            .values()
            .map(|entry| (entry.path.as_str(), &entry.record))
    }

    /// Iterate paths in case-folded order
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.values().map(|entry| entry.path.as_str())
    }

    /// Keep only entries equal to, or beneath, one of `sync_paths`
    #[must_use]
    pub fn restrict_to<S: AsRef<str>>(&self, sync_paths: &[S]) -> Self {
        let roots: Vec<String> = sync_paths.iter().map(|p| fold_key(p.as_ref())).collect();
        let entries = self
            .entries
            .iter()
            .filter(|(key, _)| {
                roots.iter().any(|root| {
                    key.as_str() == root
                        || (key.starts_with(root.as_str())
                            && key.as_bytes().get(root.len()) == Some(&b'/'))
                })
            })
            .map(|(key, entry)| (key.clone(), entry.clone()))
            .collect();
        Self { entries }
    }
}

impl From<BTreeMap<String, FileRecord>> for Manifest {
    fn from(map: BTreeMap<String, FileRecord>) -> Self {
        map.into_iter().collect()
    }
}

impl From<Manifest> for BTreeMap<String, FileRecord> {
    fn from(manifest: Manifest) -> Self {
        manifest
            .entries
            .into_values()
            .map(|entry| (entry.path, entry.record))
            .collect()
    }
}

impl<S: AsRef<str>> FromIterator<(S, FileRecord)> for Manifest {
    fn from_iter<I: IntoIterator<Item = (S, FileRecord)>>(iter: I) -> Self {
        let mut manifest = Self::new();
        for (path, record) in iter {
            manifest.insert(path.as_ref(), record);
        }
        manifest
    }
}
