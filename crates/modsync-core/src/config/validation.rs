//! Sync path and configuration validation
//!
//! Sync paths come from the server and from the client config. Both are
//! untrusted until they pass [`PathPolicy`]: a path must be relative and
//! must resolve inside the installation root. Validation is all-or-nothing.

use std::path::{Path, PathBuf};

use super::patterns::ExclusionSet;
use super::types::{Config, SyncPathEntry};
use crate::error::{Result, SyncError};
use crate::manifest::normalize_path;

/// Validates sync paths against an installation root
#[derive(Debug, Clone)]
pub struct PathPolicy {
    root: PathBuf,
}

impl PathPolicy {
    /// Create a policy for `root`
    ///
    /// # Errors
    ///
    /// Returns an error if the root cannot be canonicalized.
    pub fn new(root: &Path) -> Result<Self> {
        let root = dunce::canonicalize(root).map_err(|e| SyncError::io(root, e))?;
        Ok(Self { root })
    }

    /// Canonical installation root
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Validate bare path strings, all enabled
    ///
    /// # Errors
    ///
    /// Fails on the first invalid path; see [`PathPolicy::validate`].
    pub fn validate_paths<S: AsRef<str>>(&self, paths: &[S]) -> Result<Vec<SyncPathEntry>> {
        paths
            .iter()
            .map(|path| self.validate_path(path.as_ref()).map(SyncPathEntry::enabled))
            .collect()
    }

    /// Validate sync path entries, returning them with normalized paths
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::AbsolutePathRejected`] for rooted paths,
    /// [`SyncError::PathOutsideRoot`] for paths escaping the root and
    /// [`SyncError::InvalidSyncPath`] for empty paths or the root itself.
    pub fn validate(&self, entries: &[SyncPathEntry]) -> Result<Vec<SyncPathEntry>> {
        entries
            .iter()
            .map(|entry| {
                self.validate_path(&entry.path).map(|path| SyncPathEntry {
                    path,
                    enabled: entry.enabled,
                })
            })
            .collect()
    }

    /// Validate a single relative path, returning its normalized form
    ///
    /// # Errors
    ///
    /// See [`PathPolicy::validate`].
    pub fn validate_path(&self, path: &str) -> Result<String> {
        if path.trim().is_empty() {
            return Err(SyncError::InvalidSyncPath {
                path: path.to_string(),
                reason: "path cannot be empty".to_string(),
            });
        }

        if is_rooted(path) {
            return Err(SyncError::AbsolutePathRejected {
                path: path.to_string(),
            });
        }

        let Some(resolved) = resolve_lexically(path) else {
            return Err(SyncError::PathOutsideRoot {
                path: path.to_string(),
            });
        };

        if resolved.is_empty() {
            return Err(SyncError::InvalidSyncPath {
                path: path.to_string(),
                reason: "path must name a file or directory below the root".to_string(),
            });
        }

        // Existing paths may still escape through a symlink
        let full = self.root.join(&resolved);
        if full.exists() {
            let canonical = dunce::canonicalize(&full).map_err(|e| SyncError::io(&full, e))?;
            if !canonical.starts_with(&self.root) {
                return Err(SyncError::PathOutsideRoot {
                    path: path.to_string(),
                });
            }
        }

        Ok(resolved)
    }
}

/// Whether a configured path is rooted on any platform the client runs on.
fn is_rooted(path: &str) -> bool {
    let bytes = path.as_bytes();
    path.starts_with('/')
        || path.starts_with('\\')
        || Path::new(path).has_root()
        || (bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':')
}

/// Resolve `.` and `..` segments without touching the filesystem.
///
/// Returns `None` if the path climbs above its starting directory.
fn resolve_lexically(path: &str) -> Option<String> {
    let mut stack: Vec<&str> = Vec::new();
    let normalized = normalize_path(path);
    for segment in normalized.split('/') {
        match segment {
            "" => {}
            ".." => {
                stack.pop()?;
            }
            other => stack.push(other),
        }
    }
    Some(stack.join("/"))
}

/// Whole-config validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate a configuration against an installation root
    ///
    /// # Errors
    ///
    /// Returns an error if any sync path or exclusion pattern is invalid, or
    /// if the download pool width is zero.
    pub fn validate(config: &Config, policy: &PathPolicy) -> Result<()> {
        policy.validate(&config.sync_paths)?;
        ExclusionSet::new(&config.exclusion_patterns())?;

        if config.max_concurrent_downloads == 0 {
            return Err(SyncError::InvalidConfig(
                "max_concurrent_downloads must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn policy() -> (TempDir, PathPolicy) {
        let tmp = TempDir::new().unwrap();
        let policy = PathPolicy::new(tmp.path()).unwrap();
        (tmp, policy)
    }

    #[test]
    fn test_relative_paths_accepted() {
        let (_tmp, policy) = policy();
        let entries = policy
            .validate(&[
                SyncPathEntry::enabled("BepInEx\\plugins"),
                SyncPathEntry::disabled("user/mods/./x/../y"),
                SyncPathEntry::enabled("doesnotexist"),
            ])
            .unwrap();

        assert_eq!(entries[0].path, "BepInEx/plugins");
        assert_eq!(entries[1], SyncPathEntry::disabled("user/mods/y"));
        assert_eq!(entries[2].path, "doesnotexist");
    }

    #[test]
    fn test_absolute_paths_rejected() {
        let (_tmp, policy) = policy();
        for path in ["/etc/shadow", "C:\\Windows\\System32\\cmd.exe", "\\server\\share", "c:relative"] {
            let result = policy.validate_path(path);
            assert!(
                matches!(result, Err(SyncError::AbsolutePathRejected { .. })),
                "{path} should be rejected"
            );
        }
    }

    #[test]
    fn test_escaping_paths_rejected() {
        let (_tmp, policy) = policy();
        for path in ["../../etc/shadow", "plugins/../../outside", ".."] {
            let result = policy.validate_path(path);
            assert!(
                matches!(result, Err(SyncError::PathOutsideRoot { .. })),
                "{path} should be rejected"
            );
        }
    }

    #[test]
    fn test_root_itself_rejected() {
        let (_tmp, policy) = policy();
        assert!(matches!(
            policy.validate_path("plugins/.."),
            Err(SyncError::InvalidSyncPath { .. })
        ));
        assert!(matches!(
            policy.validate_path(""),
            Err(SyncError::InvalidSyncPath { .. })
        ));
    }

    #[test]
    fn test_validation_is_all_or_nothing() {
        let (_tmp, policy) = policy();
        let result = policy.validate_paths(&["plugins", "/etc/shadow", "mods"]);
        assert!(result.is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_escape_rejected() {
        let (tmp, policy) = policy();
        let outside = TempDir::new().unwrap();
        std::os::unix::fs::symlink(outside.path(), tmp.path().join("link")).unwrap();

        assert!(matches!(
            policy.validate_path("link"),
            Err(SyncError::PathOutsideRoot { .. })
        ));
    }

    #[test]
    fn test_config_validator() {
        let (tmp, policy) = policy();
        fs::create_dir(tmp.path().join("plugins")).unwrap();

        let mut config = Config {
            sync_paths: vec![SyncPathEntry::enabled("plugins")],
            ..Config::default()
        };
        assert!(ConfigValidator::validate(&config, &policy).is_ok());

        config.exclusions.push("  ".to_string());
        assert!(ConfigValidator::validate(&config, &policy).is_err());

        config.exclusions.clear();
        config.max_concurrent_downloads = 0;
        assert!(ConfigValidator::validate(&config, &policy).is_err());
    }
}
