//! Configuration types and structures

use serde::{Deserialize, Serialize};

use crate::manifest::fold_key;

/// Default width of the download worker pool
pub const DEFAULT_MAX_CONCURRENT_DOWNLOADS: usize = 32;

/// A sync path and whether it is enabled on this client
///
/// Deserializes from either a bare string (implicitly enabled) or a
/// `{ path, enabled }` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawSyncPath")]
pub struct SyncPathEntry {
    /// Path relative to the installation root
    pub path: String,
    /// Whether files under this path are applied automatically
    pub enabled: bool,
}

impl SyncPathEntry {
    /// Create an enabled entry
    #[must_use]
    pub fn enabled(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            enabled: true,
        }
    }

    /// Create a disabled entry
    #[must_use]
    pub fn disabled(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            enabled: false,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawSyncPath {
    Bare(String),
    Detailed {
        path: String,
        #[serde(default = "enabled_by_default")]
        enabled: bool,
    },
}

const fn enabled_by_default() -> bool {
    true
}

const fn default_max_concurrent_downloads() -> usize {
    DEFAULT_MAX_CONCURRENT_DOWNLOADS
}

impl From<RawSyncPath> for SyncPathEntry {
    fn from(raw: RawSyncPath) -> Self {
        match raw {
            RawSyncPath::Bare(path) => Self::enabled(path),
            RawSyncPath::Detailed { path, enabled } => Self { path, enabled },
        }
    }
}

/// Client configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Sync path toggles; server-declared paths not listed here are enabled
    pub sync_paths: Vec<SyncPathEntry>,

    /// Exclusions for commonly used mods
    #[serde(default)]
    pub common_mod_exclusions: Vec<String>,

    /// Additional user exclusions
    #[serde(default)]
    pub exclusions: Vec<String>,

    /// Delete files that were removed from the server
    #[serde(default)]
    pub delete_removed_files: bool,

    /// Width of the download worker pool
    #[serde(default = "default_max_concurrent_downloads")]
    pub max_concurrent_downloads: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sync_paths: Vec::new(),
            common_mod_exclusions: Vec::new(),
            exclusions: Vec::new(),
            delete_removed_files: false,
            max_concurrent_downloads: DEFAULT_MAX_CONCURRENT_DOWNLOADS,
        }
    }
}

impl Config {
    /// Enabled entries only
    pub fn enabled_sync_paths(&self) -> impl Iterator<Item = &SyncPathEntry> {
        self.sync_paths.iter().filter(|entry| entry.enabled)
    }

    /// All exclusion patterns, common ones first
    #[must_use]
    pub fn exclusion_patterns(&self) -> Vec<String> {
        self.common_mod_exclusions
            .iter()
            .chain(&self.exclusions)
            .cloned()
            .collect()
    }

    /// Apply this client's toggles to the paths a server declares.
    ///
    /// The server list is authoritative; a path is enabled unless a client
    /// entry for the same path (ignoring case and separators) disables it.
    #[must_use]
    pub fn toggle_server_paths(&self, server_paths: &[String]) -> Vec<SyncPathEntry> {
        server_paths
            .iter()
            .map(|path| {
                let key = fold_key(path);
                let enabled = self
                    .sync_paths
                    .iter()
                    .find(|entry| fold_key(&entry.path) == key)
                    .is_none_or(|entry| entry.enabled);
                SyncPathEntry {
                    path: path.clone(),
                    enabled,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert!(config.sync_paths.is_empty());
        assert!(!config.delete_removed_files);
        assert_eq!(config.max_concurrent_downloads, 32);
    }

    #[test]
    fn test_sync_path_forms() {
        let config: Config = toml::from_str(
            r#"
sync_paths = ["plugins", { path = "mods", enabled = false }, { path = "doesnotexist" }]
common_mod_exclusions = ["plugins/**/node_modules"]
"#,
        )
        .unwrap();

        assert_eq!(
            config.sync_paths,
            vec![
                SyncPathEntry::enabled("plugins"),
                SyncPathEntry::disabled("mods"),
                SyncPathEntry::enabled("doesnotexist"),
            ]
        );
        assert_eq!(config.common_mod_exclusions, vec!["plugins/**/node_modules"]);
        assert_eq!(
            config.enabled_sync_paths().map(|e| e.path.as_str()).collect::<Vec<_>>(),
            vec!["plugins", "doesnotexist"]
        );
    }

    #[test]
    fn test_missing_sync_paths_rejected() {
        let result: Result<Config, _> = toml::from_str(r#"invalid = "invalid""#);
        assert!(result.is_err());
    }

    #[test]
    fn test_toggle_server_paths() {
        let config = Config {
            sync_paths: vec![SyncPathEntry::disabled("BepInEx/Config")],
            ..Config::default()
        };

        let entries = config.toggle_server_paths(&[
            "BepInEx\\plugins".to_string(),
            "BepInEx\\config".to_string(),
        ]);

        assert!(entries[0].enabled);
        assert!(!entries[1].enabled);
    }

    #[test]
    fn test_exclusion_patterns_order() {
        let config = Config {
            common_mod_exclusions: vec!["a".to_string()],
            exclusions: vec!["b".to_string()],
            ..Config::default()
        };
        assert_eq!(config.exclusion_patterns(), vec!["a", "b"]);
    }
}
