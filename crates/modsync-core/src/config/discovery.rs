//! Configuration file discovery

use std::path::{Path, PathBuf};

/// Client config file name looked up in the installation root
pub const CONFIG_FILE_NAME: &str = "modsync.toml";

/// Config file discovery
pub struct ConfigDiscovery;

impl ConfigDiscovery {
    /// Find the config file to load.
    ///
    /// Precedence (highest first):
    /// 1. Explicit path from the host (returned even if missing so the
    ///    loader reports it)
    /// 2. `<root>/modsync.toml`
    /// 3. `<config dir>/modsync/config.toml`
    #[must_use]
    pub fn discover(root: &Path, explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }

        let local = root.join(CONFIG_FILE_NAME);
        if local.is_file() {
            return Some(local);
        }

        Self::find_global_config()
    }

    /// Find global config in the platform config directory
    fn find_global_config() -> Option<PathBuf> {
        let global_config = dirs::config_dir()?.join("modsync").join("config.toml");

        if global_config.is_file() {
            Some(global_config)
        } else {
            None
        }
    }
}
