//! Sync path validation, exclusion patterns and config loading
//!
//! This module handles:
//! - Config file discovery and TOML parsing
//! - Sync path validation against the installation root
//! - Gitignore-style exclusion globs with parent exclusion
//! - Applying client toggles to server-declared sync paths

mod discovery;
mod patterns;
mod types;
mod validation;


use std::fs;
use std::path::Path;

use tracing::debug;

pub use discovery::{CONFIG_FILE_NAME, ConfigDiscovery};
pub use patterns::ExclusionSet;
pub use types::{Config, DEFAULT_MAX_CONCURRENT_DOWNLOADS, SyncPathEntry};
pub use validation::{ConfigValidator, PathPolicy};

use crate::error::{Result, SyncError};

/// Loads, parses and validates client configuration
pub struct ConfigLoader;

impl ConfigLoader {
    /// Discover and load the client configuration for `root`.
    ///
    /// Falls back to [`Config::default`] when no config file exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is malformed, or holds
    /// an invalid sync path or pattern. No partial config is returned.
    pub fn load(root: &Path, explicit: Option<&Path>) -> Result<Config> {
        let policy = PathPolicy::new(root)?;

        let config = match ConfigDiscovery::discover(root, explicit) {
            Some(path) => {
                debug!("Loading config from {}", path.display());
                Self::from_file(&path)?
            }
            None => {
                debug!("No config file found, using defaults");
                Config::default()
            }
        };

        ConfigValidator::validate(&config, &policy)?;

        Ok(config)
    }

    /// Read and parse a config file without validating it
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::ConfigParse`] if the file cannot be read or
    /// parsed.
    pub fn from_file(path: &Path) -> Result<Config> {
        let content = fs::read_to_string(path).map_err(|e| SyncError::ConfigParse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::parse(&content, path)
    }

    /// Parse config text; `origin` is only used in error messages
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::ConfigParse`] on malformed input.
    pub fn parse(content: &str, origin: &Path) -> Result<Config> {
        toml::from_str(content).map_err(|e| SyncError::ConfigParse {
            path: origin.to_path_buf(),
            reason: e.to_string(),
        })
    }
}
