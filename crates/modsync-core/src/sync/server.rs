//! Server collaborator
//!
//! The engine only needs four things from a server: its version, the sync
//! paths it declares, its manifest, and the bytes of a single file. The
//! transport behind them is up to the host.

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::executor::safe_join;
use crate::config::{ExclusionSet, PathPolicy};
use crate::error::{Result, SyncError};
use crate::manifest::{FileRecord, Manifest, ManifestBuilder};

/// Server configuration file name inside a mirror directory
pub const SERVER_CONFIG_FILE_NAME: &str = "modsync.server.toml";

/// Failure to fetch a single file
#[derive(Debug, Error)]
pub enum FetchError {
    /// The fetch observed the cancellation token; not a real failure
    #[error("fetch cancelled")]
    Cancelled,

    /// The server does not serve this path
    #[error("file not found on server: {0}")]
    NotFound(String),

    /// Transport-level failure
    #[error("transport error: {0}")]
    Transport(String),

    /// Local I/O failure while receiving or storing the file
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Capabilities the engine needs from a mod server
#[async_trait]
pub trait ModSyncServer: Send + Sync {
    /// Server version string
    async fn version(&self) -> Result<String>;

    /// Sync paths the server declares, relative to the installation root
    async fn sync_paths(&self) -> Result<Vec<String>>;

    /// Manifest of every file the server serves
    async fn manifest(&self) -> Result<Manifest>;

    /// Bytes of one file.
    ///
    /// Implementations should return [`FetchError::Cancelled`] promptly once
    /// `cancel` fires.
    async fn fetch_file(
        &self,
        path: &str,
        cancel: &CancellationToken,
    ) -> std::result::Result<Vec<u8>, FetchError>;
}

/// Contents of `modsync.server.toml`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Version reported to clients
    pub version: String,
    /// Sync paths served to clients
    pub sync_paths: Vec<String>,
    /// Files matching these patterns are not served
    #[serde(default)]
    pub exclusions: Vec<String>,
}

/// Serves a local mirror directory as if it were a remote server
#[derive(Debug, Clone)]
pub struct MirrorServer {
    root: PathBuf,
    config: ServerConfig,
}

impl MirrorServer {
    /// Serve `root` with an explicit configuration
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, config: ServerConfig) -> Self {
        Self {
            root: root.into(),
            config,
        }
    }

    /// Serve `root` using the `modsync.server.toml` inside it
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::ConfigParse`] if the server config is missing or
    /// malformed.
    pub fn open(root: &Path) -> Result<Self> {
        let path = root.join(SERVER_CONFIG_FILE_NAME);
        let content = fs::read_to_string(&path).map_err(|e| SyncError::ConfigParse {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        let config = toml::from_str(&content).map_err(|e| SyncError::ConfigParse {
            path,
            reason: e.to_string(),
        })?;
        Ok(Self::new(root, config))
    }

    /// Mirror directory
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Server configuration
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

#[async_trait]
impl ModSyncServer for MirrorServer {
    async fn version(&self) -> Result<String> {
        Ok(self.config.version.clone())
    }

    async fn sync_paths(&self) -> Result<Vec<String>> {
        Ok(self.config.sync_paths.clone())
    }

    async fn manifest(&self) -> Result<Manifest> {
        let root = self.root.clone();
        let config = self.config.clone();

        let build = tokio::task::spawn_blocking(move || {
            let policy = PathPolicy::new(&root)?;
            let entries = policy.validate_paths(&config.sync_paths)?;
            let exclusions = ExclusionSet::new(&config.exclusions)?;
            ManifestBuilder::new(exclusions).build(&root, &entries)
        })
        .await
        .map_err(|e| SyncError::ManifestFetch {
            step: "manifest",
            reason: e.to_string(),
        })??;

        let manifest: Manifest = build
            .manifest
            .iter()
            .filter(|(_, record)| !record.no_sync)
            .map(|(path, record)| (path, FileRecord::new(record.checksum)))
            .collect();
        debug!("Mirror serves {} files", manifest.len());
        Ok(manifest)
    }

    async fn fetch_file(
        &self,
        path: &str,
        cancel: &CancellationToken,
    ) -> std::result::Result<Vec<u8>, FetchError> {
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }
        let full =
            safe_join(&self.root, path).map_err(|e| FetchError::Transport(e.to_string()))?;

        tokio::select! {
            () = cancel.cancelled() => Err(FetchError::Cancelled),
            read = tokio::fs::read(&full) => match read {
                Ok(bytes) => Ok(bytes),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    Err(FetchError::NotFound(path.to_string()))
                }
                Err(e) => Err(FetchError::Io(e)),
            },
        }
    }
}
