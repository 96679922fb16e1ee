//! Shared setup for commands that talk to a server

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use modsync_core::SyncEngine;
use modsync_core::config::ConfigLoader;
use modsync_core::sync::MirrorServer;

/// Load config, open the server mirror and construct the engine
pub fn open_engine(
    root: &Path,
    config_path: Option<&Path>,
    server_dir: &Path,
) -> anyhow::Result<SyncEngine> {
    let config = ConfigLoader::load(root, config_path).context("Failed to load configuration")?;
    let server = MirrorServer::open(server_dir)
        .with_context(|| format!("Failed to open server at {}", server_dir.display()))?;

    SyncEngine::new(root, config, Arc::new(server)).context("Failed to initialize sync engine")
}
