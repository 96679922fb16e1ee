use std::path::Path;

use anyhow::Context;
use modsync_core::SyncStateStore;
use modsync_core::sync::{Recovery, SyncReporter};

use super::common::open_engine;

pub struct Status;

impl Status {
    pub async fn execute(
        root: &Path,
        config_path: Option<&Path>,
        server: Option<&Path>,
    ) -> anyhow::Result<()> {
        if let Some(pending) = Recovery::pending(root).context("Failed to read sync state")? {
            println!(
                "Unfinished update: staging '{}', {} pending deletions",
                pending.staging_dir,
                pending.pending_deletes.len()
            );
            println!("Run `modsync recover` to finish it or `modsync recover --discard` to drop it.");
            return Ok(());
        }

        let state = SyncStateStore::new(root)
            .load()
            .context("Failed to read sync state")?;
        println!("Tracked files: {}", state.previous_manifest.len());

        let Some(server) = server else {
            return Ok(());
        };

        let mut engine = open_engine(root, config_path, server)?;
        let plan = engine.analyze().await.context("Failed to compare with server")?;
        print!("{}", SyncReporter::describe_plan(plan));

        Ok(())
    }
}
