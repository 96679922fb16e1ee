use std::io::Write;
use std::path::Path;

use anyhow::Context;
use modsync_core::SyncError;
use modsync_core::sync::{DownloadProgress, ProgressCallback, SyncReporter};
use tokio_util::sync::CancellationToken;

use super::common::open_engine;
use crate::interactive;

pub struct Synchronize;

impl Synchronize {
    pub async fn execute(
        root: &Path,
        config_path: Option<&Path>,
        server: &Path,
        yes: bool,
    ) -> anyhow::Result<()> {
        let mut engine = open_engine(root, config_path, server)?;

        let plan = engine.analyze().await.context("Failed to compare with server")?;
        print!("{}", SyncReporter::describe_plan(plan));

        if plan.diff.is_empty() {
            return Ok(());
        }

        if !yes && !interactive::confirm_update(plan)? {
            engine.skip()?;
            println!("Update skipped.");
            return Ok(());
        }

        let cancel = CancellationToken::new();
        let handler_token = cancel.clone();
        ctrlc::set_handler(move || handler_token.cancel())
            .context("Failed to install Ctrl-C handler")?;

        let progress: ProgressCallback = Box::new(|p: DownloadProgress| {
            eprint!("\rDownloading {}/{}", p.completed, p.total);
            let _ = std::io::stderr().flush();
        });

        let download = engine.download(&cancel, Some(progress)).await;
        eprintln!();
        match download {
            Ok(_) => {}
            Err(SyncError::Cancelled { completed, total }) => {
                println!("Download cancelled after {completed} of {total} files; nothing was changed.");
                return Ok(());
            }
            Err(e) => {
                if let Some(staging) = engine.staging_dir() {
                    eprintln!("Partial download kept in {}", staging.display());
                }
                return Err(e).context("Download failed");
            }
        }

        let result = engine.apply().context("Failed to apply update")?;
        println!("{}", SyncReporter::generate_summary(&result));

        Ok(())
    }
}
