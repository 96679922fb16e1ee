use std::path::Path;

use anyhow::Context;
use modsync_core::sync::Recovery;

pub struct Recover;

impl Recover {
    pub fn execute(root: &Path, discard: bool) -> anyhow::Result<()> {
        let Some(pending) = Recovery::pending(root).context("Failed to read sync state")? else {
            println!("Nothing to recover.");
            return Ok(());
        };

        if discard {
            Recovery::discard(root).context("Failed to discard unfinished update")?;
            println!(
                "Discarded unfinished update ({} pending deletions dropped).",
                pending.pending_deletes.len()
            );
        } else {
            let report = Recovery::resume(root).context("Failed to finish unfinished update")?;
            println!(
                "Finished unfinished update: {} files moved, {} deleted.",
                report.moved, report.deleted
            );
        }

        Ok(())
    }
}
