//! Interactive confirmation

use anyhow::{Context, Result};
use dialoguer::Confirm;
use modsync_core::sync::SyncPlan;

/// Ask whether to download and apply `plan`.
///
/// Defaults to no, so an accidental Enter never changes files.
///
/// # Errors
///
/// Returns an error if the terminal cannot be used for prompting.
pub fn confirm_update(plan: &SyncPlan) -> Result<bool> {
    let downloads = plan.diff.added.len() + plan.diff.updated.len();
    let prompt = format!(
        "Download {downloads} files and delete {} files?",
        plan.diff.removed.len()
    );

    Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .context("Failed to show confirmation prompt")
}
