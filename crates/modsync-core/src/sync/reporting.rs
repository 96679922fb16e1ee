//! Sync plan and result reporting

use std::fmt::Write;

use super::SyncResult;
use super::engine::SyncPlan;

/// Formats plans and results for display
pub struct SyncReporter;

impl SyncReporter {
    /// Describe what a sync would do, listing every affected path
    #[must_use]
    pub fn describe_plan(plan: &SyncPlan) -> String {
        let mut output = String::new();

        if plan.version_mismatch {
            let _ = writeln!(
                output,
                "Warning: server version {} differs from client version {}",
                plan.server_version,
                super::CLIENT_VERSION
            );
        }

        let diff = &plan.diff;
        if diff.is_empty() {
            output.push_str("Everything is up to date.\n");
            return output;
        }

        for (label, paths) in [
            ("Added", &diff.added),
            ("Updated", &diff.updated),
            ("Removed", &diff.removed),
        ] {
            if paths.is_empty() {
                continue;
            }
            let _ = writeln!(output, "{label} ({}):", paths.len());
            for path in paths {
                let _ = writeln!(output, "  {path}");
            }
        }

        if !plan.conflicts.is_empty() {
            let _ = writeln!(
                output,
                "Case conflicts resolved locally ({}):",
                plan.conflicts.len()
            );
            for conflict in &plan.conflicts {
                let _ = writeln!(output, "  {} replaced {}", conflict.kept, conflict.replaced);
            }
        }

        if !plan.delete_removed_files && plan.ignored_removals > 0 {
            let _ = writeln!(
                output,
                "{} files were removed from the server but are kept (delete_removed_files = false)",
                plan.ignored_removals
            );
        }

        output
    }

    /// Generate a summary report
    #[must_use]
    pub fn generate_summary(result: &SyncResult) -> String {
        let mut output = String::new();

        output.push_str("\n=== Sync Summary ===\n");
        let _ = writeln!(output, "Added:    {}", result.added);
        let _ = writeln!(output, "Updated:  {}", result.updated);
        let _ = writeln!(output, "Removed:  {}", result.removed);
        let _ = writeln!(output, "Bytes:    {}", result.bytes);
        if result.conflicts > 0 {
            let _ = writeln!(output, "Case conflicts: {}", result.conflicts);
        }

        let _ = writeln!(output, "\nTotal operations: {}", result.total_operations());

        if result.total_operations() == 0 {
            output.push_str("Status: ✓ Up to date\n");
        } else {
            output.push_str("Status: ✓ Success\n");
        }

        output
    }
}
