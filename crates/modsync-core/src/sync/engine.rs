//! Sync engine state machine
//!
//! One [`SyncEngine`] drives one synchronization attempt for one
//! installation root:
//!
//! ```text
//! Idle -> DiffReady -> Downloading -> Staged -> Applied
//!            |              |           |
//!            v              v           v
//!          Idle         Cancelled   Cancelled
//!                       / Failed
//! ```
//!
//! The host decides what happens between phases: it shows the plan after
//! [`SyncEngine::analyze`], calls [`SyncEngine::skip`] or
//! [`SyncEngine::download`], and commits with [`SyncEngine::apply`].

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::executor::{ApplyReport, StagingApplier};
use super::orchestrator::{DownloadOrchestrator, DownloadReport, ProgressCallback};
use super::server::ModSyncServer;
use super::{CLIENT_VERSION, SyncResult};
use crate::comparison::{DiffEngine, ManifestDiff};
use crate::config::{Config, ExclusionSet, PathPolicy, SyncPathEntry};
use crate::error::{Result, SyncError};
use crate::manifest::{DuplicatePath, Manifest, ManifestBuilder};
use crate::state::{SyncState, SyncStateStore};

/// Engine lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// No plan computed
    Idle,
    /// A plan is ready for the host to confirm or skip
    DiffReady,
    /// Files are being fetched into staging
    Downloading,
    /// Every file is staged and the update can be applied
    Staged,
    /// The update was applied and committed
    Applied,
    /// The attempt was cancelled and staging removed
    Cancelled,
    /// The attempt failed; staging is left for inspection
    Failed,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::DiffReady => "diff-ready",
            Self::Downloading => "downloading",
            Self::Staged => "staged",
            Self::Applied => "applied",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Everything the host needs to decide whether to update
#[derive(Debug, Clone)]
pub struct SyncPlan {
    /// Files to add, update and remove
    pub diff: ManifestDiff,
    /// Remote manifest restricted to enabled sync paths; committed on apply
    pub remote: Manifest,
    /// Effective sync paths after client toggles and validation
    pub sync_paths: Vec<SyncPathEntry>,
    /// Version the server reported
    pub server_version: String,
    /// Whether the server version differs from this client
    pub version_mismatch: bool,
    /// Local case-variant collisions found while hashing
    pub conflicts: Vec<DuplicatePath>,
    /// Whether removals will be carried out
    pub delete_removed_files: bool,
    /// Removals dropped because `delete_removed_files` is off
    pub ignored_removals: usize,
}

/// Drives one installation through analyze, download and apply
pub struct SyncEngine {
    root: PathBuf,
    config: Config,
    server: Arc<dyn ModSyncServer>,
    store: SyncStateStore,
    persisted: SyncState,
    state: EngineState,
    plan: Option<SyncPlan>,
    staging: Option<PathBuf>,
    download: Option<DownloadReport>,
}

impl SyncEngine {
    /// Load persisted state for `root` and refuse to start if the previous
    /// run did not complete.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::UnfinishedRunDetected`] when recovery is needed,
    /// [`SyncError::StateCorrupt`] for an unreadable state file and
    /// [`SyncError::Io`] if `root` does not exist.
    pub fn new(root: &Path, config: Config, server: Arc<dyn ModSyncServer>) -> Result<Self> {
        let root = dunce::canonicalize(root).map_err(|e| SyncError::io(root, e))?;
        let store = SyncStateStore::new(&root);
        let persisted = store.load()?;
        SyncStateStore::startup_check(&persisted)?;

        Ok(Self {
            root,
            config,
            server,
            store,
            persisted,
            state: EngineState::Idle,
            plan: None,
            staging: None,
            download: None,
        })
    }

    /// Current lifecycle state
    #[must_use]
    pub const fn state(&self) -> EngineState {
        self.state
    }

    /// Canonical installation root
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Client configuration in use
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Plan from the last [`SyncEngine::analyze`]
    #[must_use]
    pub const fn plan(&self) -> Option<&SyncPlan> {
        self.plan.as_ref()
    }

    /// Staging directory of the current attempt
    #[must_use]
    pub fn staging_dir(&self) -> Option<&Path> {
        self.staging.as_deref()
    }

    /// Remote manifest recorded at the last successful sync
    #[must_use]
    pub const fn previous_manifest(&self) -> &Manifest {
        &self.persisted.previous_manifest
    }

    /// Build the local manifest, fetch the remote one and diff them.
    ///
    /// # Errors
    ///
    /// Fails on server errors, invalid server sync paths, invalid exclusion
    /// patterns or unreadable local files. The engine moves to
    /// [`EngineState::Failed`]. Returns [`SyncError::UnfinishedRunDetected`]
    /// after an apply that failed part way.
    #[instrument(skip_all, fields(root = %self.root.display()))]
    pub async fn analyze(&mut self) -> Result<&SyncPlan> {
        self.ensure(
            "analyze",
            &[
                EngineState::Idle,
                EngineState::Applied,
                EngineState::Cancelled,
                EngineState::Failed,
            ],
        )?;
        SyncStateStore::startup_check(&self.persisted)?;

        match self.build_plan().await {
            Ok(plan) => {
                self.state = EngineState::DiffReady;
                let plan = self.plan.insert(plan);
                Ok(&*plan)
            }
            Err(e) => {
                self.state = EngineState::Failed;
                self.plan = None;
                Err(e)
            }
        }
    }

    async fn build_plan(&self) -> Result<SyncPlan> {
        let server_version = self.server.version().await?;
        let version_mismatch = server_version != CLIENT_VERSION;
        if version_mismatch {
            warn!(
                "Server version {server_version} does not match client version {CLIENT_VERSION}"
            );
        }

        let server_paths = self.server.sync_paths().await?;
        let policy = PathPolicy::new(&self.root)?;
        let sync_paths = policy.validate(&self.config.toggle_server_paths(&server_paths))?;
        let exclusions = ExclusionSet::new(&self.config.exclusion_patterns())?;

        let root = self.root.clone();
        let entries = sync_paths.clone();
        let local = match tokio::task::spawn_blocking(move || {
            ManifestBuilder::new(exclusions).build(&root, &entries)
        })
        .await
        {
            Ok(build) => build?,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => return Err(SyncError::io(&self.root, std::io::Error::other(e))),
        };

        let enabled: Vec<&str> = sync_paths
            .iter()
            .filter(|entry| entry.enabled)
            .map(|entry| entry.path.as_str())
            .collect();
        let remote = self.server.manifest().await?.restrict_to(&enabled);

        let mut diff =
            DiffEngine::compute(&local.manifest, &remote, &self.persisted.previous_manifest);
        let ignored_removals = if self.config.delete_removed_files {
            0
        } else {
            std::mem::take(&mut diff.removed).len()
        };

        info!(
            added = diff.added.len(),
            updated = diff.updated.len(),
            removed = diff.removed.len(),
            "Computed sync plan"
        );

        Ok(SyncPlan {
            diff,
            remote,
            sync_paths,
            server_version,
            version_mismatch,
            conflicts: local.conflicts,
            delete_removed_files: self.config.delete_removed_files,
            ignored_removals,
        })
    }

    /// Decline the plan; nothing is written
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidTransition`] unless a plan is ready.
    pub fn skip(&mut self) -> Result<()> {
        self.ensure("skip", &[EngineState::DiffReady])?;
        info!("Update skipped");
        self.plan = None;
        self.state = EngineState::Idle;
        Ok(())
    }

    /// Fetch every added and updated file into a fresh staging directory.
    ///
    /// On cancellation the staging directory is deleted. On failure it is
    /// kept and the engine moves to [`EngineState::Failed`]; the next
    /// download removes it before creating a new one.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Cancelled`] or [`SyncError::DownloadFailed`]
    /// from the orchestrator, or [`SyncError::InvalidTransition`] unless a
    /// plan is ready.
    #[instrument(skip_all, fields(root = %self.root.display()))]
    pub async fn download(
        &mut self,
        cancel: &CancellationToken,
        progress: Option<ProgressCallback>,
    ) -> Result<DownloadReport> {
        self.ensure("download", &[EngineState::DiffReady])?;
        let files = self
            .plan
            .as_ref()
            .map(|plan| plan.diff.downloads())
            .unwrap_or_default();

        if let Some(stale) = self.staging.take() {
            debug!("Removing staging of the failed attempt {}", stale.display());
            if let Err(e) = StagingApplier::remove_staging_dir(&stale) {
                warn!("Could not remove staging directory: {e}");
            }
        }

        let staging = match StagingApplier::create_staging_dir(&self.root) {
            Ok(staging) => staging,
            Err(e) => {
                self.state = EngineState::Failed;
                return Err(e);
            }
        };
        self.staging = Some(staging.clone());
        self.state = EngineState::Downloading;

        let mut orchestrator = DownloadOrchestrator::new(self.config.max_concurrent_downloads);
        if let Some(progress) = progress {
            orchestrator = orchestrator.with_progress(progress);
        }

        match orchestrator
            .run(&files, &staging, Arc::clone(&self.server), cancel)
            .await
        {
            Ok(report) => {
                self.state = EngineState::Staged;
                self.download = Some(report.clone());
                Ok(report)
            }
            Err(e @ SyncError::Cancelled { .. }) => {
                self.discard_attempt();
                self.state = EngineState::Cancelled;
                Err(e)
            }
            Err(e) => {
                self.state = EngineState::Failed;
                Err(e)
            }
        }
    }

    /// Move staged files into place, delete removals and commit state.
    ///
    /// The pending update is persisted before any file is touched, so a
    /// crash part way through is detected on the next start. If a move or
    /// deletion fails after that, the staging directory stays in place and
    /// only [`Recovery`](super::Recovery) can finish or discard the update.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidTransition`] unless every file is staged,
    /// or the first persist or filesystem error. The state file then still
    /// records the pending update.
    #[instrument(skip_all, fields(root = %self.root.display()))]
    pub fn apply(&mut self) -> Result<SyncResult> {
        self.ensure("apply", &[EngineState::Staged])?;

        match self.mark_pending() {
            Ok(pending) => self.persisted = pending,
            Err(e) => {
                self.state = EngineState::Failed;
                return Err(e);
            }
        }

        match self.apply_staged() {
            Ok((committed, result)) => {
                self.persisted = committed;
                self.plan = None;
                self.staging = None;
                self.download = None;
                self.state = EngineState::Applied;
                Ok(result)
            }
            Err(e) => {
                self.state = EngineState::Failed;
                Err(e)
            }
        }
    }

    fn staged_plan(&self) -> Result<(&SyncPlan, &Path)> {
        match (self.plan.as_ref(), self.staging.as_deref()) {
            (Some(plan), Some(staging)) => Ok((plan, staging)),
            _ => Err(SyncError::InvalidTransition {
                operation: "apply",
                state: self.state.to_string(),
            }),
        }
    }

    fn mark_pending(&self) -> Result<SyncState> {
        let (plan, staging) = self.staged_plan()?;
        self.store
            .mark_pending(&self.persisted, staging, &plan.diff.removed, &plan.remote)
    }

    fn apply_staged(&self) -> Result<(SyncState, SyncResult)> {
        let (plan, staging) = self.staged_plan()?;
        let ApplyReport { deleted, .. } =
            StagingApplier::apply(&self.root, staging, &plan.diff.removed)?;
        let committed = self.store.commit(&plan.remote)?;

        let result = SyncResult {
            added: plan.diff.added.len(),
            updated: plan.diff.updated.len(),
            removed: deleted,
            bytes: self.download.as_ref().map_or(0, |report| report.bytes),
            conflicts: plan.conflicts.len(),
        };
        Ok((committed, result))
    }

    /// Abandon the current attempt and delete its staging directory
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidTransition`] when there is nothing to
    /// cancel, and [`SyncError::UnfinishedRunDetected`] once an apply has
    /// recorded its pending update; the staging directory is kept for
    /// recovery.
    pub fn cancel(&mut self) -> Result<()> {
        self.ensure(
            "cancel",
            &[EngineState::DiffReady, EngineState::Staged, EngineState::Failed],
        )?;
        SyncStateStore::startup_check(&self.persisted)?;
        self.discard_attempt();
        self.state = EngineState::Cancelled;
        info!("Sync cancelled");
        Ok(())
    }

    fn discard_attempt(&mut self) {
        if let Some(staging) = self.staging.take()
            && let Err(e) = StagingApplier::remove_staging_dir(&staging)
        {
            warn!("Could not remove staging directory: {e}");
        }
        self.plan = None;
        self.download = None;
    }

    fn ensure(&self, operation: &'static str, allowed: &[EngineState]) -> Result<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(SyncError::InvalidTransition {
                operation,
                state: self.state.to_string(),
            })
        }
    }
}
