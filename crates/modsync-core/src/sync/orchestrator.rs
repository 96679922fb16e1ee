//! Download orchestration
//!
//! Fetches a batch of files into a staging directory with a bounded pool of
//! tokio tasks. The first failure cancels the batch: nothing new is
//! dispatched, in-flight fetches are told to stop and are drained, and the
//! failure is reported. Files already written stay in staging.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::executor::safe_join;
use super::server::{FetchError, ModSyncServer};
use crate::config::DEFAULT_MAX_CONCURRENT_DOWNLOADS;
use crate::error::{Result, SyncError};

/// Progress of a download batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadProgress {
    /// Files written to staging so far
    pub completed: usize,
    /// Files in the batch
    pub total: usize,
}

/// Progress callback invoked after each completed file
pub type ProgressCallback = Box<dyn FnMut(DownloadProgress) + Send>;

/// Outcome of a successful batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadReport {
    /// Relative paths written to staging, in completion order
    pub files: Vec<String>,
    /// Total bytes written
    pub bytes: u64,
}

/// Bounded-concurrency fetcher
pub struct DownloadOrchestrator {
    concurrency: usize,
    progress: Option<ProgressCallback>,
}

impl Default for DownloadOrchestrator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONCURRENT_DOWNLOADS)
    }
}

impl DownloadOrchestrator {
    /// Create an orchestrator running at most `concurrency` fetches at once
    #[must_use]
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
            progress: None,
        }
    }

    /// Report progress through `callback`
    #[must_use]
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Fetch `files` from `server` into `staging_dir`.
    ///
    /// Cancelling `cancel` stops dispatch and asks in-flight fetches to stop.
    ///
    /// # Errors
    ///
    /// - [`SyncError::UnsafePath`] if a path would escape `staging_dir`
    ///   (checked before anything is fetched)
    /// - [`SyncError::DownloadFailed`] for the first file that failed
    /// - [`SyncError::Cancelled`] if `cancel` fired before the batch finished
    pub async fn run(
        &mut self,
        files: &[String],
        staging_dir: &Path,
        server: Arc<dyn ModSyncServer>,
        cancel: &CancellationToken,
    ) -> Result<DownloadReport> {
        let jobs = files
            .iter()
            .map(|path| safe_join(staging_dir, path).map(|target| (path.clone(), target)))
            .collect::<Result<Vec<_>>>()?;

        let total = jobs.len();
        let batch = cancel.child_token();
        let mut queue = jobs.into_iter();
        let mut in_flight = JoinSet::new();
        let mut report = DownloadReport::default();
        let mut failure = None;

        info!(
            "Downloading {} files with {} workers",
            total, self.concurrency
        );

        for (path, target) in queue.by_ref().take(self.concurrency) {
            in_flight.spawn(fetch_one(Arc::clone(&server), path, target, batch.clone()));
        }

        while let Some(joined) = in_flight.join_next().await {
            let (path, outcome) = match joined {
                Ok(result) => result,
                Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
                Err(e) => {
                    batch.cancel();
                    if failure.is_none() {
                        failure = Some(SyncError::DownloadFailed {
                            path: "<worker>".to_string(),
                            reason: e.to_string(),
                        });
                    }
                    continue;
                }
            };

            match outcome {
                Ok(bytes) => {
                    debug!("Downloaded {path} ({bytes} bytes)");
                    report.files.push(path);
                    report.bytes += bytes;
                    if let Some(progress) = self.progress.as_mut() {
                        progress(DownloadProgress {
                            completed: report.files.len(),
                            total,
                        });
                    }
                }
                Err(FetchError::Cancelled) => debug!("Fetch of {path} cancelled"),
                Err(e) => {
                    if failure.is_none() {
                        warn!("Download of {path} failed, cancelling batch: {e}");
                        failure = Some(SyncError::DownloadFailed {
                            path,
                            reason: e.to_string(),
                        });
                    }
                    batch.cancel();
                }
            }

            if !batch.is_cancelled()
                && let Some((path, target)) = queue.next()
            {
                in_flight.spawn(fetch_one(Arc::clone(&server), path, target, batch.clone()));
            }
        }

        if let Some(err) = failure {
            return Err(err);
        }

        let completed = report.files.len();
        if completed < total {
            info!("Download cancelled after {completed} of {total} files");
            return Err(SyncError::Cancelled { completed, total });
        }

        info!("Downloaded {} files ({} bytes)", completed, report.bytes);
        Ok(report)
    }
}

async fn fetch_one(
    server: Arc<dyn ModSyncServer>,
    path: String,
    target: PathBuf,
    cancel: CancellationToken,
) -> (String, std::result::Result<u64, FetchError>) {
    let outcome = async {
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }
        let bytes = server.fetch_file(&path, &cancel).await?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, &bytes).await?;
        Ok(bytes.len() as u64)
    }
    .await;
    (path, outcome)
}
