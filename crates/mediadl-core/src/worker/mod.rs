//! Worker: poll every in-flight transfer and drive its job forward.
//!
//! Each pass lists jobs in `downloading`/`paused` that hold a gid, asks the
//! daemon for each one's status, and applies the result: progress, pause,
//! completion with library placement, daemon-side error or removal, or a
//! single restart when the daemon has lost the transfer.

mod complete;
mod poll;
pub mod progress;
mod recover;
mod run;

use std::path::PathBuf;
use std::sync::Arc;

use crate::aria2::{DaemonError, DownloadDaemon};
use crate::config::MediadlConfig;
use crate::job_db::JobDb;
use crate::library::{LibraryNotifier, LibraryPlacer};

pub use complete::CompletionError;
pub use run::run_worker_loop;

/// Reason recorded when the transfer disappears from the daemon's side.
pub const REMOVED_REASON: &str = "download was removed from aria2";

/// What one poll did to one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Progress,
    Paused,
    Completed { final_path: String },
    Failed { reason: String },
    Canceled { reason: String },
    /// Lost reference; re-enqueued under a new gid.
    Recovered { new_gid: String },
    /// Row moved underneath us or the daemon state is unknown.
    Skipped,
    /// Daemon call failed for a reason other than a lost reference; try next pass.
    Retry,
}

pub struct Worker {
    db: JobDb,
    daemon: Arc<dyn DownloadDaemon>,
    placer: Arc<dyn LibraryPlacer>,
    notifier: Arc<dyn LibraryNotifier>,
    staging_dir: PathBuf,
}

impl Worker {
    pub fn new(
        db: JobDb,
        daemon: Arc<dyn DownloadDaemon>,
        placer: Arc<dyn LibraryPlacer>,
        notifier: Arc<dyn LibraryNotifier>,
        cfg: &MediadlConfig,
    ) -> Self {
        Self {
            db,
            daemon,
            placer,
            notifier,
            staging_dir: cfg.staging_dir.clone(),
        }
    }

    pub fn set_daemon(&mut self, daemon: Arc<dyn DownloadDaemon>) {
        self.daemon = daemon;
    }

    pub fn set_placer(&mut self, placer: Arc<dyn LibraryPlacer>) {
        self.placer = placer;
    }

    pub fn set_notifier(&mut self, notifier: Arc<dyn LibraryNotifier>) {
        self.notifier = notifier;
    }

    pub fn set_staging_dir(&mut self, dir: PathBuf) {
        self.staging_dir = dir;
    }

    /// Run a blocking daemon call off the async threads.
    async fn call_daemon<T, F>(&self, method: &'static str, f: F) -> Result<T, DaemonError>
    where
        T: Send + 'static,
        F: FnOnce(&dyn DownloadDaemon) -> Result<T, DaemonError> + Send + 'static,
    {
        let daemon = Arc::clone(&self.daemon);
        tokio::task::spawn_blocking(move || f(daemon.as_ref()))
            .await
            .unwrap_or_else(|e| {
                Err(DaemonError::Malformed {
                    method: method.to_string(),
                    detail: format!("blocking task failed: {e}"),
                })
            })
    }
}
