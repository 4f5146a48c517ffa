//! Scheduler: admit, claim, resolve, enqueue.
//!
//! One pass (`tick`) checks the admission gates, claims at most one queued
//! job, resolves it through its provider, and hands the URIs to the download
//! daemon. Many scheduler processes may share one database; the claim is
//! the only mutual exclusion between them.

mod enqueue;
mod run;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use crate::admission::{Admission, AdmissionBlocked, AdmissionController};
use crate::aria2::DownloadDaemon;
use crate::config::MediadlConfig;
use crate::job_db::{JobDb, JobId};
use crate::provider::ProviderRegistry;

pub use run::run_scheduler_loop;

/// What one scheduler pass did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing claimable.
    Idle,
    /// An admission gate is closed; nothing was claimed.
    Blocked(AdmissionBlocked),
    Enqueued { job_id: JobId, gid: String },
    /// Provider rate limit: job back in the queue, identifier deferred.
    Deferred { job_id: JobId, retry_after: Duration },
    Failed { job_id: JobId, reason: String },
    /// The job was canceled while we were resolving or enqueueing.
    Abandoned { job_id: JobId },
}

pub struct Scheduler {
    db: JobDb,
    daemon: Arc<dyn DownloadDaemon>,
    providers: ProviderRegistry,
    admission: AdmissionController,
    staging_dir: PathBuf,
}

impl Scheduler {
    pub fn new(db: JobDb, daemon: Arc<dyn DownloadDaemon>, cfg: &MediadlConfig) -> Self {
        Self {
            db,
            daemon,
            providers: ProviderRegistry::new(),
            admission: AdmissionController::from_config(cfg),
            staging_dir: cfg.staging_dir.clone(),
        }
    }

    /// Pick up a reloaded configuration (gates and staging directory).
    pub fn apply_config(&mut self, cfg: &MediadlConfig) {
        self.admission = AdmissionController::from_config(cfg);
        self.staging_dir = cfg.staging_dir.clone();
    }

    pub fn set_daemon(&mut self, daemon: Arc<dyn DownloadDaemon>) {
        self.daemon = daemon;
    }

    pub fn set_admission(&mut self, admission: AdmissionController) {
        self.admission = admission;
    }

    pub fn providers_mut(&mut self) -> &mut ProviderRegistry {
        &mut self.providers
    }

    /// One pass. Errors are store failures; job-level failures are outcomes.
    pub async fn tick(&mut self) -> Result<TickOutcome> {
        if let Admission::Blocked(reason) = self.admission.evaluate(&self.db).await? {
            tracing::debug!("admission closed: {reason}");
            return Ok(TickOutcome::Blocked(reason));
        }
        let Some(job) = self.db.claim_next_queued_job().await? else {
            return Ok(TickOutcome::Idle);
        };
        tracing::info!(job_id = job.id, provider_id = job.provider_id, "claimed job");
        let job_id = job.id;
        match self.resolve_and_enqueue(job).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                // The job is still `starting`; hand it back so it is not stranded.
                match self.db.release_claim(job_id).await {
                    Ok(true) => tracing::warn!(job_id, "store error after claim; job requeued: {e:#}"),
                    Ok(false) => {}
                    Err(release) => tracing::error!(
                        job_id,
                        "store error after claim and release failed ({release:#}); left to stale claim recovery"
                    ),
                }
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests;
