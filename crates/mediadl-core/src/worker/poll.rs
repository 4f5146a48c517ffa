use anyhow::Result;
use serde_json::json;

use crate::aria2::{DaemonState, TransferStatus, POLL_KEYS};
use crate::job_db::{AuditAction, Job, JobId, JobStatus};

use super::progress::progress_update;
use super::{PollOutcome, Worker, REMOVED_REASON};

impl Worker {
    /// One pass over every in-flight job. A failure on one job is logged and
    /// does not stop the others; only listing the jobs can fail the pass.
    pub async fn poll_once(&self) -> Result<Vec<(JobId, PollOutcome)>> {
        let jobs = self.db.list_in_flight().await?;
        let mut outcomes = Vec::with_capacity(jobs.len());
        for job in jobs {
            match self.poll_job(&job).await {
                Ok(outcome) => outcomes.push((job.id, outcome)),
                Err(e) => tracing::error!(job_id = job.id, "poll failed: {e:#}"),
            }
        }
        Ok(outcomes)
    }

    pub async fn poll_job(&self, job: &Job) -> Result<PollOutcome> {
        let Some(gid) = job.aria2_gid.clone() else {
            return Ok(PollOutcome::Skipped);
        };
        let queried = {
            let gid = gid.clone();
            self.call_daemon("aria2.tellStatus", move |d| {
                d.query_status(&gid, Some(POLL_KEYS))
            })
            .await
        };
        let status = match queried {
            Ok(status) => status,
            Err(e) if e.is_lost_reference() => {
                tracing::warn!(job_id = job.id, gid = %gid, "daemon lost the transfer: {e}");
                return self.recover(job, &gid).await;
            }
            Err(e) => {
                tracing::warn!(job_id = job.id, gid = %gid, timeout = e.is_timeout(), "status query failed: {e}");
                return Ok(PollOutcome::Retry);
            }
        };

        match status.state {
            DaemonState::Active | DaemonState::Waiting => {
                self.record_progress(job, &gid, &status, JobStatus::Downloading)
                    .await
            }
            DaemonState::Paused => {
                self.record_progress(job, &gid, &status, JobStatus::Paused)
                    .await
            }
            DaemonState::Complete => self.complete(job, &status).await,
            DaemonState::Error => {
                let reason = daemon_error_reason(&status);
                if self.db.mark_failed(job.id, &reason).await? {
                    self.db
                        .emit(AuditAction::Failed, job, json!({ "reason": reason, "gid": gid }))
                        .await;
                }
                Ok(PollOutcome::Failed { reason })
            }
            DaemonState::Removed => {
                if self.db.mark_canceled(job.id, REMOVED_REASON).await? {
                    self.db
                        .emit(
                            AuditAction::Canceled,
                            job,
                            json!({ "reason": REMOVED_REASON, "gid": gid }),
                        )
                        .await;
                }
                Ok(PollOutcome::Canceled {
                    reason: REMOVED_REASON.to_string(),
                })
            }
            DaemonState::Unknown => {
                tracing::debug!(job_id = job.id, gid = %gid, "unrecognised daemon state; skipping");
                Ok(PollOutcome::Skipped)
            }
        }
    }

    async fn record_progress(
        &self,
        job: &Job,
        gid: &str,
        status: &TransferStatus,
        to: JobStatus,
    ) -> Result<PollOutcome> {
        let update = progress_update(status, to);
        if !self.db.update_progress(job.id, gid, &update).await? {
            return Ok(PollOutcome::Skipped);
        }
        if job.status != to {
            tracing::info!(job_id = job.id, gid = %gid, from = %job.status, to = %to, "transfer state changed");
        }
        Ok(match to {
            JobStatus::Paused => PollOutcome::Paused,
            _ => PollOutcome::Progress,
        })
    }
}

fn daemon_error_reason(status: &TransferStatus) -> String {
    let detail = status
        .error_message
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty());
    match (detail, status.error_code.as_deref()) {
        (Some(msg), Some(code)) => format!("aria2 reported an error (code {code}): {msg}"),
        (Some(msg), None) => format!("aria2 reported an error: {msg}"),
        (None, Some(code)) => format!("aria2 reported an error (code {code})"),
        (None, None) => "aria2 reported an error".to_string(),
    }
}
