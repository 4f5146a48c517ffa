//! Lost-reference recovery.
//!
//! When the daemon no longer knows a gid (usually after aria2 restarted
//! without its session) the job gets one restart from its recorded source
//! URL into the same staging file, so aria2 can continue a partial file. If
//! that is impossible the partial files are deleted and the job is canceled.

use std::path::{Path, PathBuf};

use anyhow::Result;
use serde_json::json;

use crate::aria2::EnqueueOptions;
use crate::job_db::{AuditAction, Job};
use crate::naming::derive_output_filename;

use super::{PollOutcome, Worker};

impl Worker {
    pub(super) async fn recover(&self, job: &Job, old_gid: &str) -> Result<PollOutcome> {
        let Some(source_url) = job
            .source_url
            .clone()
            .filter(|u| !u.trim().is_empty())
        else {
            return self
                .cancel_with_cleanup(job, old_gid, "download lost by aria2 and no source URL to restart from")
                .await;
        };

        let (dir, filename) = restart_target(job, &self.staging_dir, &source_url);
        if let Err(e) = tokio::fs::create_dir_all(&dir).await {
            let reason = format!(
                "download lost by aria2; cannot prepare {}: {e}",
                dir.display()
            );
            return self.cancel_with_cleanup(job, old_gid, &reason).await;
        }
        let tmp_path = dir.join(&filename).to_string_lossy().into_owned();

        let mut options = EnqueueOptions::new();
        options.insert("dir".into(), dir.to_string_lossy().into_owned());
        options.insert("out".into(), filename);
        let enqueued = self
            .call_daemon("aria2.addUri", move |d| d.enqueue(&[source_url], &options))
            .await;
        let new_gid = match enqueued {
            Ok(gid) => gid,
            Err(e) => {
                let reason = format!("download lost by aria2; restart failed: {e}");
                return self.cancel_with_cleanup(job, old_gid, &reason).await;
            }
        };

        let swapped = match self
            .db
            .replace_gid(job.id, old_gid, &new_gid, &tmp_path)
            .await
        {
            Ok(swapped) => swapped,
            Err(e) => {
                // The row still names the old gid; the next poll restarts again.
                self.remove_restarted(&new_gid).await;
                return Err(e);
            }
        };
        if !swapped {
            tracing::warn!(job_id = job.id, gid = %new_gid, "job changed during restart; removing new transfer");
            self.remove_restarted(&new_gid).await;
            return Ok(PollOutcome::Skipped);
        }

        self.db
            .emit(
                AuditAction::Requeued,
                job,
                json!({ "old_gid": old_gid, "new_gid": new_gid }),
            )
            .await;
        Ok(PollOutcome::Recovered { new_gid })
    }

    async fn remove_restarted(&self, new_gid: &str) {
        let gid = new_gid.to_string();
        if let Err(e) = self
            .call_daemon("aria2.forceRemove", move |d| d.remove(&gid, true))
            .await
        {
            tracing::warn!(gid = %new_gid, "removing restarted transfer failed: {e}");
        }
    }

    async fn cancel_with_cleanup(
        &self,
        job: &Job,
        old_gid: &str,
        reason: &str,
    ) -> Result<PollOutcome> {
        if let Some(staged) = job.tmp_path_buf() {
            remove_partial_files(&staged).await;
        }
        if self.db.mark_canceled(job.id, reason).await? {
            self.db
                .emit(
                    AuditAction::Canceled,
                    job,
                    json!({ "reason": reason, "gid": old_gid }),
                )
                .await;
        }
        Ok(PollOutcome::Canceled {
            reason: reason.to_string(),
        })
    }
}

/// Same directory and file name as the lost transfer when known, else a
/// fresh name in the staging directory.
fn restart_target(job: &Job, staging_dir: &Path, source_url: &str) -> (PathBuf, String) {
    if let Some(tmp) = job.tmp_path_buf() {
        if let (Some(dir), Some(name)) = (tmp.parent(), tmp.file_name().and_then(|n| n.to_str())) {
            if !dir.as_os_str().is_empty() && !name.is_empty() {
                return (dir.to_path_buf(), name.to_string());
            }
        }
    }
    (
        staging_dir.to_path_buf(),
        derive_output_filename(&job.title, Some(source_url)),
    )
}

/// Delete `<file>` and aria2's `<file>.aria2` control file. Missing files
/// are fine.
async fn remove_partial_files(staged: &Path) {
    let mut control = staged.as_os_str().to_owned();
    control.push(".aria2");
    for path in [staged.to_path_buf(), PathBuf::from(control)] {
        match tokio::fs::remove_file(&path).await {
            Ok(()) => tracing::debug!("removed partial file {}", path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("could not remove partial file {}: {e}", path.display()),
        }
    }
}
