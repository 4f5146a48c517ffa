//! Resolve a claimed job through its provider and enqueue it to the daemon.

use std::sync::Arc;

use anyhow::Result;
use serde_json::json;

use crate::aria2::{DaemonError, EnqueueOptions};
use crate::job_db::{AuditAction, Job};
use crate::naming::derive_output_filename;
use crate::provider::ProviderError;

use super::{Scheduler, TickOutcome};

impl Scheduler {
    /// `starting -> downloading`, or `starting -> failed`, or back to `queued`
    /// on a rate-limit deferral.
    pub(super) async fn resolve_and_enqueue(&mut self, job: Job) -> Result<TickOutcome> {
        let Some(record) = self.db.get_provider(job.provider_id).await? else {
            let reason = format!("provider {} not found", job.provider_id);
            return self.fail(&job, &reason).await;
        };
        let resolver = match self.providers.resolver_for(&record) {
            Ok(r) => r,
            Err(e) => return self.fail(&job, &e.to_string()).await,
        };

        let resolved = tokio::task::spawn_blocking({
            let resolver = Arc::clone(&resolver);
            let external_id = job.external_id.clone();
            move || resolver.resolve_download_url(&external_id)
        })
        .await
        .unwrap_or_else(|e| Err(ProviderError::failed(&record.key, format!("resolver task: {e}"))));

        let uris: Vec<String> = match resolved {
            Ok(uris) => uris
                .into_iter()
                .map(|u| u.trim().to_string())
                .filter(|u| !u.is_empty())
                .collect(),
            Err(ProviderError::RateLimited { retry_after, .. }) => {
                self.db
                    .defer_identifier(record.id, &job.external_id, retry_after)
                    .await?;
                self.db.release_claim(job.id).await?;
                tracing::info!(
                    job_id = job.id,
                    provider = %record.key,
                    retry_after_secs = retry_after.as_secs(),
                    "provider rate limited; job requeued"
                );
                return Ok(TickOutcome::Deferred {
                    job_id: job.id,
                    retry_after,
                });
            }
            Err(e @ ProviderError::NotFound { .. }) => {
                let reason = e.to_string();
                self.db.pause_provider(record.id, &reason).await?;
                tracing::warn!(
                    provider_id = record.id,
                    provider = %record.key,
                    "provider paused until cleared by an operator: {reason}"
                );
                return self.fail(&job, &reason).await;
            }
            Err(e) => return self.fail(&job, &e.to_string()).await,
        };
        let Some(first_uri) = uris.first().cloned() else {
            return self
                .fail(&job, "provider returned no download URLs")
                .await;
        };

        let filename = derive_output_filename(&job.title, Some(&first_uri));
        if let Err(e) = tokio::fs::create_dir_all(&self.staging_dir).await {
            let reason = format!(
                "cannot prepare staging directory {}: {e}",
                self.staging_dir.display()
            );
            return self.fail(&job, &reason).await;
        }
        let tmp_path = self.staging_dir.join(&filename);
        let tmp_path = tmp_path.to_string_lossy().into_owned();

        let mut options = EnqueueOptions::new();
        options.insert("dir".into(), self.staging_dir.to_string_lossy().into_owned());
        options.insert("out".into(), filename);

        let enqueued = tokio::task::spawn_blocking({
            let daemon = Arc::clone(&self.daemon);
            let uris = uris.clone();
            move || daemon.enqueue(&uris, &options)
        })
        .await
        .unwrap_or_else(|e| {
            Err(DaemonError::Malformed {
                method: "aria2.addUri".into(),
                detail: format!("enqueue task: {e}"),
            })
        });
        let gid = match enqueued {
            Ok(gid) => gid,
            Err(e) => {
                let reason = format!("aria2 enqueue failed: {e}");
                return self.fail(&job, &reason).await;
            }
        };

        let recorded = match self
            .db
            .mark_downloading(job.id, &gid, &first_uri, &tmp_path)
            .await
        {
            Ok(recorded) => recorded,
            Err(e) => {
                // Nothing points at this gid; the job is requeued by the caller.
                self.remove_transfer(&gid).await;
                return Err(e);
            }
        };
        if !recorded {
            // Canceled underneath us; do not leave an orphan transfer running.
            tracing::warn!(job_id = job.id, gid = %gid, "job left starting before enqueue finished; removing transfer");
            self.remove_transfer(&gid).await;
            return Ok(TickOutcome::Abandoned { job_id: job.id });
        }

        self.db
            .emit(
                AuditAction::Downloading,
                &job,
                json!({ "gid": gid, "source_url": first_uri, "tmp_path": tmp_path }),
            )
            .await;
        Ok(TickOutcome::Enqueued {
            job_id: job.id,
            gid,
        })
    }

    async fn remove_transfer(&self, gid: &str) {
        let daemon = Arc::clone(&self.daemon);
        let g = gid.to_string();
        let removed = tokio::task::spawn_blocking(move || daemon.remove(&g, true)).await;
        if let Ok(Err(e)) = removed {
            tracing::warn!(gid = %gid, "orphan transfer removal failed: {e}");
        }
    }

    async fn fail(&self, job: &Job, reason: &str) -> Result<TickOutcome> {
        tracing::warn!(job_id = job.id, "job failed: {reason}");
        if self.db.mark_failed(job.id, reason).await? {
            self.db
                .emit(AuditAction::Failed, job, json!({ "reason": reason }))
                .await;
        }
        Ok(TickOutcome::Failed {
            job_id: job.id,
            reason: reason.to_string(),
        })
    }
}
