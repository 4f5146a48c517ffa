//! Job write operations: insert and every lifecycle transition.
//!
//! Each transition is a conditional UPDATE guarded on the statuses it may
//! leave from, and returns whether a row changed. A `false` means the job
//! moved underneath us (canceled from the API layer, claimed elsewhere) and
//! the caller must not assume the transition happened.

use std::time::Duration;

use anyhow::Result;
use sqlx::Row;

use super::super::clock::now_micros;
use super::super::db::JobDb;
use super::super::types::{JobId, JobStatus, NewJob, ProgressUpdate};

impl JobDb {
    /// Insert a new `queued` job. With no explicit position the job is appended
    /// after the current maximum.
    pub async fn add_job(&self, job: &NewJob) -> Result<JobId> {
        let now = now_micros();
        let position = match job.position {
            Some(p) => p,
            None => {
                let row = sqlx::query("SELECT COALESCE(MAX(position), 0) + 1 AS next FROM jobs")
                    .fetch_one(&self.pool)
                    .await?;
                row.get("next")
            }
        };

        let id = sqlx::query(
            r#"
            INSERT INTO jobs (
                user_id, provider_id, external_id, title, category,
                status, progress, priority, position, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7, ?8, ?9, ?9)
            "#,
        )
        .bind(job.user_id)
        .bind(job.provider_id)
        .bind(&job.external_id)
        .bind(&job.title)
        .bind(&job.category)
        .bind(JobStatus::Queued.as_str())
        .bind(job.priority)
        .bind(position)
        .bind(now)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        Ok(id)
    }

    /// `starting -> downloading` after the daemon accepted the transfer.
    pub async fn mark_downloading(
        &self,
        id: JobId,
        gid: &str,
        source_url: &str,
        tmp_path: &str,
    ) -> Result<bool> {
        let res = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'downloading',
                aria2_gid = ?1,
                source_url = ?2,
                tmp_path = ?3,
                progress = 0,
                speed_bps = NULL,
                eta_seconds = NULL,
                error_text = NULL,
                updated_at = MAX(?4, updated_at + 1)
            WHERE id = ?5 AND status = 'starting'
            "#,
        )
        .bind(gid)
        .bind(source_url)
        .bind(tmp_path)
        .bind(now_micros())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    /// `starting -> queued` without recording a failure (rate-limit deferral).
    pub async fn release_claim(&self, id: JobId) -> Result<bool> {
        let res = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'queued',
                aria2_gid = NULL,
                speed_bps = NULL,
                eta_seconds = NULL,
                updated_at = MAX(?1, updated_at + 1)
            WHERE id = ?2 AND status = 'starting'
            "#,
        )
        .bind(now_micros())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    /// Persist a poll result. Guarded on the gid so a poll that raced a
    /// cancel or a recovery never resurrects the old transfer.
    pub async fn update_progress(
        &self,
        id: JobId,
        gid: &str,
        update: &ProgressUpdate,
    ) -> Result<bool> {
        let downloading = update.status == JobStatus::Downloading;
        let progress = update.progress.clamp(0, 100);
        let speed = if downloading { update.speed_bps } else { None };
        let eta = match speed {
            Some(s) if s > 0 => update.eta_seconds,
            _ => None,
        };
        let res = sqlx::query(
            r#"
            UPDATE jobs
            SET status = ?1,
                progress = ?2,
                speed_bps = ?3,
                eta_seconds = ?4,
                updated_at = MAX(?5, updated_at + 1)
            WHERE id = ?6
              AND aria2_gid = ?7
              AND status IN ('downloading', 'paused')
            "#,
        )
        .bind(update.status.as_str())
        .bind(progress)
        .bind(speed)
        .bind(eta)
        .bind(now_micros())
        .bind(id)
        .bind(gid)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    /// Terminal success: the staged file is already in the library at `final_path`.
    pub async fn mark_completed(&self, id: JobId, final_path: &str) -> Result<bool> {
        let res = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'completed',
                progress = 100,
                final_path = ?1,
                tmp_path = NULL,
                aria2_gid = NULL,
                speed_bps = NULL,
                eta_seconds = NULL,
                error_text = NULL,
                updated_at = MAX(?2, updated_at + 1)
            WHERE id = ?3 AND status IN ('downloading', 'paused')
            "#,
        )
        .bind(final_path)
        .bind(now_micros())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    /// Any non-terminal status (or `failed` again) -> `failed`. Clears the daemon handle.
    pub async fn mark_failed(&self, id: JobId, reason: &str) -> Result<bool> {
        self.mark_stopped(id, JobStatus::Failed, reason).await
    }

    /// Any non-terminal status (or `canceled` again) -> `canceled`. Clears the daemon handle.
    pub async fn mark_canceled(&self, id: JobId, reason: &str) -> Result<bool> {
        self.mark_stopped(id, JobStatus::Canceled, reason).await
    }

    async fn mark_stopped(&self, id: JobId, to: JobStatus, reason: &str) -> Result<bool> {
        let res = sqlx::query(
            r#"
            UPDATE jobs
            SET status = ?1,
                error_text = ?2,
                aria2_gid = NULL,
                speed_bps = NULL,
                eta_seconds = NULL,
                final_path = NULL,
                updated_at = MAX(?3, updated_at + 1)
            WHERE id = ?4
              AND status IN ('queued', 'starting', 'downloading', 'paused', ?1)
            "#,
        )
        .bind(to.as_str())
        .bind(reason)
        .bind(now_micros())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    /// Lost-reference recovery succeeded: swap in the new handle (and the
    /// staging path it writes to), keep progress.
    pub async fn replace_gid(
        &self,
        id: JobId,
        old_gid: &str,
        new_gid: &str,
        tmp_path: &str,
    ) -> Result<bool> {
        let res = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'downloading',
                aria2_gid = ?1,
                tmp_path = ?2,
                error_text = NULL,
                speed_bps = NULL,
                eta_seconds = NULL,
                updated_at = MAX(?3, updated_at + 1)
            WHERE id = ?4
              AND aria2_gid = ?5
              AND status IN ('downloading', 'paused')
            "#,
        )
        .bind(new_gid)
        .bind(tmp_path)
        .bind(now_micros())
        .bind(id)
        .bind(old_gid)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    /// Put `starting` jobs untouched for longer than `max_age` back in the queue.
    ///
    /// A scheduler that dies between claim and enqueue leaves its job in
    /// `starting` forever; run at scheduler startup. Returns the number reset.
    pub async fn recover_stale_starting(&self, max_age: Duration) -> Result<u64> {
        let age = i64::try_from(max_age.as_micros()).unwrap_or(i64::MAX);
        let cutoff = now_micros().saturating_sub(age);
        let res = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'queued',
                aria2_gid = NULL,
                updated_at = MAX(?1, updated_at + 1)
            WHERE status = 'starting' AND updated_at < ?2
            "#,
        )
        .bind(now_micros())
        .bind(cutoff)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected())
    }

    /// Operator retry: `failed -> queued` with progress and diagnostics reset.
    pub async fn retry_job(&self, id: JobId) -> Result<bool> {
        let res = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'queued',
                progress = 0,
                aria2_gid = NULL,
                tmp_path = NULL,
                speed_bps = NULL,
                eta_seconds = NULL,
                error_text = NULL,
                updated_at = MAX(?1, updated_at + 1)
            WHERE id = ?2 AND status = 'failed'
            "#,
        )
        .bind(now_micros())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() > 0)
    }
}
