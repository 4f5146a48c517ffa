//! Atomic claim of the next queued job.

use anyhow::Result;
use sqlx::Row;

use super::super::audit::AuditAction;
use super::super::clock::now_micros;
use super::super::db::JobDb;
use super::super::types::Job;
use super::read::{job_from_row, JOB_COLUMNS};

/// Attempts before giving up when another process keeps winning the race.
const CLAIM_ATTEMPTS: usize = 3;

impl JobDb {
    /// Atomically claim the next queued job and flip it to `starting`.
    ///
    /// Candidates are ordered by `(priority, position, created_at, id)`.
    /// Jobs whose provider is paused or disabled, and jobs whose
    /// `(provider_id, external_id)` is under a live rate-limit deferral, are
    /// skipped. The flip is a conditional update on `status = 'queued'`, so two
    /// processes racing on the same row cannot both win; the loser retries
    /// with the next candidate. The `job.starting` audit row is written in the
    /// same transaction.
    pub async fn claim_next_queued_job(&self) -> Result<Option<Job>> {
        for _ in 0..CLAIM_ATTEMPTS {
            let now = now_micros();
            let mut tx = self.pool.begin().await?;
            let row = sqlx::query(
                r#"
                SELECT j.id, j.title FROM jobs j
                LEFT JOIN providers p ON p.id = j.provider_id
                WHERE j.status = 'queued'
                  AND (p.id IS NULL OR p.enabled = 1)
                  AND NOT EXISTS (
                      SELECT 1 FROM provider_pauses pp
                      WHERE pp.provider_id = j.provider_id
                  )
                  AND NOT EXISTS (
                      SELECT 1 FROM rate_limit_deferrals d
                      WHERE d.provider_id = j.provider_id
                        AND d.external_id = j.external_id
                        AND d.until_at > ?1
                  )
                ORDER BY j.priority ASC, j.position ASC, j.created_at ASC, j.id ASC
                LIMIT 1
                "#,
            )
            .bind(now)
            .fetch_optional(&mut *tx)
            .await?;
            let Some(row) = row else {
                tx.commit().await?;
                return Ok(None);
            };
            let id: i64 = row.get("id");
            let title: String = row.get("title");

            let res = sqlx::query(
                r#"
                UPDATE jobs
                SET status = 'starting',
                    aria2_gid = NULL,
                    speed_bps = NULL,
                    eta_seconds = NULL,
                    updated_at = MAX(?1, updated_at + 1)
                WHERE id = ?2 AND status = 'queued'
                "#,
            )
            .bind(now)
            .bind(id)
            .execute(&mut *tx)
            .await?;
            if res.rows_affected() == 0 {
                tx.rollback().await?;
                tracing::debug!(job_id = id, "claim lost race, trying next candidate");
                continue;
            }

            let payload = serde_json::json!({ "title": title });
            sqlx::query(
                r#"
                INSERT INTO audit_events (job_id, action, payload_json, created_at)
                VALUES (?1, ?2, ?3, ?4)
                "#,
            )
            .bind(id)
            .bind(AuditAction::Starting.as_str())
            .bind(payload.to_string())
            .bind(now)
            .execute(&mut *tx)
            .await?;

            let sql = format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?1");
            let row = sqlx::query(&sql).bind(id).fetch_one(&mut *tx).await?;
            let job = job_from_row(&row)?;
            tx.commit().await?;
            return Ok(Some(job));
        }
        Ok(None)
    }
}
