//! Audit trail: one row per job state transition.
//!
//! Recording is best-effort from the loops' point of view; `emit` logs a
//! failed insert and carries on so a transition is never undone by its audit.

use anyhow::Result;
use sqlx::Row;

use super::clock::now_micros;
use super::db::JobDb;
use super::types::{AuditEvent, Job, JobId};

/// Stable action names shared with the API layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    Starting,
    Downloading,
    Completed,
    Failed,
    Canceled,
    Requeued,
}

impl AuditAction {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditAction::Starting => "job.starting",
            AuditAction::Downloading => "job.downloading",
            AuditAction::Completed => "job.completed",
            AuditAction::Failed => "job.failed",
            AuditAction::Canceled => "job.canceled",
            AuditAction::Requeued => "job.requeued",
        }
    }
}

impl JobDb {
    /// Insert one audit row.
    pub async fn record_audit(
        &self,
        action: AuditAction,
        job_id: JobId,
        payload: &serde_json::Value,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_events (job_id, action, payload_json, created_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(job_id)
        .bind(action.as_str())
        .bind(payload.to_string())
        .bind(now_micros())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Record a transition for `job`. The payload always carries the title;
    /// `extra` object fields are merged in. Failures are logged only.
    pub async fn emit(&self, action: AuditAction, job: &Job, extra: serde_json::Value) {
        let mut payload = serde_json::json!({ "title": job.title });
        if let (Some(obj), serde_json::Value::Object(extra)) = (payload.as_object_mut(), extra) {
            for (k, v) in extra {
                obj.insert(k, v);
            }
        }
        tracing::info!(job_id = job.id, action = action.as_str(), %payload, "job transition");
        if let Err(e) = self.record_audit(action, job.id, &payload).await {
            tracing::warn!(job_id = job.id, action = action.as_str(), "audit insert failed: {e:#}");
        }
    }

    /// Audit rows for a job, oldest first.
    pub async fn list_audit_events(&self, job_id: JobId) -> Result<Vec<AuditEvent>> {
        let rows = sqlx::query(
            r#"
            SELECT id, job_id, action, payload_json, created_at FROM audit_events
            WHERE job_id = ?1
            ORDER BY id ASC
            "#,
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|r| {
                let raw: String = r.get("payload_json");
                Ok(AuditEvent {
                    id: r.get("id"),
                    job_id: r.get("job_id"),
                    action: r.get("action"),
                    payload: serde_json::from_str(&raw)?,
                    created_at: r.get("created_at"),
                })
            })
            .collect()
    }
}
