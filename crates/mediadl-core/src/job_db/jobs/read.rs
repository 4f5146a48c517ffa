//! Job read operations: list, get, and the worker's in-flight view.

use anyhow::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::super::db::JobDb;
use super::super::types::{Job, JobId, JobStatus};

pub(crate) const JOB_COLUMNS: &str = r#"
    id, user_id, provider_id, external_id, title, source_url, category,
    status, progress, speed_bps, eta_seconds, priority, position,
    aria2_gid, tmp_path, final_path, error_text, created_at, updated_at
"#;

pub(crate) fn job_from_row(row: &SqliteRow) -> Result<Job> {
    let status_str: String = row.get("status");
    let status = JobStatus::parse(&status_str)
        .ok_or_else(|| anyhow::anyhow!("unknown job status in database: {status_str}"))?;
    Ok(Job {
        id: row.get("id"),
        user_id: row.get("user_id"),
        provider_id: row.get("provider_id"),
        external_id: row.get("external_id"),
        title: row.get("title"),
        source_url: row.get("source_url"),
        category: row.get("category"),
        status,
        progress: row.get("progress"),
        speed_bps: row.get("speed_bps"),
        eta_seconds: row.get("eta_seconds"),
        priority: row.get("priority"),
        position: row.get("position"),
        aria2_gid: row.get("aria2_gid"),
        tmp_path: row.get("tmp_path"),
        final_path: row.get("final_path"),
        error_text: row.get("error_text"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

impl JobDb {
    /// Fetch a single job row.
    pub async fn get_job(&self, id: JobId) -> Result<Option<Job>> {
        let sql = format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?1");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(job_from_row).transpose()
    }

    /// List all jobs in claim order (priority, position, creation).
    pub async fn list_jobs(&self) -> Result<Vec<Job>> {
        let sql = format!(
            "SELECT {JOB_COLUMNS} FROM jobs ORDER BY priority ASC, position ASC, created_at ASC, id ASC"
        );
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(job_from_row).collect()
    }

    /// Jobs the worker must poll: downloading or paused with a daemon handle.
    pub async fn list_in_flight(&self) -> Result<Vec<Job>> {
        let sql = format!(
            r#"
            SELECT {JOB_COLUMNS} FROM jobs
            WHERE status IN ('downloading', 'paused')
              AND aria2_gid IS NOT NULL
            ORDER BY updated_at ASC, id ASC
            "#
        );
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(job_from_row).collect()
    }

    /// Number of jobs occupying a daemon slot (`starting` + `downloading`).
    pub async fn count_active(&self) -> Result<i64> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS n FROM jobs
            WHERE status IN ('starting', 'downloading')
            "#,
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(row.get("n"))
    }
}
