//! `mediadl cancel <id>` – cancel a job. The aria2 transfer is removed first,
//! best effort; the job is canceled even if aria2 is unreachable.

use anyhow::{Context, Result};
use mediadl_core::aria2::{Aria2Client, DownloadDaemon};
use mediadl_core::config::MediadlConfig;
use mediadl_core::job_db::{AuditAction, JobDb};
use serde_json::json;

const CANCEL_REASON: &str = "canceled by operator";

pub async fn run_cancel(
    db: &JobDb,
    cfg: &MediadlConfig,
    secret: Option<&str>,
    id: i64,
) -> Result<()> {
    let job = db
        .get_job(id)
        .await?
        .with_context(|| format!("job {id} not found"))?;
    if job.status.is_terminal() {
        anyhow::bail!("job {id} is already {}", job.status);
    }

    if let Some(gid) = job.aria2_gid.clone() {
        let client = Aria2Client::from_config(&cfg.aria2, secret);
        let g = gid.clone();
        match tokio::task::spawn_blocking(move || client.remove(&g, true)).await? {
            Ok(_) => tracing::info!(job_id = id, gid = %gid, "removed aria2 transfer"),
            Err(e) => {
                tracing::warn!(job_id = id, gid = %gid, "aria2 remove failed: {e}");
                eprintln!("warning: could not remove aria2 transfer {gid}: {e}");
            }
        }
    }

    if !db.mark_canceled(id, CANCEL_REASON).await? {
        anyhow::bail!("job {id} is {} and cannot be canceled", job.status);
    }
    db.emit(
        AuditAction::Canceled,
        &job,
        json!({ "reason": CANCEL_REASON, "gid": job.aria2_gid }),
    )
    .await;
    println!("Canceled job {id}");
    Ok(())
}
