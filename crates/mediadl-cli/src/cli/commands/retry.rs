//! `mediadl retry <id>` – put a failed job back in the queue.

use anyhow::{Context, Result};
use mediadl_core::job_db::JobDb;

pub async fn run_retry(db: &JobDb, id: i64) -> Result<()> {
    let job = db
        .get_job(id)
        .await?
        .with_context(|| format!("job {id} not found"))?;
    if !db.retry_job(id).await? {
        anyhow::bail!("job {id} is {}, only failed jobs can be retried", job.status);
    }
    println!("Requeued job {id}");
    Ok(())
}
