//! `mediadl status [id]` – list jobs, or show one job with its audit trail.

use anyhow::{Context, Result};
use mediadl_core::job_db::{Job, JobDb};

pub async fn run_status(db: &JobDb, id: Option<i64>) -> Result<()> {
    match id {
        Some(id) => show_job(db, id).await,
        None => list_jobs(db).await,
    }
}

async fn list_jobs(db: &JobDb) -> Result<()> {
    let jobs = db.list_jobs().await?;
    if jobs.is_empty() {
        println!("No jobs in database.");
        return Ok(());
    }
    println!(
        "{:<6} {:<12} {:>5} {:>10} {:<8} {}",
        "ID", "STATUS", "PROG", "SPEED", "ETA", "TITLE"
    );
    for j in jobs {
        println!(
            "{:<6} {:<12} {:>4}% {:>10} {:<8} {}",
            j.id,
            j.status.as_str(),
            j.progress,
            j.speed_bps
                .map(format_rate)
                .unwrap_or_else(|| "-".to_string()),
            j.eta_seconds
                .map(|s| format!("{s}s"))
                .unwrap_or_else(|| "-".to_string()),
            j.title
        );
    }
    Ok(())
}

async fn show_job(db: &JobDb, id: i64) -> Result<()> {
    let job = db
        .get_job(id)
        .await?
        .with_context(|| format!("job {id} not found"))?;
    print_job(&job);
    let events = db.list_audit_events(id).await?;
    if !events.is_empty() {
        println!("audit:");
        for e in events {
            println!("  {} {} {}", e.created_at, e.action, e.payload);
        }
    }
    Ok(())
}

fn print_job(j: &Job) {
    println!("job {} [{}] {}", j.id, j.status, j.title);
    println!("  provider:    {} / {}", j.provider_id, j.external_id);
    println!("  progress:    {}%", j.progress);
    let fields = [
        ("category", j.category.as_deref()),
        ("source url", j.source_url.as_deref()),
        ("aria2 gid", j.aria2_gid.as_deref()),
        ("staging", j.tmp_path.as_deref()),
        ("final path", j.final_path.as_deref()),
        ("error", j.error_text.as_deref()),
    ];
    for (label, value) in fields {
        if let Some(v) = value {
            println!("  {:<12} {}", format!("{label}:"), v);
        }
    }
}

fn format_rate(bps: i64) -> String {
    const MIB: f64 = 1024.0 * 1024.0;
    let b = bps as f64;
    if b >= MIB {
        format!("{:.1} MiB/s", b / MIB)
    } else {
        format!("{:.0} KiB/s", b / 1024.0)
    }
}
