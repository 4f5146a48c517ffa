//! `mediadl scheduler` / `mediadl worker` – the two long-running loops.

use anyhow::Result;
use mediadl_core::config::MediadlConfig;
use mediadl_core::job_db::JobDb;
use mediadl_core::{scheduler, worker};
use std::path::PathBuf;

pub async fn run_scheduler(
    db: JobDb,
    cfg: MediadlConfig,
    config_path: PathBuf,
    secret: Option<String>,
) -> Result<()> {
    scheduler::run_scheduler_loop(db, cfg, Some(config_path), secret).await
}

pub async fn run_worker(
    db: JobDb,
    cfg: MediadlConfig,
    config_path: PathBuf,
    secret: Option<String>,
) -> Result<()> {
    worker::run_worker_loop(db, cfg, Some(config_path), secret).await
}
