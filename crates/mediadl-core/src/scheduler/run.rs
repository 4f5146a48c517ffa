//! The scheduler process loop: reload config, one pass, sleep, repeat.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use crate::aria2::Aria2Client;
use crate::config::{reload_or_keep, MediadlConfig};
use crate::job_db::JobDb;
use crate::shutdown::{sleep_or_stop, spawn_shutdown_watch};

use super::{Scheduler, TickOutcome};

/// A claim still `starting` after this long was abandoned by its scheduler.
/// Resolve and enqueue are bounded by request timeouts well below it.
const STALE_CLAIM_AGE: Duration = Duration::from_secs(5 * 60);

/// Run until Ctrl-C / SIGTERM. `config_path` is re-read before every pass;
/// `secret_override` beats the configured aria2 secret.
pub async fn run_scheduler_loop(
    db: JobDb,
    mut cfg: MediadlConfig,
    config_path: Option<PathBuf>,
    secret_override: Option<String>,
) -> Result<()> {
    let daemon = Arc::new(Aria2Client::from_config(&cfg.aria2, secret_override.as_deref()));
    let mut scheduler = Scheduler::new(db.clone(), daemon, &cfg);
    let mut stop = spawn_shutdown_watch();
    tracing::info!(
        interval_secs = cfg.scheduler_interval_secs,
        max_active = cfg.max_active_downloads,
        "scheduler started"
    );

    loop {
        if let Some(path) = &config_path {
            let next = reload_or_keep(path, &cfg);
            if next != cfg {
                if next.aria2 != cfg.aria2 {
                    scheduler.set_daemon(Arc::new(Aria2Client::from_config(
                        &next.aria2,
                        secret_override.as_deref(),
                    )));
                }
                scheduler.apply_config(&next);
                cfg = next;
            }
        }

        match db.recover_stale_starting(STALE_CLAIM_AGE).await {
            Ok(0) => {}
            Ok(reset) => tracing::warn!("returned {reset} stale starting job(s) to the queue"),
            Err(e) => tracing::warn!("stale claim recovery failed: {e:#}"),
        }

        match scheduler.tick().await {
            Ok(TickOutcome::Idle) | Ok(TickOutcome::Blocked(_)) => {}
            Ok(outcome) => tracing::info!(?outcome, "scheduler pass"),
            Err(e) => tracing::error!("scheduler pass failed: {e:#}"),
        }
        if let Err(e) = db.purge_expired_deferrals().await {
            tracing::warn!("purging expired deferrals failed: {e:#}");
        }

        let interval = Duration::from_secs(cfg.scheduler_interval_secs.max(1));
        if sleep_or_stop(&mut stop, interval).await {
            break;
        }
    }

    tracing::info!("scheduler stopped");
    Ok(())
}
