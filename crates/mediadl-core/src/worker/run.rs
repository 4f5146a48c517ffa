use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use crate::aria2::Aria2Client;
use crate::config::{reload_or_keep, MediadlConfig};
use crate::job_db::JobDb;
use crate::library::{notifier_from_config, FsLibrary};
use crate::shutdown::{sleep_or_stop, spawn_shutdown_watch};

use super::{PollOutcome, Worker};

/// Run until Ctrl-C / SIGTERM, re-reading `config_path` before every pass.
pub async fn run_worker_loop(
    db: JobDb,
    mut cfg: MediadlConfig,
    config_path: Option<PathBuf>,
    secret_override: Option<String>,
) -> Result<()> {
    let mut worker = Worker::new(
        db,
        Arc::new(Aria2Client::from_config(&cfg.aria2, secret_override.as_deref())),
        Arc::new(FsLibrary::new(&cfg.library_dir)),
        notifier_from_config(cfg.jellyfin.as_ref()),
        &cfg,
    );
    let mut stop = spawn_shutdown_watch();
    tracing::info!(interval_secs = cfg.worker_interval_secs, "worker started");

    loop {
        if let Some(path) = &config_path {
            let next = reload_or_keep(path, &cfg);
            if next.aria2 != cfg.aria2 {
                worker.set_daemon(Arc::new(Aria2Client::from_config(
                    &next.aria2,
                    secret_override.as_deref(),
                )));
            }
            if next.library_dir != cfg.library_dir {
                worker.set_placer(Arc::new(FsLibrary::new(&next.library_dir)));
            }
            if next.jellyfin != cfg.jellyfin {
                worker.set_notifier(notifier_from_config(next.jellyfin.as_ref()));
            }
            if next.staging_dir != cfg.staging_dir {
                worker.set_staging_dir(next.staging_dir.clone());
            }
            cfg = next;
        }

        match worker.poll_once().await {
            Ok(outcomes) => {
                for (job_id, outcome) in outcomes {
                    match outcome {
                        PollOutcome::Progress | PollOutcome::Paused | PollOutcome::Skipped => {}
                        other => tracing::info!(job_id, outcome = ?other, "worker pass"),
                    }
                }
            }
            Err(e) => tracing::error!("worker pass failed: {e:#}"),
        }

        let interval = Duration::from_secs(cfg.worker_interval_secs.max(1));
        if sleep_or_stop(&mut stop, interval).await {
            break;
        }
    }

    tracing::info!("worker stopped");
    Ok(())
}
