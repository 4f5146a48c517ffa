//! Stop signal for the polling loops: Ctrl-C, or SIGTERM on unix.

/// Resolves once the process is asked to stop. If a handler cannot be
/// installed the corresponding branch never fires.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("ctrl-c handler unavailable: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                tracing::warn!("SIGTERM handler unavailable: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received ctrl-c, stopping after this pass"),
        _ = terminate => tracing::info!("received SIGTERM, stopping after this pass"),
    }
}

/// Install the handlers now and expose the stop request as a watch flag the
/// loops check between passes. A signal that arrives mid-pass lets the pass
/// finish first.
pub fn spawn_shutdown_watch() -> tokio::sync::watch::Receiver<bool> {
    let (tx, rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = tx.send(true);
    });
    rx
}

/// Sleep for `interval`, returning early with `true` if a stop was requested.
pub async fn sleep_or_stop(
    stop: &mut tokio::sync::watch::Receiver<bool>,
    interval: std::time::Duration,
) -> bool {
    if *stop.borrow() {
        return true;
    }
    tokio::select! {
        changed = stop.changed() => {
            if changed.is_err() {
                // Signal task is gone; nothing can request a stop any more.
                tokio::time::sleep(interval).await;
            }
            *stop.borrow()
        }
        _ = tokio::time::sleep(interval) => *stop.borrow(),
    }
}
