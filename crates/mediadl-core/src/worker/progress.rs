//! Map a daemon status report onto the job's progress fields.

use crate::aria2::TransferStatus;
use crate::job_db::{JobStatus, ProgressUpdate};

/// Whole percent, rounded down and clamped to 0..=100. Unknown or zero
/// total gives 0.
pub fn percent(completed: Option<u64>, total: Option<u64>) -> i64 {
    match (completed, total) {
        (Some(done), Some(total)) if total > 0 => {
            let pct = (u128::from(done) * 100) / u128::from(total);
            pct.min(100) as i64
        }
        _ => 0,
    }
}

/// Seconds left at the current speed, rounded up. `None` without a
/// positive speed or a known total.
pub fn eta_seconds(completed: Option<u64>, total: Option<u64>, speed: Option<u64>) -> Option<i64> {
    let speed = speed.filter(|s| *s > 0)?;
    let total = total.filter(|t| *t > 0)?;
    let remaining = total.saturating_sub(completed.unwrap_or(0));
    i64::try_from(remaining.div_ceil(speed)).ok()
}

/// Progress row for a live transfer. Speed and eta are dropped unless the
/// job is actively downloading.
pub fn progress_update(status: &TransferStatus, job_status: JobStatus) -> ProgressUpdate {
    let progress = percent(status.completed_length, status.total_length);
    if job_status != JobStatus::Downloading {
        return ProgressUpdate {
            status: job_status,
            progress,
            speed_bps: None,
            eta_seconds: None,
        };
    }
    let speed = status
        .download_speed
        .and_then(|s| i64::try_from(s).ok());
    ProgressUpdate {
        status: job_status,
        progress,
        speed_bps: speed,
        eta_seconds: eta_seconds(
            status.completed_length,
            status.total_length,
            status.download_speed,
        ),
    }
}
