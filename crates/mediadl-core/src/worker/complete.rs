//! Completion: move the finished file into the library, then record it.
//!
//! The job is either `completed` with its file in the library, or `failed`
//! with the file back where aria2 left it. A database error after the move
//! undoes the move before failing the job.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use serde_json::json;

use crate::aria2::TransferStatus;
use crate::job_db::{AuditAction, Job, JobId};
use crate::library::move_file;

use super::{PollOutcome, Worker};

#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    #[error("aria2 reported no output file and the job has no staging path")]
    NoOutputFile,

    #[error("library placement failed: {0:#}")]
    Placement(anyhow::Error),

    #[error("recording completion failed: {0:#}")]
    Record(anyhow::Error),
}

impl Worker {
    pub(super) async fn complete(&self, job: &Job, status: &TransferStatus) -> Result<PollOutcome> {
        match self.place_and_record(job, status).await {
            Ok(Some(final_path)) => {
                self.spawn_refresh(job.id);
                self.db
                    .emit(
                        AuditAction::Completed,
                        job,
                        json!({ "final_path": final_path }),
                    )
                    .await;
                Ok(PollOutcome::Completed { final_path })
            }
            Ok(None) => Ok(PollOutcome::Skipped),
            Err(e) => {
                let reason = e.to_string();
                tracing::error!(job_id = job.id, "completion failed: {reason}");
                if self.db.mark_failed(job.id, &reason).await? {
                    self.db
                        .emit(AuditAction::Failed, job, json!({ "reason": reason }))
                        .await;
                }
                Ok(PollOutcome::Failed { reason })
            }
        }
    }

    /// `Ok(None)`: the job left `downloading`/`paused` while we were moving
    /// the file; the move has been undone.
    async fn place_and_record(
        &self,
        job: &Job,
        status: &TransferStatus,
    ) -> Result<Option<String>, CompletionError> {
        let staged = status
            .first_file_path()
            .map(PathBuf::from)
            .or_else(|| job.tmp_path_buf())
            .ok_or(CompletionError::NoOutputFile)?;

        let placed = tokio::task::spawn_blocking({
            let placer = Arc::clone(&self.placer);
            let job = job.clone();
            let staged = staged.clone();
            move || placer.move_to_library(&job, &staged)
        })
        .await
        .map_err(|e| CompletionError::Placement(anyhow::Error::new(e)))?
        .map_err(CompletionError::Placement)?;
        let final_path = placed.to_string_lossy().into_owned();

        match self.db.mark_completed(job.id, &final_path).await {
            Ok(true) => Ok(Some(final_path)),
            Ok(false) => {
                tracing::warn!(job_id = job.id, "job changed state during placement; undoing move");
                undo_move(&placed, &staged).await;
                Ok(None)
            }
            Err(e) => {
                undo_move(&placed, &staged).await;
                Err(CompletionError::Record(e))
            }
        }
    }

    /// Library refresh in the background; its failure never touches the job.
    fn spawn_refresh(&self, job_id: JobId) {
        let notifier = Arc::clone(&self.notifier);
        tokio::task::spawn_blocking(move || {
            if let Err(e) = notifier.refresh() {
                tracing::warn!(job_id, "library refresh failed: {e:#}");
            }
        });
    }
}

async fn undo_move(placed: &Path, staged: &Path) {
    let (from, to) = (placed.to_path_buf(), staged.to_path_buf());
    let moved = tokio::task::spawn_blocking(move || move_file(&from, &to)).await;
    match moved {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!(
            "could not move {} back to {}: {e}",
            placed.display(),
            staged.display()
        ),
        Err(e) => tracing::error!("undo move task failed: {e}"),
    }
}
