//! Types used by the job database.

use std::path::PathBuf;

/// Job identifier.
pub type JobId = i64;

/// Provider row identifier.
pub type ProviderId = i64;

/// Job lifecycle status stored as a string in the database.
///
/// The string values are shared with the API layer and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobStatus {
    Queued,
    Starting,
    Downloading,
    Paused,
    Completed,
    Failed,
    Canceled,
    Deleted,
}

impl JobStatus {
    pub const ALL: [JobStatus; 8] = [
        JobStatus::Queued,
        JobStatus::Starting,
        JobStatus::Downloading,
        JobStatus::Paused,
        JobStatus::Completed,
        JobStatus::Failed,
        JobStatus::Canceled,
        JobStatus::Deleted,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Starting => "starting",
            JobStatus::Downloading => "downloading",
            JobStatus::Paused => "paused",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Canceled => "canceled",
            JobStatus::Deleted => "deleted",
        }
    }

    /// Parse a stored status. Unknown strings map to `None`; callers decide how loud to be.
    pub fn parse(s: &str) -> Option<Self> {
        JobStatus::ALL.into_iter().find(|st| st.as_str() == s)
    }

    /// Statuses in which a job may hold an aria2 GID.
    pub fn may_hold_gid(self) -> bool {
        matches!(
            self,
            JobStatus::Starting | JobStatus::Downloading | JobStatus::Paused
        )
    }

    /// Terminal from the orchestration engine's point of view.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Canceled | JobStatus::Deleted
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Full job row.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub id: JobId,
    pub user_id: i64,
    pub provider_id: ProviderId,
    pub external_id: String,
    pub title: String,
    pub source_url: Option<String>,
    pub category: Option<String>,
    pub status: JobStatus,
    pub progress: i64,
    pub speed_bps: Option<i64>,
    pub eta_seconds: Option<i64>,
    pub priority: i64,
    pub position: i64,
    pub aria2_gid: Option<String>,
    pub tmp_path: Option<String>,
    pub final_path: Option<String>,
    pub error_text: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Job {
    pub fn tmp_path_buf(&self) -> Option<PathBuf> {
        self.tmp_path.as_deref().map(PathBuf::from)
    }
}

/// Fields supplied when queueing a new job.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub user_id: i64,
    pub provider_id: ProviderId,
    pub external_id: String,
    pub title: String,
    pub category: Option<String>,
    pub priority: i64,
    /// Explicit queue position; `None` appends after the current maximum.
    pub position: Option<i64>,
}

#[cfg(test)]
impl NewJob {
    pub(crate) fn for_test(provider_id: ProviderId, external_id: &str, title: &str) -> Self {
        NewJob {
            user_id: 1,
            provider_id,
            external_id: external_id.to_string(),
            title: title.to_string(),
            category: None,
            priority: 100,
            position: None,
        }
    }
}

/// Progress fields written by the worker on every poll of an in-flight job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressUpdate {
    /// `Downloading` or `Paused`.
    pub status: JobStatus,
    pub progress: i64,
    pub speed_bps: Option<i64>,
    pub eta_seconds: Option<i64>,
}

/// Provider configuration row. Read-only input for building resolvers.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderRecord {
    pub id: ProviderId,
    pub key: String,
    pub display_name: String,
    pub enabled: bool,
    pub config_json: String,
}

/// Entry in the shared provider pause registry.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderPause {
    pub provider_id: ProviderId,
    pub reason: String,
    pub paused_at: i64,
}

/// Stored audit row.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditEvent {
    pub id: i64,
    pub job_id: JobId,
    pub action: String,
    pub payload: serde_json::Value,
    pub created_at: i64,
}
