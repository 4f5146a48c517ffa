use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use super::*;
use crate::admission::{AdmissionController, SpaceProbe};
use crate::aria2::{DaemonError, EnqueueOptions, TransferStatus};
use crate::config::SpaceCheckPolicy;
use crate::job_db::{open_memory, JobStatus, NewJob, ProviderId};
use crate::provider::ProviderError;
use crate::test_support::{rpc_failure, FakeDaemon, FakeProvider};

struct Harness {
    db: JobDb,
    daemon: Arc<FakeDaemon>,
    scheduler: Scheduler,
    provider_id: ProviderId,
    staging: PathBuf,
    _dir: TempDir,
}

fn test_config(dir: &Path) -> MediadlConfig {
    MediadlConfig {
        staging_dir: dir.join("staging"),
        library_dir: dir.join("library"),
        max_active_downloads: 2,
        min_free_space_bytes: 0,
        ..MediadlConfig::default()
    }
}

async fn harness(provider: Arc<FakeProvider>) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let cfg = test_config(dir.path());
    let db = open_memory().await.unwrap();
    let provider_id = db.add_provider("direct", "Direct", "{}").await.unwrap();
    let record = db.get_provider(provider_id).await.unwrap().unwrap();

    let daemon = Arc::new(FakeDaemon::new());
    let mut scheduler = Scheduler::new(db.clone(), daemon.clone(), &cfg);
    scheduler.providers_mut().insert_instance(&record, provider);
    Harness {
        db,
        daemon,
        scheduler,
        provider_id,
        staging: cfg.staging_dir,
        _dir: dir,
    }
}

async fn actions(db: &JobDb, job_id: JobId) -> Vec<String> {
    db.list_audit_events(job_id)
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.action)
        .collect()
}

#[tokio::test]
async fn tick_enqueues_claimed_job() {
    let provider = Arc::new(FakeProvider::returning(&["https://cdn.example/v/bbb.mp4"]));
    let mut h = harness(provider.clone()).await;
    let id = h
        .db
        .add_job(&NewJob::for_test(h.provider_id, "bbb", "Big Buck Bunny"))
        .await
        .unwrap();

    let outcome = h.scheduler.tick().await.unwrap();
    assert_eq!(
        outcome,
        TickOutcome::Enqueued {
            job_id: id,
            gid: "G1".into()
        }
    );

    let job = h.db.get_job(id).await.unwrap().unwrap();
    let expected_tmp = h.staging.join("Big Buck Bunny.mp4");
    assert_eq!(job.status, JobStatus::Downloading);
    assert_eq!(job.aria2_gid.as_deref(), Some("G1"));
    assert_eq!(job.source_url.as_deref(), Some("https://cdn.example/v/bbb.mp4"));
    assert_eq!(job.tmp_path_buf(), Some(expected_tmp));
    assert!(h.staging.is_dir());

    let enqueued = h.daemon.enqueued();
    assert_eq!(enqueued.len(), 1);
    let (uris, options): &(Vec<String>, EnqueueOptions) = &enqueued[0];
    assert_eq!(uris, &vec!["https://cdn.example/v/bbb.mp4".to_string()]);
    assert_eq!(
        options.get("dir").map(String::as_str),
        Some(h.staging.to_string_lossy().as_ref())
    );
    assert_eq!(options.get("out").map(String::as_str), Some("Big Buck Bunny.mp4"));

    assert_eq!(actions(&h.db, id).await, vec!["job.starting", "job.downloading"]);
    let events = h.db.list_audit_events(id).await.unwrap();
    assert_eq!(events[1].payload["gid"], "G1");
    assert_eq!(provider.calls(), 1);
}

#[tokio::test]
async fn empty_queue_is_idle() {
    let mut h = harness(Arc::new(FakeProvider::returning(&["https://x/a.mkv"]))).await;
    assert_eq!(h.scheduler.tick().await.unwrap(), TickOutcome::Idle);
    assert!(h.daemon.enqueued().is_empty());
}

#[tokio::test]
async fn rate_limit_requeues_and_defers_identifier() {
    let provider = Arc::new(FakeProvider::new(vec![Err(ProviderError::RateLimited {
        endpoint: "https://api.example".into(),
        retry_after: Duration::from_secs(120),
    })]));
    let mut h = harness(provider.clone()).await;
    let id = h
        .db
        .add_job(&NewJob::for_test(h.provider_id, "tt-1", "Slow Movie"))
        .await
        .unwrap();

    let outcome = h.scheduler.tick().await.unwrap();
    assert_eq!(
        outcome,
        TickOutcome::Deferred {
            job_id: id,
            retry_after: Duration::from_secs(120)
        }
    );
    let job = h.db.get_job(id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Queued);
    assert!(job.aria2_gid.is_none());
    assert!(job.error_text.is_none());
    assert!(!actions(&h.db, id).await.contains(&"job.failed".to_string()));
    assert!(h
        .db
        .deferral_until(h.provider_id, "tt-1")
        .await
        .unwrap()
        .is_some());

    // The identifier is not asked for again before the deadline.
    assert_eq!(h.scheduler.tick().await.unwrap(), TickOutcome::Idle);
    assert_eq!(provider.calls(), 1);
    assert!(h.daemon.enqueued().is_empty());
}

#[tokio::test]
async fn not_found_fails_job_and_pauses_provider() {
    let provider = Arc::new(FakeProvider::new(vec![Err(ProviderError::NotFound {
        endpoint: "https://api.example".into(),
        detail: "no such title".into(),
    })]));
    let mut h = harness(provider.clone()).await;
    let first = h
        .db
        .add_job(&NewJob::for_test(h.provider_id, "gone", "Gone"))
        .await
        .unwrap();
    let second = h
        .db
        .add_job(&NewJob::for_test(h.provider_id, "other", "Other"))
        .await
        .unwrap();

    match h.scheduler.tick().await.unwrap() {
        TickOutcome::Failed { job_id, reason } => {
            assert_eq!(job_id, first);
            assert!(reason.contains("not found"), "{reason}");
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    let job = h.db.get_job(first).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.error_text.unwrap().contains("no such title"));
    assert!(h.db.is_provider_paused(h.provider_id).await.unwrap());
    assert_eq!(actions(&h.db, first).await, vec!["job.starting", "job.failed"]);

    // Paused provider: its remaining jobs stay queued.
    assert_eq!(h.scheduler.tick().await.unwrap(), TickOutcome::Idle);
    let still = h.db.get_job(second).await.unwrap().unwrap();
    assert_eq!(still.status, JobStatus::Queued);
    assert_eq!(provider.calls(), 1);
}

#[tokio::test]
async fn permanent_provider_error_fails_without_pause() {
    let provider = Arc::new(FakeProvider::new(vec![Err(ProviderError::Failed {
        endpoint: "https://api.example".into(),
        status: Some(500),
        detail: "HTTP 500".into(),
    })]));
    let mut h = harness(provider).await;
    let id = h
        .db
        .add_job(&NewJob::for_test(h.provider_id, "x", "X"))
        .await
        .unwrap();

    assert!(matches!(
        h.scheduler.tick().await.unwrap(),
        TickOutcome::Failed { .. }
    ));
    assert_eq!(
        h.db.get_job(id).await.unwrap().unwrap().status,
        JobStatus::Failed
    );
    assert!(!h.db.is_provider_paused(h.provider_id).await.unwrap());
}

#[tokio::test]
async fn empty_resolution_fails_job() {
    let provider = Arc::new(FakeProvider::returning(&["  "]));
    let mut h = harness(provider).await;
    let id = h
        .db
        .add_job(&NewJob::for_test(h.provider_id, "x", "X"))
        .await
        .unwrap();

    let outcome = h.scheduler.tick().await.unwrap();
    assert_eq!(
        outcome,
        TickOutcome::Failed {
            job_id: id,
            reason: "provider returned no download URLs".into()
        }
    );
    assert!(h.daemon.enqueued().is_empty());
}

#[tokio::test]
async fn daemon_enqueue_failure_fails_job() {
    let provider = Arc::new(FakeProvider::returning(&["https://cdn.example/a.mkv"]));
    let mut h = harness(provider).await;
    h.daemon.push_enqueue(Err(rpc_failure("no space left")));
    let id = h
        .db
        .add_job(&NewJob::for_test(h.provider_id, "a", "A"))
        .await
        .unwrap();

    match h.scheduler.tick().await.unwrap() {
        TickOutcome::Failed { reason, .. } => {
            assert!(reason.starts_with("aria2 enqueue failed"), "{reason}");
            assert!(reason.contains("no space left"));
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    let job = h.db.get_job(id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.aria2_gid.is_none());
    let events = h.db.list_audit_events(id).await.unwrap();
    assert_eq!(events.last().unwrap().action, "job.failed");
    assert!(events.last().unwrap().payload["reason"]
        .as_str()
        .unwrap()
        .contains("aria2 enqueue failed"));
}

#[tokio::test]
async fn closed_admission_claims_nothing() {
    let provider = Arc::new(FakeProvider::returning(&["https://cdn.example/a.mkv"]));
    let mut h = harness(provider.clone()).await;
    let dir = tempfile::tempdir().unwrap();
    let cfg = MediadlConfig {
        min_free_space_bytes: 1_000,
        space_check_policy: SpaceCheckPolicy::FailOpen,
        ..test_config(dir.path())
    };
    let probe: SpaceProbe = Arc::new(|_: &Path| Some(10));
    h.scheduler
        .set_admission(AdmissionController::from_config(&cfg).with_probe(probe));
    let id = h
        .db
        .add_job(&NewJob::for_test(h.provider_id, "a", "A"))
        .await
        .unwrap();

    assert!(matches!(
        h.scheduler.tick().await.unwrap(),
        TickOutcome::Blocked(AdmissionBlocked::LowSpace { free: 10, .. })
    ));
    assert_eq!(
        h.db.get_job(id).await.unwrap().unwrap().status,
        JobStatus::Queued
    );
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn capacity_counts_running_downloads() {
    let provider = Arc::new(FakeProvider::returning(&["https://cdn.example/a.mkv"]));
    let mut h = harness(provider).await;
    for ext in ["a", "b", "c"] {
        h.db.add_job(&NewJob::for_test(h.provider_id, ext, ext))
            .await
            .unwrap();
    }
    assert!(matches!(h.scheduler.tick().await.unwrap(), TickOutcome::Enqueued { .. }));
    assert!(matches!(h.scheduler.tick().await.unwrap(), TickOutcome::Enqueued { .. }));
    assert_eq!(
        h.scheduler.tick().await.unwrap(),
        TickOutcome::Blocked(AdmissionBlocked::Capacity { active: 2, max: 2 })
    );
}

#[tokio::test]
async fn missing_provider_row_fails_job() {
    let mut h = harness(Arc::new(FakeProvider::returning(&["https://x/a.mkv"]))).await;
    let id = h
        .db
        .add_job(&NewJob::for_test(9_999, "a", "Orphan"))
        .await
        .unwrap();

    assert_eq!(
        h.scheduler.tick().await.unwrap(),
        TickOutcome::Failed {
            job_id: id,
            reason: "provider 9999 not found".into()
        }
    );
}

#[tokio::test]
async fn unsupported_provider_key_fails_job() {
    let mut h = harness(Arc::new(FakeProvider::returning(&["https://x/a.mkv"]))).await;
    let pid = h.db.add_provider("torrent", "Torrent", "{}").await.unwrap();
    let id = h
        .db
        .add_job(&NewJob::for_test(pid, "a", "A"))
        .await
        .unwrap();

    match h.scheduler.tick().await.unwrap() {
        TickOutcome::Failed { job_id, reason } => {
            assert_eq!(job_id, id);
            assert!(reason.contains("unsupported provider key"), "{reason}");
        }
        other => panic!("unexpected outcome {other:?}"),
    }
}

/// Cancels the job from inside `enqueue`, as an API request racing the
/// scheduler would.
struct CancelingDaemon {
    inner: FakeDaemon,
    db: JobDb,
    job_id: JobId,
    handle: tokio::runtime::Handle,
}

impl DownloadDaemon for CancelingDaemon {
    fn enqueue(&self, uris: &[String], options: &EnqueueOptions) -> Result<String, DaemonError> {
        self.handle
            .block_on(self.db.mark_canceled(self.job_id, "canceled by user"))
            .unwrap();
        self.inner.enqueue(uris, options)
    }

    fn query_status(&self, gid: &str, keys: Option<&[&str]>) -> Result<TransferStatus, DaemonError> {
        self.inner.query_status(gid, keys)
    }

    fn pause(&self, gid: &str) -> Result<String, DaemonError> {
        self.inner.pause(gid)
    }

    fn resume(&self, gid: &str) -> Result<String, DaemonError> {
        self.inner.resume(gid)
    }

    fn remove(&self, gid: &str, force: bool) -> Result<String, DaemonError> {
        self.inner.remove(gid, force)
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancel_during_enqueue_removes_new_transfer() {
    let mut h = harness(Arc::new(FakeProvider::returning(&["https://x/a.mkv"]))).await;
    let id = h
        .db
        .add_job(&NewJob::for_test(h.provider_id, "a", "A"))
        .await
        .unwrap();
    let daemon = Arc::new(CancelingDaemon {
        inner: FakeDaemon::new(),
        db: h.db.clone(),
        job_id: id,
        handle: tokio::runtime::Handle::current(),
    });
    h.scheduler.set_daemon(daemon.clone());

    assert_eq!(
        h.scheduler.tick().await.unwrap(),
        TickOutcome::Abandoned { job_id: id }
    );
    let job = h.db.get_job(id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Canceled);
    assert!(job.aria2_gid.is_none());
    assert_eq!(daemon.inner.removed(), vec![("G1".to_string(), true)]);
}

async fn exec(db: &JobDb, sql: &str) {
    sqlx::query(sql).execute(&db.pool).await.unwrap();
}

#[tokio::test]
async fn store_error_after_claim_requeues_job() {
    let provider = Arc::new(FakeProvider::new(vec![Err(ProviderError::RateLimited {
        endpoint: "https://api.example".into(),
        retry_after: Duration::from_secs(60),
    })]));
    let mut h = harness(provider.clone()).await;
    let id = h
        .db
        .add_job(&NewJob::for_test(h.provider_id, "tt-2", "Busy Movie"))
        .await
        .unwrap();
    exec(
        &h.db,
        "CREATE TRIGGER refuse_deferral BEFORE INSERT ON rate_limit_deferrals \
         BEGIN SELECT RAISE(FAIL, 'disk I/O error'); END",
    )
    .await;

    assert!(h.scheduler.tick().await.is_err());
    let job = h.db.get_job(id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Queued);
    assert_eq!(h.db.count_active().await.unwrap(), 0);

    exec(&h.db, "DROP TRIGGER refuse_deferral").await;
    assert_eq!(
        h.scheduler.tick().await.unwrap(),
        TickOutcome::Deferred {
            job_id: id,
            retry_after: Duration::from_secs(60)
        }
    );
    assert_eq!(provider.calls(), 2);
}

#[tokio::test]
async fn unrecorded_gid_is_removed_from_daemon() {
    let provider = Arc::new(FakeProvider::returning(&["https://cdn.example/v/a.mkv"]));
    let mut h = harness(provider).await;
    let id = h
        .db
        .add_job(&NewJob::for_test(h.provider_id, "a", "A"))
        .await
        .unwrap();
    exec(
        &h.db,
        "CREATE TRIGGER refuse_downloading BEFORE UPDATE ON jobs \
         WHEN NEW.status = 'downloading' \
         BEGIN SELECT RAISE(FAIL, 'disk I/O error'); END",
    )
    .await;

    assert!(h.scheduler.tick().await.is_err());
    assert_eq!(h.daemon.removed(), vec![("G1".to_string(), true)]);
    let job = h.db.get_job(id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Queued);
    assert!(job.aria2_gid.is_none());
}
