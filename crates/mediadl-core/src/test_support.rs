//! In-process fakes for the daemon, provider, and notifier seams.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::aria2::{
    DaemonError, DaemonState, DownloadDaemon, EnqueueOptions, TransferFile, TransferStatus,
};
use crate::library::LibraryNotifier;
use crate::provider::{ProviderError, ProviderKind, ResolverProvider, SearchResult};

#[derive(Default)]
struct FakeDaemonLog {
    enqueue_results: VecDeque<Result<String, DaemonError>>,
    enqueued: Vec<(Vec<String>, EnqueueOptions)>,
    statuses: HashMap<String, Result<TransferStatus, DaemonError>>,
    removed: Vec<(String, bool)>,
    status_queries: usize,
    next_gid: u32,
}

/// Scripted download daemon. Unscripted enqueues succeed with `G<n>`.
#[derive(Default)]
pub(crate) struct FakeDaemon {
    state: Mutex<FakeDaemonLog>,
}

impl FakeDaemon {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push_enqueue(&self, result: Result<String, DaemonError>) {
        self.state.lock().unwrap().enqueue_results.push_back(result);
    }

    pub(crate) fn set_status(&self, gid: &str, result: Result<TransferStatus, DaemonError>) {
        self.state
            .lock()
            .unwrap()
            .statuses
            .insert(gid.to_string(), result);
    }

    pub(crate) fn enqueued(&self) -> Vec<(Vec<String>, EnqueueOptions)> {
        self.state.lock().unwrap().enqueued.clone()
    }

    pub(crate) fn removed(&self) -> Vec<(String, bool)> {
        self.state.lock().unwrap().removed.clone()
    }

    pub(crate) fn status_queries(&self) -> usize {
        self.state.lock().unwrap().status_queries
    }
}

impl DownloadDaemon for FakeDaemon {
    fn enqueue(&self, uris: &[String], options: &EnqueueOptions) -> Result<String, DaemonError> {
        if uris.iter().all(|u| u.trim().is_empty()) {
            return Err(DaemonError::InvalidInput("no URIs".into()));
        }
        let mut st = self.state.lock().unwrap();
        st.enqueued.push((uris.to_vec(), options.clone()));
        match st.enqueue_results.pop_front() {
            Some(r) => r,
            None => {
                st.next_gid += 1;
                Ok(format!("G{}", st.next_gid))
            }
        }
    }

    fn query_status(
        &self,
        gid: &str,
        _keys: Option<&[&str]>,
    ) -> Result<TransferStatus, DaemonError> {
        let mut st = self.state.lock().unwrap();
        st.status_queries += 1;
        st.statuses
            .get(gid)
            .cloned()
            .unwrap_or_else(|| Err(lost_reference(gid)))
    }

    fn pause(&self, gid: &str) -> Result<String, DaemonError> {
        Ok(gid.to_string())
    }

    fn resume(&self, gid: &str) -> Result<String, DaemonError> {
        Ok(gid.to_string())
    }

    fn remove(&self, gid: &str, force: bool) -> Result<String, DaemonError> {
        self.state
            .lock()
            .unwrap()
            .removed
            .push((gid.to_string(), force));
        Ok(gid.to_string())
    }
}

pub(crate) fn lost_reference(gid: &str) -> DaemonError {
    DaemonError::Rpc {
        method: "aria2.tellStatus".into(),
        code: 1,
        message: format!("GID {gid} is not found"),
        http_status: 400,
    }
}

pub(crate) fn rpc_failure(message: &str) -> DaemonError {
    DaemonError::Rpc {
        method: "aria2.addUri".into(),
        code: 1,
        message: message.into(),
        http_status: 400,
    }
}

pub(crate) fn transfer(
    state: DaemonState,
    completed: Option<u64>,
    total: Option<u64>,
    speed: Option<u64>,
    files: &[&str],
) -> TransferStatus {
    TransferStatus {
        gid: None,
        state,
        completed_length: completed,
        total_length: total,
        download_speed: speed,
        files: files
            .iter()
            .map(|p| TransferFile {
                path: p.to_string(),
                length: total,
                completed_length: completed,
            })
            .collect(),
        dir: None,
        error_code: None,
        error_message: None,
    }
}

/// Provider whose resolve results are scripted in order; the last one repeats.
pub(crate) struct FakeProvider {
    results: Mutex<VecDeque<Result<Vec<String>, ProviderError>>>,
    calls: AtomicUsize,
}

impl FakeProvider {
    pub(crate) fn new(results: Vec<Result<Vec<String>, ProviderError>>) -> Self {
        Self {
            results: Mutex::new(results.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn returning(uris: &[&str]) -> Self {
        Self::new(vec![Ok(uris.iter().map(|s| s.to_string()).collect())])
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ResolverProvider for FakeProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Direct
    }

    fn search(&self, _query: &str, _limit: usize) -> Result<Vec<SearchResult>, ProviderError> {
        Ok(Vec::new())
    }

    fn resolve_download_url(&self, _external_id: &str) -> Result<Vec<String>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut results = self.results.lock().unwrap();
        if results.len() > 1 {
            results.pop_front().unwrap()
        } else {
            results
                .front()
                .cloned()
                .unwrap_or_else(|| Err(ProviderError::failed("fake", "no script")))
        }
    }
}

#[derive(Default)]
pub(crate) struct CountingNotifier {
    pub(crate) calls: AtomicUsize,
    pub(crate) fail: bool,
}

impl LibraryNotifier for CountingNotifier {
    fn refresh(&self) -> anyhow::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            anyhow::bail!("media server unreachable");
        }
        Ok(())
    }
}
