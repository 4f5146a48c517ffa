//! aria2 JSON-RPC client.
//!
//! Every call is an HTTP POST of a JSON-RPC 2.0 request to the daemon's
//! `/jsonrpc` endpoint, with the shared secret as `token:<secret>` in the
//! first parameter position. Calls are blocking and bounded by the request
//! timeout (the version probe uses the shorter health timeout); async callers
//! go through `spawn_blocking`.

pub mod classify;
pub mod error;
pub mod secret;
pub mod status;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde_json::{json, Value};

use crate::config::Aria2Config;
use crate::http::{self, HttpResponse};

pub use error::DaemonError;
pub use status::{DaemonState, TransferFile, TransferStatus, POLL_KEYS};

/// Per-transfer aria2 options (`dir`, `out`, ...).
pub type EnqueueOptions = BTreeMap<String, String>;

/// Operations the scheduler and worker need from the download daemon.
pub trait DownloadDaemon: Send + Sync {
    /// Queue a transfer. Returns the daemon-assigned GID.
    fn enqueue(&self, uris: &[String], options: &EnqueueOptions) -> Result<String, DaemonError>;

    /// Status of a transfer. `keys` limits the returned fields.
    fn query_status(&self, gid: &str, keys: Option<&[&str]>)
        -> Result<TransferStatus, DaemonError>;

    fn pause(&self, gid: &str) -> Result<String, DaemonError>;

    fn resume(&self, gid: &str) -> Result<String, DaemonError>;

    /// Remove a transfer; `force` skips aria2's graceful shutdown of connections.
    fn remove(&self, gid: &str, force: bool) -> Result<String, DaemonError>;
}

const PREVIEW_CHARS: usize = 200;

pub struct Aria2Client {
    rpc_url: String,
    secret: Option<String>,
    request_timeout: Duration,
    health_timeout: Duration,
    next_id: AtomicU64,
}

impl Aria2Client {
    pub fn new(rpc_url: impl Into<String>, secret: Option<String>) -> Self {
        Self {
            rpc_url: rpc_url.into(),
            secret,
            request_timeout: Duration::from_secs(15),
            health_timeout: Duration::from_secs(5),
            next_id: AtomicU64::new(1),
        }
    }

    /// Build from configuration. `secret_override` (e.g. a CLI flag) beats
    /// every other source; see [`secret::resolve_secret`].
    pub fn from_config(cfg: &Aria2Config, secret_override: Option<&str>) -> Self {
        let secret = secret::resolve_secret_from_env(secret_override, cfg.secret.as_deref());
        Self::new(cfg.rpc_url.clone(), secret).with_timeouts(
            Duration::from_secs(cfg.request_timeout_secs.max(1)),
            Duration::from_secs(cfg.health_timeout_secs.max(1)),
        )
    }

    pub fn with_timeouts(mut self, request: Duration, health: Duration) -> Self {
        self.request_timeout = request;
        self.health_timeout = health;
        self
    }

    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    /// Daemon version string (`aria2.getVersion`), used as a health probe.
    pub fn version(&self) -> Result<String, DaemonError> {
        let method = "aria2.getVersion";
        let result = self.call(method, Vec::new(), self.health_timeout)?;
        result
            .get("version")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| DaemonError::Malformed {
                method: method.to_string(),
                detail: "missing version".to_string(),
            })
    }

    fn request_body(&self, method: &str, params: Vec<Value>) -> Value {
        let mut all = Vec::with_capacity(params.len() + 1);
        if let Some(s) = &self.secret {
            all.push(Value::String(format!("token:{s}")));
        }
        all.extend(params);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        json!({
            "jsonrpc": "2.0",
            "id": format!("mediadl-{id}"),
            "method": method,
            "params": all,
        })
    }

    fn call(&self, method: &str, params: Vec<Value>, timeout: Duration) -> Result<Value, DaemonError> {
        let body = self.request_body(method, params);
        let bytes = serde_json::to_vec(&body).map_err(|e| DaemonError::Malformed {
            method: method.to_string(),
            detail: format!("encode request: {e}"),
        })?;
        let resp = http::post_json(&self.rpc_url, &bytes, &[], timeout)
            .map_err(|e| DaemonError::transport(method, &e))?;
        parse_response(method, &resp)
    }

    fn call_gid(&self, method: &str, gid: &str) -> Result<String, DaemonError> {
        let result = self.call(method, vec![json!(gid)], self.request_timeout)?;
        expect_gid(method, result)
    }
}

/// Decode a JSON-RPC response. An error object wins over the HTTP status,
/// since aria2 answers RPC errors with a 4xx status and a JSON body.
fn parse_response(method: &str, resp: &HttpResponse) -> Result<Value, DaemonError> {
    let status = resp.status;
    let parsed: Option<Value> = serde_json::from_slice(&resp.body).ok();
    if let Some(err) = parsed.as_ref().and_then(|v| v.get("error")) {
        return Err(DaemonError::Rpc {
            method: method.to_string(),
            code: err.get("code").and_then(Value::as_i64).unwrap_or(0),
            message: err
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            http_status: status,
        });
    }
    if !resp.is_success() {
        return Err(DaemonError::Http {
            method: method.to_string(),
            status,
            preview: resp.preview(PREVIEW_CHARS),
        });
    }
    match parsed {
        None => Err(DaemonError::Malformed {
            method: method.to_string(),
            detail: "response is not JSON".to_string(),
        }),
        Some(mut v) => v
            .get_mut("result")
            .map(Value::take)
            .ok_or_else(|| DaemonError::Malformed {
                method: method.to_string(),
                detail: "missing result".to_string(),
            }),
    }
}

fn expect_gid(method: &str, result: Value) -> Result<String, DaemonError> {
    match result {
        Value::String(gid) if !gid.is_empty() => Ok(gid),
        other => Err(DaemonError::Malformed {
            method: method.to_string(),
            detail: format!("expected GID string, got {other}"),
        }),
    }
}

impl DownloadDaemon for Aria2Client {
    fn enqueue(&self, uris: &[String], options: &EnqueueOptions) -> Result<String, DaemonError> {
        let uris: Vec<&str> = uris
            .iter()
            .map(|u| u.trim())
            .filter(|u| !u.is_empty())
            .collect();
        if uris.is_empty() {
            return Err(DaemonError::InvalidInput(
                "at least one non-blank URI is required".to_string(),
            ));
        }
        let method = "aria2.addUri";
        let result = self.call(
            method,
            vec![json!(uris), json!(options)],
            self.request_timeout,
        )?;
        expect_gid(method, result)
    }

    fn query_status(
        &self,
        gid: &str,
        keys: Option<&[&str]>,
    ) -> Result<TransferStatus, DaemonError> {
        let method = "aria2.tellStatus";
        let mut params = vec![json!(gid)];
        if let Some(keys) = keys {
            params.push(json!(keys));
        }
        let result = self.call(method, params, self.request_timeout)?;
        TransferStatus::from_json(&result).map_err(|detail| DaemonError::Malformed {
            method: method.to_string(),
            detail,
        })
    }

    fn pause(&self, gid: &str) -> Result<String, DaemonError> {
        self.call_gid("aria2.pause", gid)
    }

    fn resume(&self, gid: &str) -> Result<String, DaemonError> {
        self.call_gid("aria2.unpause", gid)
    }

    fn remove(&self, gid: &str, force: bool) -> Result<String, DaemonError> {
        let method = if force {
            "aria2.forceRemove"
        } else {
            "aria2.remove"
        };
        self.call_gid(method, gid)
    }
}
