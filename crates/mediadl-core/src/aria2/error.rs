//! Typed failures at the daemon boundary.

use super::classify::{message_signals_lost_reference, TransportKind};

/// RPC error code aria2 uses for generic request failures, including unknown GIDs.
pub const ARIA2_GENERIC_ERROR: i64 = 1;

#[derive(Debug, Clone, thiserror::Error)]
pub enum DaemonError {
    /// Caller error; never sent to the daemon.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("{method}: transport error: {message}")]
    Transport {
        method: String,
        kind: TransportKind,
        message: String,
    },

    /// Non-2xx response without a JSON-RPC error object.
    #[error("{method}: HTTP {status}: {preview}")]
    Http {
        method: String,
        status: u32,
        preview: String,
    },

    /// JSON-RPC error object in the response.
    #[error("{method}: RPC error {code}: {message}")]
    Rpc {
        method: String,
        code: i64,
        message: String,
        http_status: u32,
    },

    #[error("{method}: malformed response: {detail}")]
    Malformed { method: String, detail: String },
}

impl DaemonError {
    /// The daemon no longer knows the handle (typically after a daemon restart).
    ///
    /// Matches an RPC error with code 1 and aria2's not-found / invalid-GID
    /// wording, or an HTTP 404/400 whose body carries the same wording.
    pub fn is_lost_reference(&self) -> bool {
        match self {
            DaemonError::Rpc { code, message, .. } => {
                *code == ARIA2_GENERIC_ERROR && message_signals_lost_reference(message)
            }
            DaemonError::Http {
                status, preview, ..
            } => matches!(status, 400 | 404) && message_signals_lost_reference(preview),
            _ => false,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            DaemonError::Transport {
                kind: TransportKind::Timeout,
                ..
            }
        )
    }

    pub(crate) fn transport(method: &str, e: &curl::Error) -> Self {
        DaemonError::Transport {
            method: method.to_string(),
            kind: super::classify::classify_curl_error(e),
            message: e.to_string(),
        }
    }
}
