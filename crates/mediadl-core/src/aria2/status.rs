//! `aria2.tellStatus` result parsing.
//!
//! aria2 encodes every number as a decimal string (`"completedLength":"50"`);
//! plain JSON numbers are accepted too.

use serde_json::Value;

/// Keys requested when polling a transfer.
pub const POLL_KEYS: &[&str] = &[
    "gid",
    "status",
    "totalLength",
    "completedLength",
    "downloadSpeed",
    "errorCode",
    "errorMessage",
    "dir",
    "files",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonState {
    Waiting,
    Active,
    Paused,
    Error,
    Complete,
    Removed,
    Unknown,
}

impl DaemonState {
    pub fn parse(s: &str) -> Self {
        match s {
            "waiting" => DaemonState::Waiting,
            "active" => DaemonState::Active,
            "paused" => DaemonState::Paused,
            "error" => DaemonState::Error,
            "complete" => DaemonState::Complete,
            "removed" => DaemonState::Removed,
            _ => DaemonState::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransferFile {
    pub path: String,
    pub length: Option<u64>,
    pub completed_length: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransferStatus {
    pub gid: Option<String>,
    pub state: DaemonState,
    pub completed_length: Option<u64>,
    pub total_length: Option<u64>,
    pub download_speed: Option<u64>,
    pub files: Vec<TransferFile>,
    pub dir: Option<String>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
}

impl TransferStatus {
    pub fn from_json(v: &Value) -> Result<Self, String> {
        let obj = v
            .as_object()
            .ok_or_else(|| "status result is not an object".to_string())?;
        let state = obj
            .get("status")
            .and_then(Value::as_str)
            .map(DaemonState::parse)
            .unwrap_or(DaemonState::Unknown);
        let files = obj
            .get("files")
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(|f| {
                        let path = f.get("path").and_then(Value::as_str)?;
                        Some(TransferFile {
                            path: path.to_string(),
                            length: num(f.get("length")),
                            completed_length: num(f.get("completedLength")),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(TransferStatus {
            gid: text(obj.get("gid")),
            state,
            completed_length: num(obj.get("completedLength")),
            total_length: num(obj.get("totalLength")),
            download_speed: num(obj.get("downloadSpeed")),
            files,
            dir: text(obj.get("dir")),
            error_code: text(obj.get("errorCode")),
            error_message: text(obj.get("errorMessage")),
        })
    }

    /// First file with a non-empty path. aria2 reports `""` for files whose
    /// name is not known yet.
    pub fn first_file_path(&self) -> Option<&str> {
        self.files
            .iter()
            .map(|f| f.path.as_str())
            .find(|p| !p.is_empty())
    }
}

fn num(v: Option<&Value>) -> Option<u64> {
    match v? {
        Value::String(s) => s.trim().parse().ok(),
        Value::Number(n) => n.as_u64(),
        _ => None,
    }
}

fn text(v: Option<&Value>) -> Option<String> {
    match v? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
