//! Minimal aria2 JSON-RPC endpoint for integration tests.
//!
//! Accepts HTTP/1.1 POSTs, decodes the JSON-RPC request, records it, and
//! answers with whatever the test's handler returns.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use serde_json::{json, Value};

pub struct Reply {
    pub status: u16,
    pub body: String,
}

impl Reply {
    pub fn result(request: &Value, result: Value) -> Self {
        Self {
            status: 200,
            body: json!({ "jsonrpc": "2.0", "id": request["id"], "result": result }).to_string(),
        }
    }

    /// aria2 answers RPC errors with HTTP 400 and an error object.
    pub fn rpc_error(request: &Value, code: i64, message: &str) -> Self {
        Self {
            status: 400,
            body: json!({
                "jsonrpc": "2.0",
                "id": request["id"],
                "error": { "code": code, "message": message }
            })
            .to_string(),
        }
    }

    pub fn raw(status: u16, body: &str) -> Self {
        Self {
            status,
            body: body.to_string(),
        }
    }
}

pub struct FakeAria2 {
    pub url: String,
    requests: Arc<Mutex<Vec<Value>>>,
}

impl FakeAria2 {
    /// Decoded request bodies, in arrival order.
    pub fn requests(&self) -> Vec<Value> {
        self.requests.lock().unwrap().clone()
    }
}

/// Start a server on an ephemeral port. It runs until the process exits.
pub fn start<F>(handler: F) -> FakeAria2
where
    F: Fn(&Value) -> Reply + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let handler = Arc::new(handler);
    let log = Arc::clone(&requests);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let handler = Arc::clone(&handler);
            let log = Arc::clone(&log);
            thread::spawn(move || handle(stream, handler.as_ref(), &log));
        }
    });
    FakeAria2 {
        url: format!("http://127.0.0.1:{port}/jsonrpc"),
        requests,
    }
}

fn handle<F>(mut stream: TcpStream, handler: &F, log: &Mutex<Vec<Value>>)
where
    F: Fn(&Value) -> Reply,
{
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(2)));
    let Some(body) = read_body(&mut stream) else {
        return;
    };
    let reply = match serde_json::from_slice::<Value>(&body) {
        Ok(request) => {
            log.lock().unwrap().push(request.clone());
            handler(&request)
        }
        Err(_) => Reply::raw(400, "not json"),
    };
    let response = format!(
        "HTTP/1.1 {} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        reply.status,
        reply.body.len(),
        reply.body
    );
    let _ = stream.write_all(response.as_bytes());
}

/// Read headers, answer `Expect: 100-continue`, then read Content-Length bytes.
fn read_body(stream: &mut TcpStream) -> Option<Vec<u8>> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        if let Some(pos) = find(&buf, b"\r\n\r\n") {
            break pos + 4;
        }
        let n = stream.read(&mut chunk).ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    };
    let head = String::from_utf8_lossy(&buf[..header_end]).to_ascii_lowercase();
    let length: usize = head
        .lines()
        .find_map(|l| l.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(0);
    if head.contains("expect: 100-continue") {
        let _ = stream.write_all(b"HTTP/1.1 100 Continue\r\n\r\n");
    }
    let mut body = buf[header_end..].to_vec();
    while body.len() < length {
        let n = stream.read(&mut chunk).ok()?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }
    Some(body)
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}
