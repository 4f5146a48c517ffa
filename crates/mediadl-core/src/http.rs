//! Minimal blocking HTTP over libcurl.
//!
//! Shared by the aria2 JSON-RPC client, the HTTP-backed resolver providers,
//! and the Jellyfin refresh notifier. Every call has a bounded timeout.
//! Runs in the current thread; call from `spawn_blocking` if used from async code.

use std::str;
use std::time::Duration;

/// Status, header lines (all blocks when redirects were followed), and body.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u32,
    pub headers: Vec<String>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Value of the last header named `name` (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter().rev().find_map(|line| {
            let (k, v) = line.split_once(':')?;
            k.trim().eq_ignore_ascii_case(name).then(|| v.trim())
        })
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// First `max` characters of the body, for error messages.
    pub fn preview(&self, max: usize) -> String {
        let text = self.body_text();
        let text = text.trim();
        match text.char_indices().nth(max) {
            Some((idx, _)) => format!("{}...", &text[..idx]),
            None => text.to_string(),
        }
    }
}

pub fn get(
    url: &str,
    headers: &[(&str, &str)],
    timeout: Duration,
) -> Result<HttpResponse, curl::Error> {
    perform(url, None, headers, timeout)
}

/// POST `body` with `Content-Type: application/json`.
pub fn post_json(
    url: &str,
    body: &[u8],
    headers: &[(&str, &str)],
    timeout: Duration,
) -> Result<HttpResponse, curl::Error> {
    let mut all: Vec<(&str, &str)> = vec![("Content-Type", "application/json")];
    all.extend_from_slice(headers);
    perform(url, Some(body), &all, timeout)
}

fn perform(
    url: &str,
    body: Option<&[u8]>,
    headers: &[(&str, &str)],
    timeout: Duration,
) -> Result<HttpResponse, curl::Error> {
    let mut header_lines: Vec<String> = Vec::new();
    let mut buf: Vec<u8> = Vec::new();

    let mut easy = curl::easy::Easy::new();
    easy.url(url)?;
    easy.follow_location(true)?;
    easy.connect_timeout(timeout.min(Duration::from_secs(10)))?;
    easy.timeout(timeout)?;

    if let Some(body) = body {
        easy.post(true)?;
        easy.post_fields_copy(body)?;
    }

    let mut list = curl::easy::List::new();
    for (k, v) in headers {
        list.append(&format!("{}: {}", k.trim(), v.trim()))?;
    }
    if !headers.is_empty() {
        easy.http_headers(list)?;
    }

    {
        let mut transfer = easy.transfer();
        transfer.header_function(|data| {
            if let Ok(s) = str::from_utf8(data) {
                let line = s.trim_end();
                if !line.is_empty() {
                    header_lines.push(line.to_string());
                }
            }
            true
        })?;
        transfer.write_function(|data| {
            buf.extend_from_slice(data);
            Ok(data.len())
        })?;
        transfer.perform()?;
    }

    let status = easy.response_code()?;
    Ok(HttpResponse {
        status,
        headers: header_lines,
        body: buf,
    })
}
