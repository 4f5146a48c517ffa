//! Library refresh notification after a successful placement.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use crate::config::JellyfinConfig;
use crate::http;

/// Fire-and-forget refresh hook. The worker logs failures and moves on.
pub trait LibraryNotifier: Send + Sync {
    fn refresh(&self) -> Result<()>;
}

/// Used when no media server is configured.
pub struct NoopNotifier;

impl LibraryNotifier for NoopNotifier {
    fn refresh(&self) -> Result<()> {
        Ok(())
    }
}

/// `POST <url>/Library/Refresh` with the API key in `X-Emby-Token`.
pub struct JellyfinNotifier {
    refresh_url: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl JellyfinNotifier {
    pub fn new(cfg: &JellyfinConfig) -> Self {
        Self {
            refresh_url: format!("{}/Library/Refresh", cfg.url.trim_end_matches('/')),
            api_key: cfg.api_key.clone().filter(|k| !k.trim().is_empty()),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn refresh_url(&self) -> &str {
        &self.refresh_url
    }
}

impl LibraryNotifier for JellyfinNotifier {
    fn refresh(&self) -> Result<()> {
        let headers: Vec<(&str, &str)> = match &self.api_key {
            Some(k) => vec![("X-Emby-Token", k.as_str())],
            None => Vec::new(),
        };
        let resp = http::post_json(&self.refresh_url, b"", &headers, self.timeout)
            .map_err(|e| anyhow::anyhow!("library refresh request failed: {e}"))?;
        if !resp.is_success() {
            anyhow::bail!(
                "library refresh returned HTTP {}: {}",
                resp.status,
                resp.preview(120)
            );
        }
        Ok(())
    }
}

/// Jellyfin when configured, otherwise a no-op.
pub fn notifier_from_config(cfg: Option<&JellyfinConfig>) -> Arc<dyn LibraryNotifier> {
    match cfg {
        Some(c) if !c.url.trim().is_empty() => Arc::new(JellyfinNotifier::new(c)),
        _ => Arc::new(NoopNotifier),
    }
}
