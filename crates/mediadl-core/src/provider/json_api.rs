//! `json_api`: a file host exposing a small JSON HTTP API.
//!
//! Endpoints, relative to `base_url`:
//! - `GET search?q=<query>&limit=<n>` -> `[{"id", "title", "size"?, "url"?}]`
//! - `GET items/<id>/download` -> `{"urls": [...]}` or `{"url": "..."}`
//!
//! Config: `{"base_url": "...", "api_key": "...", "timeout_secs": 15}`. The
//! API key is sent as `X-Api-Key`. HTTP 429 maps to a rate-limit deferral
//! honouring `Retry-After`; 404 maps to `NotFound`.

use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::http::{self, HttpResponse};

use super::error::ProviderError;
use super::registry::ProviderKind;
use super::{ResolverProvider, SearchResult};

/// Used when a 429 carries no usable `Retry-After`.
pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(60);

const PREVIEW_CHARS: usize = 160;

#[derive(Debug, Deserialize)]
struct JsonApiConfig {
    base_url: String,
    #[serde(default)]
    api_key: Option<String>,
    #[serde(default = "default_timeout_secs")]
    timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    15
}

pub struct JsonApiProvider {
    base: Url,
    api_key: Option<String>,
    timeout: Duration,
}

impl JsonApiProvider {
    pub fn from_config(config: &Value) -> Result<Self, ProviderError> {
        let key = ProviderKind::JsonApi.key();
        let cfg: JsonApiConfig =
            serde_json::from_value(config.clone()).map_err(|e| ProviderError::Config {
                key: key.to_string(),
                detail: e.to_string(),
            })?;
        let mut base = Url::parse(&cfg.base_url).map_err(|e| ProviderError::Config {
            key: key.to_string(),
            detail: format!("base_url: {e}"),
        })?;
        // Url::join drops the last segment unless the base ends in '/'.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self {
            base,
            api_key: cfg.api_key.filter(|k| !k.trim().is_empty()),
            timeout: Duration::from_secs(cfg.timeout_secs.max(1)),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ProviderError> {
        self.base
            .join(path)
            .map_err(|e| ProviderError::failed(self.base.as_str(), format!("bad endpoint {path}: {e}")))
    }

    fn get_json(&self, url: &Url) -> Result<Value, ProviderError> {
        let endpoint = url.as_str();
        let headers: Vec<(&str, &str)> = match &self.api_key {
            Some(k) => vec![("X-Api-Key", k.as_str()), ("Accept", "application/json")],
            None => vec![("Accept", "application/json")],
        };
        let resp = http::get(endpoint, &headers, self.timeout)
            .map_err(|e| ProviderError::failed(endpoint, format!("request failed: {e}")))?;
        check_status(endpoint, &resp)?;
        serde_json::from_slice(&resp.body)
            .map_err(|e| ProviderError::failed(endpoint, format!("invalid JSON: {e}")))
    }
}

/// Map a non-2xx response onto the provider error taxonomy.
fn check_status(endpoint: &str, resp: &HttpResponse) -> Result<(), ProviderError> {
    match resp.status {
        s if (200..300).contains(&s) => Ok(()),
        429 => Err(ProviderError::RateLimited {
            endpoint: endpoint.to_string(),
            retry_after: resp
                .header("Retry-After")
                .and_then(parse_retry_after)
                .unwrap_or(DEFAULT_RETRY_AFTER),
        }),
        404 => Err(ProviderError::NotFound {
            endpoint: endpoint.to_string(),
            detail: resp.preview(PREVIEW_CHARS),
        }),
        status => Err(ProviderError::Failed {
            endpoint: endpoint.to_string(),
            status: Some(status),
            detail: format!("HTTP {status}: {}", resp.preview(PREVIEW_CHARS)),
        }),
    }
}

/// `Retry-After` in delta-seconds form. HTTP-date values fall back to the default.
fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

fn parse_search_results(v: &Value, limit: usize) -> Vec<SearchResult> {
    let items = v
        .as_array()
        .or_else(|| v.get("results").and_then(Value::as_array));
    items
        .into_iter()
        .flatten()
        .filter_map(|item| {
            let id = match item.get("id")? {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                _ => return None,
            };
            Some(SearchResult {
                title: item
                    .get("title")
                    .and_then(Value::as_str)
                    .unwrap_or(&id)
                    .to_string(),
                external_id: id,
                size_bytes: item.get("size").and_then(Value::as_u64),
                url: item.get("url").and_then(Value::as_str).map(str::to_string),
            })
        })
        .take(limit)
        .collect()
}

fn parse_download_urls(v: &Value) -> Vec<String> {
    let mut out: Vec<String> = v
        .get("urls")
        .and_then(Value::as_array)
        .map(|a| a.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default();
    if let Some(u) = v.get("url").and_then(Value::as_str) {
        out.push(u.to_string());
    }
    out.retain(|u| !u.trim().is_empty());
    out
}

impl ResolverProvider for JsonApiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::JsonApi
    }

    fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>, ProviderError> {
        if limit == 0 || query.trim().is_empty() {
            return Ok(Vec::new());
        }
        let mut url = self.endpoint("search")?;
        url.query_pairs_mut()
            .append_pair("q", query.trim())
            .append_pair("limit", &limit.to_string());
        let v = self.get_json(&url)?;
        Ok(parse_search_results(&v, limit))
    }

    fn resolve_download_url(&self, external_id: &str) -> Result<Vec<String>, ProviderError> {
        let id = external_id.trim();
        if id.is_empty() {
            return Err(ProviderError::failed(self.base.as_str(), "empty external id"));
        }
        let mut url = self.endpoint("items/")?;
        url.path_segments_mut()
            .map_err(|_| ProviderError::failed(self.base.as_str(), "base URL cannot hold a path"))?
            .pop_if_empty()
            .push(id)
            .push("download");
        let v = self.get_json(&url)?;
        let uris = parse_download_urls(&v);
        if uris.is_empty() {
            return Err(ProviderError::failed(url.as_str(), "no download URLs in response"));
        }
        Ok(uris)
    }
}
