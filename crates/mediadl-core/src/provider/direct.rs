//! `direct`: the external id is already a download URL.
//!
//! Optional config `{"base_url": "https://host/files/"}` lets ids be relative
//! paths joined onto the base.

use serde::Deserialize;
use url::Url;

use super::error::ProviderError;
use super::registry::ProviderKind;
use super::{ResolverProvider, SearchResult};

#[derive(Debug, Default, Deserialize)]
struct DirectConfig {
    #[serde(default)]
    base_url: Option<String>,
}

pub struct DirectProvider {
    base: Option<Url>,
}

impl DirectProvider {
    pub fn from_config(config: &serde_json::Value) -> Result<Self, ProviderError> {
        let cfg: DirectConfig = if config.is_null() {
            DirectConfig::default()
        } else {
            serde_json::from_value(config.clone()).map_err(|e| ProviderError::Config {
                key: ProviderKind::Direct.key().to_string(),
                detail: e.to_string(),
            })?
        };
        let base = cfg
            .base_url
            .as_deref()
            .map(Url::parse)
            .transpose()
            .map_err(|e| ProviderError::Config {
                key: ProviderKind::Direct.key().to_string(),
                detail: format!("base_url: {e}"),
            })?;
        Ok(Self { base })
    }

    fn to_url(&self, id: &str) -> Option<Url> {
        let id = id.trim();
        if id.is_empty() {
            return None;
        }
        let url = match Url::parse(id) {
            Ok(u) => u,
            Err(_) => self.base.as_ref()?.join(id).ok()?,
        };
        matches!(url.scheme(), "http" | "https" | "ftp").then_some(url)
    }
}

impl ResolverProvider for DirectProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Direct
    }

    /// A query that is itself a usable URL yields one hit; anything else yields none.
    fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>, ProviderError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        Ok(self
            .to_url(query)
            .map(|url| {
                let title = url
                    .path_segments()
                    .and_then(|mut s| s.next_back())
                    .filter(|s| !s.is_empty())
                    .unwrap_or(url.as_str())
                    .to_string();
                SearchResult {
                    external_id: query.trim().to_string(),
                    title,
                    size_bytes: None,
                    url: Some(url.to_string()),
                }
            })
            .into_iter()
            .collect())
    }

    fn resolve_download_url(&self, external_id: &str) -> Result<Vec<String>, ProviderError> {
        self.to_url(external_id)
            .map(|u| vec![u.to_string()])
            .ok_or_else(|| {
                ProviderError::failed("direct", format!("not a downloadable URL: {external_id}"))
            })
    }
}
