use std::collections::HashMap;
use std::sync::Arc;

use crate::job_db::{ProviderId, ProviderRecord};

use super::direct::DirectProvider;
use super::error::ProviderError;
use super::json_api::JsonApiProvider;
use super::ResolverProvider;

/// Closed set of provider implementations, selected by the provider row's `key`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    Direct,
    JsonApi,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 2] = [ProviderKind::Direct, ProviderKind::JsonApi];

    pub fn key(self) -> &'static str {
        match self {
            ProviderKind::Direct => "direct",
            ProviderKind::JsonApi => "json_api",
        }
    }

    pub fn from_key(key: &str) -> Result<Self, ProviderError> {
        ProviderKind::ALL
            .into_iter()
            .find(|k| k.key() == key.trim())
            .ok_or_else(|| ProviderError::Unsupported(key.to_string()))
    }

    /// Build an instance from plaintext JSON configuration.
    pub fn build(self, config_json: &str) -> Result<Arc<dyn ResolverProvider>, ProviderError> {
        let config: serde_json::Value = if config_json.trim().is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_str(config_json).map_err(|e| ProviderError::Config {
                key: self.key().to_string(),
                detail: format!("config is not valid JSON: {e}"),
            })?
        };
        Ok(match self {
            ProviderKind::Direct => Arc::new(DirectProvider::from_config(&config)?),
            ProviderKind::JsonApi => Arc::new(JsonApiProvider::from_config(&config)?),
        })
    }
}

struct CachedProvider {
    key: String,
    config_json: String,
    provider: Arc<dyn ResolverProvider>,
}

/// Resolved providers keyed by row id.
///
/// Each row is turned into an instance once; the entry is rebuilt only when
/// the row's key or configuration changes.
#[derive(Default)]
pub struct ProviderRegistry {
    cache: HashMap<ProviderId, CachedProvider>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolver_for(
        &mut self,
        record: &ProviderRecord,
    ) -> Result<Arc<dyn ResolverProvider>, ProviderError> {
        if let Some(c) = self.cache.get(&record.id) {
            if c.key == record.key && c.config_json == record.config_json {
                return Ok(Arc::clone(&c.provider));
            }
        }
        let provider = ProviderKind::from_key(&record.key)?.build(&record.config_json)?;
        tracing::debug!(provider = %record.key, provider_id = record.id, "provider instance built");
        self.cache.insert(
            record.id,
            CachedProvider {
                key: record.key.clone(),
                config_json: record.config_json.clone(),
                provider: Arc::clone(&provider),
            },
        );
        Ok(provider)
    }

    /// Seed the cache with a ready instance for `record`, bypassing the key
    /// lookup. It is used until the row's key or configuration changes.
    pub fn insert_instance(&mut self, record: &ProviderRecord, provider: Arc<dyn ResolverProvider>) {
        self.cache.insert(
            record.id,
            CachedProvider {
                key: record.key.clone(),
                config_json: record.config_json.clone(),
                provider,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}
