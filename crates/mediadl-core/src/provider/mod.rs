//! Resolver providers: turn a provider-native identifier into download URIs.
//!
//! The orchestration engine only depends on [`ResolverProvider`]. Concrete
//! providers are chosen by the provider row's `key` through the closed
//! [`ProviderKind`] set in `registry`.

mod direct;
mod error;
mod json_api;
mod registry;

use serde::Serialize;

pub use direct::DirectProvider;
pub use error::ProviderError;
pub use json_api::JsonApiProvider;
pub use registry::{ProviderKind, ProviderRegistry};

/// One search hit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub external_id: String,
    pub title: String,
    pub size_bytes: Option<u64>,
    /// Page or direct URL for display, when the provider has one.
    pub url: Option<String>,
}

/// Contract implemented per upstream source.
///
/// Calls are blocking and network-bound; async callers use `spawn_blocking`.
pub trait ResolverProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>, ProviderError>;

    /// One or more direct URIs for `external_id`, best first.
    fn resolve_download_url(&self, external_id: &str) -> Result<Vec<String>, ProviderError>;
}
