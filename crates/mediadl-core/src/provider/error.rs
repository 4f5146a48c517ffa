use std::time::Duration;

/// Outcome classes a resolver provider can report.
///
/// The scheduler acts on the variant, never on the message: `RateLimited`
/// requeues the job and defers the identifier, `NotFound` fails the job and
/// pauses the provider, everything else fails the job.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderError {
    #[error("unsupported provider key: {0}")]
    Unsupported(String),

    #[error("invalid configuration for provider {key}: {detail}")]
    Config { key: String, detail: String },

    /// Permanent upstream failure.
    #[error("{endpoint}: {detail}")]
    Failed {
        endpoint: String,
        status: Option<u32>,
        detail: String,
    },

    /// Transient; retry this identifier no sooner than `retry_after`.
    #[error("rate limited by {endpoint}, retry after {}s", retry_after.as_secs())]
    RateLimited {
        endpoint: String,
        retry_after: Duration,
    },

    /// Upstream object-not-found style response.
    #[error("{endpoint}: not found: {detail}")]
    NotFound { endpoint: String, detail: String },
}

impl ProviderError {
    pub(crate) fn failed(endpoint: &str, detail: impl Into<String>) -> Self {
        ProviderError::Failed {
            endpoint: endpoint.to_string(),
            status: None,
            detail: detail.into(),
        }
    }
}
