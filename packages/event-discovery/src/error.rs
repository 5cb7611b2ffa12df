//! Typed errors for the discovery pipeline.
//!
//! Uses `thiserror` for the pipeline taxonomy; the storage trait follows
//! the repo convention of `anyhow::Result` and is wrapped at the boundary.

use thiserror::Error;

/// Result type for discovery operations.
pub type Result<T> = std::result::Result<T, DiscoveryError>;

/// Errors that can occur during a discovery run.
///
/// Per-fetch and per-call failures are caught and recorded where they
/// happen; the only variant that aborts a run is `ConfigurationMissing`.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// A page or listing fetch exceeded its timeout
    #[error("fetch timed out: {url}")]
    FetchTimeout { url: String },

    /// Non-2xx response or network failure while fetching
    #[error("fetch failed for {url}: {reason}")]
    FetchFailed { url: String, reason: String },

    /// The completion API returned 429 (sets the shared cooldown)
    #[error("completion API rate limited")]
    RateLimited,

    /// The completion API returned 5xx (retryable)
    #[error("completion API server error: {0}")]
    ServerError(String),

    /// Completion API output did not match the expected shape
    #[error("failed to parse completion output: {0}")]
    ParseFailed(String),

    /// Fast-fail variant of `RateLimited`: a cooldown window is active
    #[error("completion API cooling down ({remaining_ms} ms remaining)")]
    Cooldown { remaining_ms: u64 },

    /// Required external credentials are absent. Fatal for the run.
    #[error("missing configuration: {0}")]
    ConfigurationMissing(String),

    /// Durable store failure
    #[error("storage error: {0}")]
    Storage(#[source] anyhow::Error),
}

impl DiscoveryError {
    /// True for rate-limit conditions that should be visible process-wide.
    pub fn is_rate_limit(&self) -> bool {
        matches!(
            self,
            DiscoveryError::RateLimited | DiscoveryError::Cooldown { .. }
        )
    }
}
