//! Error types for the OpenAI client.

use thiserror::Error;

/// Result type for OpenAI client operations.
pub type Result<T> = std::result::Result<T, OpenAIError>;

/// OpenAI client errors.
///
/// Rate-limit (429) and server (5xx) responses get their own variants so
/// callers can pace and retry differently from hard failures.
#[derive(Debug, Error)]
pub enum OpenAIError {
    /// Configuration error (missing API key, invalid settings)
    #[error("configuration error: {0}")]
    Config(String),

    /// Network error (connection failed, timeout)
    #[error("network error: {0}")]
    Network(String),

    /// HTTP 429 from the API
    #[error("rate limited")]
    RateLimited {
        /// Value of the Retry-After header, if the API sent one
        retry_after_secs: Option<u64>,
    },

    /// HTTP 5xx from the API
    #[error("server error {status}: {message}")]
    Server { status: u16, message: String },

    /// Any other non-2xx response (invalid request, auth failure)
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// Invalid JSON or unexpected response shape
    #[error("parse error: {0}")]
    Parse(String),
}

impl OpenAIError {
    /// Whether a retry with backoff is worth attempting.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            OpenAIError::RateLimited { .. } | OpenAIError::Server { .. } | OpenAIError::Network(_)
        )
    }
}
