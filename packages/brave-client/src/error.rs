use thiserror::Error;

pub type Result<T> = std::result::Result<T, BraveError>;

/// Brave Search API client errors.
#[derive(Debug, Error)]
pub enum BraveError {
    /// Transport-level failure (connection, TLS, timeout).
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// HTTP 429 from the API.
    #[error("rate limited")]
    RateLimited,

    /// Any other non-2xx response.
    #[error("Brave API error {status}: {message}")]
    Api { status: u16, message: String },
}
