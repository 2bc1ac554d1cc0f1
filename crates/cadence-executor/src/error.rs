use thiserror::Error;

/// Errors returned by the generator HTTP client.
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The generator answered with a non-2xx status.
    #[error("generator returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The configured endpoint is not a valid absolute URL.
    #[error("invalid work endpoint '{url}': {reason}")]
    InvalidEndpoint { url: String, reason: String },
}
