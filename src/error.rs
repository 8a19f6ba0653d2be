use crate::Method;

/// Error type returned by this crate.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Requested method is outside the supported set. Never retried.
    #[error("unsupported HTTP method '{method}'. Allowed methods: {}", Method::allowed_list())]
    InvalidMethod { method: String },
    /// Network exchange could not be established on the final attempt.
    #[error("failed to connect to {url}: {message}")]
    Connection { url: String, message: String },
    /// Final attempt completed with a 4xx/5xx status code.
    #[error("HTTP error occurred: {message}")]
    Response {
        /// Status code of the final attempt.
        status: u16,
        message: String,
    },
    /// Any other transport failure persisting through the final attempt.
    #[error("request failed: {message}")]
    RequestFailed { message: String },
    /// Caller-supplied request body is not valid JSON.
    #[error("invalid JSON data: {0}")]
    InvalidJson(#[from] serde_json::Error),
    /// The underlying `reqwest` client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),
}

impl ClientError {
    /// Returns true for failures produced after exhausting the retry budget.
    pub fn is_exhausted(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. } | Self::Response { .. } | Self::RequestFailed { .. }
        )
    }
}
