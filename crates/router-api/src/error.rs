//! Error types for the Bitrise API client.

use thiserror::Error;

/// Errors surfaced by the remote build client.
///
/// Remote failures carry the HTTP status code and the raw response body so
/// an operator can diagnose the call without structured error codes from the
/// service side.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Non-2xx response after the retry budget was spent.
    #[error("failed to get response, statuscode: {code}, body: {body}")]
    Status { code: u16, body: String },

    /// 2xx response whose body did not decode into the expected shape.
    #[error("failed to decode response, body: {body}, error: {source}")]
    Decode {
        body: String,
        source: serde_json::Error,
    },

    /// Transport-level failure (connect, TLS, timeout) after retries.
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The service accepted the start request but did not queue a build.
    /// Seen when manual build approval is enabled for the project.
    #[error(
        "build was not started: {message} (this could mean that manual build approval \
         is enabled for this project and it's blocking builds from starting)"
    )]
    BuildNotQueued { message: String },

    /// Local filesystem failure while writing a downloaded artifact.
    #[error("artifact I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for remote build operations.
pub type ApiResult<T> = std::result::Result<T, ApiError>;
