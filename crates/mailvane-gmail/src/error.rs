//! Error types for the Gmail client.

use thiserror::Error;

/// Errors that can occur while talking to the Gmail API.
#[derive(Debug, Error)]
pub enum Error {
    /// The access token was rejected (HTTP 401). The caller must
    /// re-authenticate; retrying with the same token cannot succeed.
    #[error("authentication expired, re-authentication required")]
    AuthExpired,

    /// The API answered with a non-success status other than 401.
    #[error("Gmail API error: {status} {message}")]
    Status {
        /// HTTP status code returned by the API.
        status: u16,
        /// Response body or status text, for diagnostics.
        message: String,
    },

    /// The request failed at the transport level (DNS, TLS, timeout).
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// A response body could not be decoded.
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// The update stream ended without an error frame.
    #[error("update stream closed by server")]
    StreamClosed,

    /// The update stream has not been connected yet.
    #[error("update stream not connected")]
    StreamNotConnected,
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
