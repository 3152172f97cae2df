//! Error types for the core library.

use thiserror::Error;

use crate::service::MailServiceError;

/// Errors that can occur in core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Provider operation failed.
    #[error("mail service error: {0}")]
    Service(#[from] MailServiceError),

    /// Database operation failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error means the user has to authenticate again.
    #[must_use]
    pub const fn is_auth_expired(&self) -> bool {
        matches!(self, Self::Service(MailServiceError::AuthExpired))
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
