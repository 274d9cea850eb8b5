//! Error types for shelf-core

use thiserror::Error;

/// Result type alias using shelf-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in shelf-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Product not found
    #[error("Product not found: {0}")]
    NotFound(String),

    /// Invalid input, rejected before any network call
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP transport error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Remote resource answered with a non-success status
    #[error("Remote error: {message}")]
    Remote {
        /// HTTP status code
        status: u16,
        /// Server-provided message with the status appended
        message: String,
    },

    /// The remote could not be reached (connection refused or timed out)
    #[error("Remote unreachable: {0}")]
    Unreachable(String),

    /// A background mutation ended without reporting a result
    #[error("Mutation aborted: {0}")]
    Aborted(String),
}

impl Error {
    /// Returns the HTTP status for remote failures.
    pub const fn remote_status(&self) -> Option<u16> {
        match self {
            Self::Remote { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the failure means the network or the remote host is down.
    pub const fn is_unreachable(&self) -> bool {
        matches!(self, Self::Unreachable(_))
    }
}
