//! Error types for the repository client.

use thiserror::Error;

/// Errors that can occur when talking to the artifact repository.
#[derive(Debug, Error)]
pub enum RepoError {
    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Transport-level HTTP error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The repository answered with an unexpected status code.
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The repository returned data that does not have the expected shape.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl RepoError {
    /// Returns true if the requested resource does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
