//! Core domain errors.

use thiserror::Error;

/// Core domain errors for modelgen.
///
/// All variants are caller mistakes: they are surfaced immediately and
/// never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// A generator or model name/tag does not follow the naming rules.
    #[error("Invalid identifier '{value}': {field} must match [a-z0-9][a-z0-9-]+")]
    InvalidIdentifier { field: &'static str, value: String },

    /// A task handle could not be decoded.
    #[error("Malformed task ID: {0}")]
    MalformedIdentifier(String),

    /// Label lookup was requested with no path segments.
    #[error("Invalid label path: no nested keys provided")]
    InvalidPath,
}
