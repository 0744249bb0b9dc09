//! Domain error types.

use thiserror::Error;

/// Malformed or missing input, detected before anything is written.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    /// The offending input field.
    pub field: &'static str,

    /// Human-readable reason.
    pub message: String,
}

impl ValidationError {
    /// Creates a validation error for a field.
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}
