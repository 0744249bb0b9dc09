//! Envelope returned to callers of every command.

use serde::{Deserialize, Serialize};

use crate::error::SagaError;

/// `{status, message, data}` as seen by external callers.
///
/// Failures carry only the error message; a failed compensation appends an
/// operator warning naming the orphaned account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResult<T> {
    pub status: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> CommandResult<T> {
    pub fn success(message: impl Into<String>, data: T) -> Self {
        Self {
            status: true,
            message: message.into(),
            data: Some(data),
        }
    }

    pub fn failure(error: &SagaError) -> Self {
        let mut message = error.root().to_string();
        if let Some(warning) = error.compensation_warning() {
            message.push_str(". Warning: ");
            message.push_str(&warning);
        }
        Self {
            status: false,
            message,
            data: None,
        }
    }

    /// Builds the envelope from a saga outcome.
    pub fn from_result(result: &Result<T, SagaError>, success_message: &str) -> Self
    where
        T: Clone,
    {
        match result {
            Ok(data) => Self::success(success_message, data.clone()),
            Err(e) => Self::failure(e),
        }
    }
}
