//! API error types with HTTP response mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use saga::{CommandResult, SagaError};
use thiserror::Error;

/// API-level error type. Every variant renders as a failed [`CommandResult`].
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request could not be decoded.
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Saga(#[from] SagaError),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Saga(err) => saga_status(err.root()),
        }
    }
}

fn saga_status(err: &SagaError) -> StatusCode {
    match err {
        SagaError::Validation(_) => StatusCode::BAD_REQUEST,
        SagaError::NotFound { .. } => StatusCode::NOT_FOUND,
        SagaError::Conflict(_) => StatusCode::CONFLICT,
        SagaError::Gateway(_) => StatusCode::BAD_GATEWAY,
        SagaError::Store(_)
        | SagaError::Credential(_)
        | SagaError::Interrupted(_)
        | SagaError::CompensationFailed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body: CommandResult<()> = match &self {
            ApiError::BadRequest(msg) => CommandResult {
                status: false,
                message: msg.clone(),
                data: None,
            },
            ApiError::Saga(err) => {
                if status.is_server_error() {
                    tracing::error!(error = %err, "command failed");
                }
                CommandResult::failure(err)
            }
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::PersonId;
    use store::StoreError;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (SagaError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (
                SagaError::NotFound {
                    entity: "Plan",
                    id: "1".into(),
                },
                StatusCode::NOT_FOUND,
            ),
            (SagaError::Conflict("x".into()), StatusCode::CONFLICT),
            (
                SagaError::Store(StoreError::Injected("commit".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status_code(), expected);
        }
    }

    #[test]
    fn test_compensation_failure_uses_root_status() {
        let err = SagaError::CompensationFailed {
            source: Box::new(SagaError::Conflict("tax id already in use".into())),
            account_id: PersonId::new(),
            failure: "delete rejected".into(),
        };
        assert_eq!(ApiError::from(err).status_code(), StatusCode::CONFLICT);
    }
}
