//! Saga error types.

use common::PersonId;
use domain::{OrderError, ValidationError};
use gateway::GatewayError;
use store::{StoreError, constraints};
use thiserror::Error;

use crate::services::CredentialError;

/// Errors returned by the provisioning saga and the sale processor.
#[derive(Debug, Error)]
pub enum SagaError {
    /// Malformed or missing input, detected before any write.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A referenced plan, seller, client or account does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Duplicate tax id, role or membership.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The payment gateway failed or answered with an error.
    #[error("Gateway error: {0}")]
    Gateway(GatewayError),

    /// Business store failure.
    #[error("Store error: {0}")]
    Store(StoreError),

    /// Credential store failure.
    #[error("Credential store error: {0}")]
    Credential(CredentialError),

    /// The task completing a registration was cancelled by the runtime.
    #[error("Provisioning interrupted: {0}")]
    Interrupted(String),

    /// The original failure, plus a compensating account delete that also failed.
    #[error("{source} (compensation failed for account {account_id}: {failure})")]
    CompensationFailed {
        source: Box<SagaError>,
        account_id: PersonId,
        failure: String,
    },
}

impl SagaError {
    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        SagaError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// The error that caused the saga to fail, skipping any compensation wrapper.
    pub fn root(&self) -> &SagaError {
        match self {
            SagaError::CompensationFailed { source, .. } => source.root(),
            other => other,
        }
    }

    /// Warning for operators when a compensating delete failed.
    pub fn compensation_warning(&self) -> Option<String> {
        match self {
            SagaError::CompensationFailed {
                account_id,
                failure,
                ..
            } => Some(format!(
                "account {account_id} could not be removed and needs manual cleanup: {failure}"
            )),
            _ => None,
        }
    }
}

impl From<ValidationError> for SagaError {
    fn from(e: ValidationError) -> Self {
        SagaError::Validation(e.to_string())
    }
}

impl From<OrderError> for SagaError {
    fn from(e: OrderError) -> Self {
        SagaError::Validation(e.to_string())
    }
}

impl From<StoreError> for SagaError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::UniqueViolation { constraint } => {
                let message = match constraint.as_str() {
                    constraints::INDIVIDUAL_TAX_ID | constraints::CORPORATE_TAX_ID => {
                        "tax id already in use".to_string()
                    }
                    constraints::ROLE_PER_KIND => "role already assigned to this account".to_string(),
                    constraints::PLAN_CODE => "plan code already in use".to_string(),
                    other => format!("duplicate record ({other})"),
                };
                SagaError::Conflict(message)
            }
            StoreError::NotFound { entity, id } => SagaError::NotFound { entity, id },
            other => SagaError::Store(other),
        }
    }
}

impl From<GatewayError> for SagaError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::Validation(message) => SagaError::Validation(message),
            other => SagaError::Gateway(other),
        }
    }
}

impl From<CredentialError> for SagaError {
    fn from(e: CredentialError) -> Self {
        match e {
            CredentialError::PasswordPolicy(message) => SagaError::Validation(message),
            CredentialError::DuplicateEmail(email) => {
                SagaError::Conflict(format!("e-mail {email} already in use"))
            }
            CredentialError::NotFound(id) => SagaError::not_found("Account", id),
            other => SagaError::Credential(other),
        }
    }
}

/// Convenience type alias for saga results.
pub type Result<T> = std::result::Result<T, SagaError>;
