use thiserror::Error;

/// Errors raised by the gateway client.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Request data rejected locally before any HTTP call.
    #[error("Invalid gateway request: {0}")]
    Validation(String),

    /// The gateway answered with a non-2xx status.
    #[error("Gateway returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The gateway answered 2xx with a body that does not match the contract.
    #[error("Malformed gateway response: {0}")]
    Decode(String),

    /// The request exceeded the configured timeout.
    #[error("Gateway request timed out")]
    Timeout,

    /// Connection-level failure.
    #[error("Gateway network error: {0}")]
    Network(reqwest::Error),
}

impl GatewayError {
    /// HTTP status returned by the gateway, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            GatewayError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            GatewayError::Timeout
        } else if e.is_decode() {
            GatewayError::Decode(e.to_string())
        } else {
            GatewayError::Network(e)
        }
    }
}

/// Result type for gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;
