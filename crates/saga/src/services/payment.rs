//! Payment gateway seam and in-memory implementation.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use gateway::{GatewayClient, GatewayError, GatewayResponse, SubscriptionRequest};

/// The gateway operations the sale processor depends on.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_subscription(
        &self,
        request: &SubscriptionRequest,
    ) -> Result<GatewayResponse, GatewayError>;
}

#[async_trait]
impl PaymentGateway for GatewayClient {
    async fn create_subscription(
        &self,
        request: &SubscriptionRequest,
    ) -> Result<GatewayResponse, GatewayError> {
        GatewayClient::create_subscription(self, request).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Failure {
    Http(u16),
    Timeout,
}

#[derive(Debug)]
struct InMemoryGatewayState {
    status: String,
    error_message: Option<String>,
    failure: Option<Failure>,
    subscriptions: Vec<SubscriptionRequest>,
    next_id: u32,
}

impl Default for InMemoryGatewayState {
    fn default() -> Self {
        Self {
            status: "ACTIVE".to_string(),
            error_message: None,
            failure: None,
            subscriptions: Vec::new(),
            next_id: 0,
        }
    }
}

impl InMemoryGatewayState {
    fn respond(&mut self) -> Result<GatewayResponse, GatewayError> {
        match self.failure {
            Some(Failure::Http(status)) => {
                return Err(GatewayError::Http {
                    status,
                    body: "gateway unavailable".to_string(),
                });
            }
            Some(Failure::Timeout) => return Err(GatewayError::Timeout),
            None => {}
        }

        self.next_id += 1;
        Ok(GatewayResponse {
            id: format!("sub_{:04}", self.next_id),
            status: self.status.clone(),
            error_message: self.error_message.clone(),
            amount: None,
            metadata: None,
        })
    }
}

/// In-memory gateway for testing. Answers `ACTIVE` unless told otherwise.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentGateway {
    state: Arc<RwLock<InMemoryGatewayState>>,
}

impl InMemoryPaymentGateway {
    /// Creates a new in-memory gateway.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the status and error message of subsequent responses.
    pub fn set_response(&self, status: &str, error_message: Option<&str>) {
        let mut state = self.state.write().unwrap();
        state.status = status.to_string();
        state.error_message = error_message.map(str::to_string);
    }

    /// Makes subsequent calls fail with the given HTTP status.
    pub fn set_fail_with_status(&self, status: u16) {
        self.state.write().unwrap().failure = Some(Failure::Http(status));
    }

    /// Makes subsequent calls time out.
    pub fn set_fail_with_timeout(&self) {
        self.state.write().unwrap().failure = Some(Failure::Timeout);
    }

    pub fn clear_failure(&self) {
        self.state.write().unwrap().failure = None;
    }

    /// Number of subscription requests received, including failed ones.
    pub fn subscription_count(&self) -> usize {
        self.state.read().unwrap().subscriptions.len()
    }

    pub fn last_subscription(&self) -> Option<SubscriptionRequest> {
        self.state.read().unwrap().subscriptions.last().cloned()
    }
}

#[async_trait]
impl PaymentGateway for InMemoryPaymentGateway {
    async fn create_subscription(
        &self,
        request: &SubscriptionRequest,
    ) -> Result<GatewayResponse, GatewayError> {
        let mut state = self.state.write().unwrap();
        state.subscriptions.push(request.clone());
        state.respond()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway::{Card, Customer};

    fn request() -> SubscriptionRequest {
        let card = Card::new("ANA", "4111111111111111", "123", "12/30").unwrap();
        let customer = Customer {
            name: "Ana".to_string(),
            email: "ana@example.com".to_string(),
            phone: None,
        };
        SubscriptionRequest::new("order-1", "PRO-M", 1, 4990, card, customer)
    }

    #[tokio::test]
    async fn test_default_response_is_approved() {
        let gateway = InMemoryPaymentGateway::new();
        let response = gateway.create_subscription(&request()).await.unwrap();

        assert_eq!(response.id, "sub_0001");
        assert!(response.is_approved());
        assert_eq!(gateway.subscription_count(), 1);
        assert_eq!(gateway.last_subscription().unwrap().plan_id, "PRO-M");
    }

    #[tokio::test]
    async fn test_configured_decline() {
        let gateway = InMemoryPaymentGateway::new();
        gateway.set_response("DECLINED", Some("card expired"));

        let response = gateway.create_subscription(&request()).await.unwrap();
        assert!(!response.is_approved());
        assert_eq!(response.error_message.as_deref(), Some("card expired"));
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let gateway = InMemoryPaymentGateway::new();

        gateway.set_fail_with_status(503);
        let err = gateway.create_subscription(&request()).await.unwrap_err();
        assert_eq!(err.status(), Some(503));

        gateway.set_fail_with_timeout();
        let err = gateway.create_subscription(&request()).await.unwrap_err();
        assert!(matches!(err, GatewayError::Timeout));

        gateway.clear_failure();
        assert!(gateway.create_subscription(&request()).await.is_ok());
        assert_eq!(gateway.subscription_count(), 3);
    }
}
