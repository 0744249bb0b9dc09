//! Request and response bodies of the gateway HTTP API (snake_case JSON).

use serde::{Deserialize, Serialize};

use crate::card::Card;

pub const CURRENCY_BRL: &str = "BRL";

#[derive(Debug, Clone, Serialize)]
pub struct Customer {
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// Free-form references echoed back by the gateway.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Metadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seller_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChargeRequest {
    pub external_id: String,
    /// Amount in cents.
    pub amount: i64,
    pub currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub card: Card,
    pub customer: Customer,
}

impl ChargeRequest {
    pub fn new(
        external_id: impl Into<String>,
        amount: i64,
        card: Card,
        customer: Customer,
    ) -> Self {
        Self {
            external_id: external_id.into(),
            amount,
            currency: CURRENCY_BRL.to_string(),
            description: None,
            card,
            customer,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionRequest {
    pub external_id: String,
    pub plan_id: String,
    pub quantity: u32,
    /// Amount per billing cycle in cents.
    pub amount: i64,
    pub currency: String,
    pub card: Card,
    pub customer: Customer,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl SubscriptionRequest {
    pub fn new(
        external_id: impl Into<String>,
        plan_id: impl Into<String>,
        quantity: u32,
        amount: i64,
        card: Card,
        customer: Customer,
    ) -> Self {
        Self {
            external_id: external_id.into(),
            plan_id: plan_id.into(),
            quantity,
            amount,
            currency: CURRENCY_BRL.to_string(),
            card,
            customer,
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Partial update; absent fields are left unchanged by the gateway.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateSubscriptionRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card: Option<Card>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

/// Typed result of any charge or subscription call.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct GatewayResponse {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default)]
    pub metadata: Option<Metadata>,
}

impl GatewayResponse {
    const APPROVED_STATUSES: [&'static str; 4] = ["ACTIVE", "PENDING", "APPROVED", "SUCCESS"];

    /// True for the statuses that settle a sale as approved.
    pub fn is_approved(&self) -> bool {
        Self::APPROVED_STATUSES
            .iter()
            .any(|s| s.eq_ignore_ascii_case(&self.status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: &str) -> GatewayResponse {
        GatewayResponse {
            id: "sub_1".to_string(),
            status: status.to_string(),
            error_message: None,
            amount: None,
            metadata: None,
        }
    }

    #[test]
    fn test_approved_statuses() {
        for status in ["ACTIVE", "PENDING", "APPROVED", "SUCCESS", "active"] {
            assert!(response(status).is_approved(), "{status}");
        }
        for status in ["DECLINED", "CANCELED", "FAILED", ""] {
            assert!(!response(status).is_approved(), "{status}");
        }
    }

    #[test]
    fn test_response_optional_fields() {
        let parsed: GatewayResponse =
            serde_json::from_str(r#"{"id":"ch_1","status":"DECLINED","error_message":"no funds"}"#)
                .unwrap();
        assert_eq!(parsed.error_message.as_deref(), Some("no funds"));
        assert_eq!(parsed.amount, None);
    }

    #[test]
    fn test_update_request_skips_absent_fields() {
        let body = UpdateSubscriptionRequest {
            quantity: Some(2),
            ..Default::default()
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json, serde_json::json!({"quantity": 2}));
    }
}
