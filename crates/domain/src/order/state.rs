//! Order state machine.

use serde::{Deserialize, Serialize};

/// The status of an order.
///
/// State transitions:
/// ```text
/// Pending ──┬──► Approved
///           └──► Rejected
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Order persisted, gateway outcome not known yet.
    #[default]
    Pending,

    /// Gateway accepted the subscription (terminal state).
    Approved,

    /// Gateway refused or failed (terminal state).
    Rejected,
}

impl OrderStatus {
    /// Returns true if the order can be approved in this state.
    pub fn can_approve(&self) -> bool {
        matches!(self, OrderStatus::Pending)
    }

    /// Returns true if the order can be rejected in this state.
    pub fn can_reject(&self) -> bool {
        matches!(self, OrderStatus::Pending)
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Approved | OrderStatus::Rejected)
    }

    /// Returns the status name as stored and exposed.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Approved => "APPROVED",
            OrderStatus::Rejected => "REJECTED",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(OrderStatus::Pending),
            "APPROVED" => Ok(OrderStatus::Approved),
            "REJECTED" => Ok(OrderStatus::Rejected),
            other => Err(format!("unknown order status: {other}")),
        }
    }
}
