//! Orders and the payments recorded against them.

mod state;

use chrono::{DateTime, Utc};
use common::{OrderId, PersonId, PlanId};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::plan::{Plan, PlanSnapshot};
use crate::value_objects::Money;

pub use state::OrderStatus;

/// Errors that can occur during order operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    /// Order is not in the expected state.
    #[error("Invalid state transition: cannot {action} from {current_state} state")]
    InvalidStateTransition {
        current_state: OrderStatus,
        action: &'static str,
    },

    /// Invalid quantity.
    #[error("Invalid quantity: {quantity} (must be between 1 and {})", Order::MAX_QUANTITY)]
    InvalidQuantity { quantity: u32 },

    /// Price times quantity does not fit in a money amount.
    #[error("Order total overflows for {quantity} x {price}")]
    TotalOverflow { quantity: u32, price: Money },
}

/// A sale of `quantity` units of a plan.
///
/// The plan fields are captured in `plan` when the order is placed; stores
/// only ever update the status columns afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub client_id: Option<PersonId>,
    pub seller_id: Option<PersonId>,
    pub plan_id: PlanId,
    pub quantity: u32,
    pub plan: PlanSnapshot,
    pub total: Money,
    pub status: OrderStatus,
    /// Subscription or charge id returned by the gateway.
    pub gateway_reference: Option<String>,
    /// Gateway error message kept for diagnostics on rejection.
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Largest quantity the order store can hold.
    pub const MAX_QUANTITY: u32 = i32::MAX as u32;

    /// Places a pending order, freezing the plan's current price and labels.
    pub fn place(
        plan: &Plan,
        quantity: u32,
        client_id: Option<PersonId>,
        seller_id: Option<PersonId>,
    ) -> Result<Self, OrderError> {
        if quantity == 0 || quantity > Self::MAX_QUANTITY {
            return Err(OrderError::InvalidQuantity { quantity });
        }

        let snapshot = plan.snapshot();
        let total = snapshot
            .price
            .multiply(quantity)
            .ok_or(OrderError::TotalOverflow {
                quantity,
                price: snapshot.price,
            })?;
        let now = Utc::now();

        Ok(Self {
            id: OrderId::new(),
            client_id,
            seller_id,
            plan_id: plan.id,
            quantity,
            plan: snapshot,
            total,
            status: OrderStatus::Pending,
            gateway_reference: None,
            failure_reason: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Moves a pending order to `Approved`.
    pub fn approve(&mut self, gateway_reference: Option<String>) -> Result<(), OrderError> {
        if !self.status.can_approve() {
            return Err(OrderError::InvalidStateTransition {
                current_state: self.status,
                action: "approve",
            });
        }
        self.status = OrderStatus::Approved;
        self.gateway_reference = gateway_reference;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Moves a pending order to `Rejected`, keeping the reason.
    pub fn reject(
        &mut self,
        gateway_reference: Option<String>,
        reason: impl Into<String>,
    ) -> Result<(), OrderError> {
        if !self.status.can_reject() {
            return Err(OrderError::InvalidStateTransition {
                current_state: self.status,
                action: "reject",
            });
        }
        self.status = OrderStatus::Rejected;
        self.gateway_reference = gateway_reference;
        self.failure_reason = Some(reason.into());
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// A payment confirmed by the gateway for an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub id: Uuid,
    pub order_id: OrderId,
    pub amount: Money,
    pub paid_at: DateTime<Utc>,
    /// Status as reported by the gateway.
    pub status: String,
    pub method: String,
}

impl PaymentRecord {
    pub const CREDIT_CARD: &'static str = "CREDIT_CARD";

    /// Records the full order total as paid by credit card.
    pub fn for_order(order: &Order, gateway_status: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_id: order.id,
            amount: order.total,
            paid_at: Utc::now(),
            status: gateway_status.into(),
            method: Self::CREDIT_CARD.to_string(),
        }
    }
}
