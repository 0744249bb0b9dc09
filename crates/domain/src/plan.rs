//! Sellable plans.

use chrono::{DateTime, Utc};
use common::PlanId;
use serde::{Deserialize, Serialize};

use crate::value_objects::Money;

/// A plan as it currently stands in the catalogue. Orders never read this
/// again after taking a [`PlanSnapshot`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub id: PlanId,
    /// Unique business key, also used as the gateway plan identifier.
    pub code: String,
    pub description: String,
    pub price: Money,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Plan {
    pub fn new(code: impl Into<String>, description: impl Into<String>, price: Money) -> Self {
        let now = Utc::now();
        Self {
            id: PlanId::new(),
            code: code.into(),
            description: description.into(),
            price,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Copies the fields an order must keep even if the plan changes later.
    pub fn snapshot(&self) -> PlanSnapshot {
        PlanSnapshot {
            code: self.code.clone(),
            description: self.description.clone(),
            price: self.price,
        }
    }
}

/// Plan fields frozen on an order at sale time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanSnapshot {
    pub code: String,
    pub description: String,
    pub price: Money,
}
