//! Shared identifier types.

mod types;

pub use types::{OrderId, PersonId, PlanId};
