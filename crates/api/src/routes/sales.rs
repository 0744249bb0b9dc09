//! Plan sale endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{OrderId, PersonId, PlanId};
use domain::{Order, OrderStatus, ProcessSale};
use saga::{CommandResult, CredentialStore, PaymentGateway};
use serde::Serialize;
use store::BusinessStore;

use crate::AppState;
use crate::error::ApiError;
use crate::routes::people::bad_body;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleResponse {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub plan_id: PlanId,
    pub plan_code: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
    pub total_cents: i64,
    pub client_id: Option<PersonId>,
    pub seller_id: Option<PersonId>,
    pub gateway_reference: Option<String>,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Order> for SaleResponse {
    fn from(order: Order) -> Self {
        Self {
            order_id: order.id,
            status: order.status,
            plan_id: order.plan_id,
            plan_code: order.plan.code,
            quantity: order.quantity,
            unit_price_cents: order.plan.price.cents(),
            total_cents: order.total.cents(),
            client_id: order.client_id,
            seller_id: order.seller_id,
            gateway_reference: order.gateway_reference,
            failure_reason: order.failure_reason,
            created_at: order.created_at,
        }
    }
}

/// POST /sales
///
/// The order is persisted whether the gateway approves it or not, so both
/// outcomes answer `201 Created`; the envelope's `status` tells them apart.
#[tracing::instrument(skip_all)]
pub async fn process<S, C, P>(
    State(state): State<Arc<AppState<S, C, P>>>,
    payload: Result<Json<ProcessSale>, JsonRejection>,
) -> Result<(StatusCode, Json<CommandResult<SaleResponse>>), ApiError>
where
    S: BusinessStore,
    C: CredentialStore + Clone + 'static,
    P: PaymentGateway + 'static,
{
    let Json(command) = payload.map_err(bad_body)?;
    let order = state.sales.process_sale(&command).await?;

    let result = match order.status {
        OrderStatus::Approved => CommandResult::success("Sale approved", order.into()),
        _ => {
            let reason = order.failure_reason.clone().unwrap_or_default();
            CommandResult {
                status: false,
                message: format!("Sale rejected: {reason}"),
                data: Some(order.into()),
            }
        }
    };
    Ok((StatusCode::CREATED, Json(result)))
}
