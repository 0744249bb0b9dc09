//! Plan sales: price snapshot, gateway subscription and final order status.

use std::time::Instant;

use common::PersonId;
use domain::{Order, PaymentRecord, Plan, ProcessSale};
use gateway::{Card, Customer, GatewayResponse, Metadata, SubscriptionRequest};
use store::{
    BusinessStore, ClientRepository, OrderRepository, PaymentRecordRepository, PlanRepository,
    SellerRepository, UnitOfWork,
};
use tracing::{error, info, warn};

use crate::error::{Result, SagaError};
use crate::services::{CredentialStore, PaymentGateway};

/// Places orders for plans and settles them against the payment gateway.
///
/// Gateway failures never surface as errors: the order is returned in the
/// `REJECTED` state with the reason kept in `failure_reason`. The gateway call
/// is not retried.
pub struct SaleProcessor<S, C, P> {
    store: S,
    credentials: C,
    gateway: P,
}

impl<S, C, P> SaleProcessor<S, C, P>
where
    S: BusinessStore,
    C: CredentialStore,
    P: PaymentGateway,
{
    pub fn new(store: S, credentials: C, gateway: P) -> Self {
        Self {
            store,
            credentials,
            gateway,
        }
    }

    #[tracing::instrument(skip(self, command), fields(plan_id = %command.plan_id, quantity = command.quantity))]
    pub async fn process_sale(&self, command: &ProcessSale) -> Result<Order> {
        let started = Instant::now();
        let result = self.try_process_sale(command).await;

        let status = match &result {
            Ok(order) => order.status.as_str(),
            Err(_) => "FAILED",
        };
        metrics::counter!("sales_total", "status" => status).increment(1);
        metrics::histogram!("sale_duration_seconds").record(started.elapsed().as_secs_f64());
        result
    }

    async fn try_process_sale(&self, command: &ProcessSale) -> Result<Order> {
        command.validate()?;
        let card = Card::new(
            command.customer_name.trim(),
            &command.card_number,
            &command.cvv,
            &command.expiry,
        )?;

        let mut uow = self.store.unit_of_work();

        if let Some(seller_id) = command.seller_id
            && uow.find_seller(seller_id).await?.is_none()
        {
            return Err(SagaError::not_found("Seller", seller_id));
        }

        let plan = uow
            .find_plan(command.plan_id)
            .await?
            .ok_or_else(|| SagaError::not_found("Plan", command.plan_id))?;
        if !plan.active {
            return Err(SagaError::Validation(format!(
                "plan {} is not active",
                plan.code
            )));
        }

        let client_id = self.resolve_client(&mut uow, command).await?;

        let mut order = Order::place(&plan, command.quantity, client_id, command.seller_id)?;
        if let Some(expected) = command.total_cents
            && expected != order.total
        {
            return Err(SagaError::Validation(format!(
                "total {expected} does not match computed total {}",
                order.total
            )));
        }

        uow.insert_order(&order).await?;
        info!(order_id = %order.id, total = %order.total, "Order placed");

        let request = subscription_request(command, &plan, &order, card);
        match self.gateway.create_subscription(&request).await {
            Ok(response) if response.is_approved() => {
                self.approve(&mut uow, &mut order, &response).await?;
            }
            Ok(response) => {
                let reason = response
                    .error_message
                    .clone()
                    .unwrap_or_else(|| format!("gateway status {}", response.status));
                order.reject(Some(response.id.clone()), reason)?;
                uow.update_order_status(&order).await?;
                info!(order_id = %order.id, status = %response.status, "Order rejected by gateway");
            }
            Err(e) => {
                warn!(order_id = %order.id, error = %e, "Gateway call failed");
                order.reject(None, e.to_string())?;
                uow.update_order_status(&order).await?;
            }
        }

        Ok(order)
    }

    /// Explicit id first, otherwise the client behind the buyer's login.
    /// Buyers without a client record stay anonymous.
    async fn resolve_client(
        &self,
        uow: &mut S::UnitOfWork,
        command: &ProcessSale,
    ) -> Result<Option<PersonId>> {
        if let Some(client_id) = command.client_id {
            return match uow.find_client(client_id).await? {
                Some(client) => Ok(Some(client.id)),
                None => Err(SagaError::not_found("Client", client_id)),
            };
        }

        let email = command.email.trim().to_lowercase();
        let Some(account) = self.credentials.find_by_email(&email).await? else {
            return Ok(None);
        };
        Ok(uow.find_client(account.id).await?.map(|client| client.id))
    }

    /// Status change and payment record commit together.
    async fn approve(
        &self,
        uow: &mut S::UnitOfWork,
        order: &mut Order,
        response: &GatewayResponse,
    ) -> Result<()> {
        order.approve(Some(response.id.clone()))?;

        let written = record_approval(uow, order, &response.status).await;

        if let Err(e) = written {
            if let Err(rollback) = uow.rollback().await {
                warn!(error = %rollback, "Rollback failed");
            }
            error!(order_id = %order.id, gateway_reference = %response.id, error = %e,
                "Gateway approved the sale but the order could not be finalized");
            return Err(e.into());
        }

        info!(order_id = %order.id, gateway_reference = %response.id, "Order approved");
        Ok(())
    }
}

async fn record_approval<U: UnitOfWork>(
    uow: &mut U,
    order: &Order,
    gateway_status: &str,
) -> store::Result<()> {
    uow.begin().await?;
    uow.update_order_status(order).await?;
    uow.insert_payment(&PaymentRecord::for_order(order, gateway_status))
        .await?;
    uow.commit().await
}

fn subscription_request(
    command: &ProcessSale,
    plan: &Plan,
    order: &Order,
    card: Card,
) -> SubscriptionRequest {
    let customer = Customer {
        name: command.customer_name.trim().to_string(),
        email: command.email.trim().to_lowercase(),
        phone: Some(command.phone.trim().to_string()).filter(|p| !p.is_empty()),
    };
    let metadata = Metadata {
        client_id: order.client_id.map(|id| id.to_string()),
        seller_id: order.seller_id.map(|id| id.to_string()),
        note: command.description.clone(),
    };

    SubscriptionRequest::new(
        order.id.to_string(),
        plan.code.clone(),
        order.quantity,
        order.total.cents(),
        card,
        customer,
    )
    .with_metadata(metadata)
}
