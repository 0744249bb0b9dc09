//! Integration tests for the sale flow.

use common::{OrderId, PersonId, PlanId};
use domain::{
    CreateClient, Money, OrderStatus, PaymentRecord, PersonDetails, PersonKind, Plan, ProcessSale,
};
use saga::{
    InMemoryCredentialStore, InMemoryPaymentGateway, ProvisioningSaga, SagaError, SaleProcessor,
};
use store::{
    BusinessStore, InMemoryStore, OrderRepository, PaymentRecordRepository, PlanRepository, Table,
};

struct TestHarness {
    sales: SaleProcessor<InMemoryStore, InMemoryCredentialStore, InMemoryPaymentGateway>,
    provisioning: ProvisioningSaga<InMemoryStore, InMemoryCredentialStore>,
    store: InMemoryStore,
    gateway: InMemoryPaymentGateway,
}

impl TestHarness {
    fn new() -> Self {
        let store = InMemoryStore::new();
        let credentials = InMemoryCredentialStore::new();
        let gateway = InMemoryPaymentGateway::new();
        Self {
            sales: SaleProcessor::new(store.clone(), credentials.clone(), gateway.clone()),
            provisioning: ProvisioningSaga::new(store.clone(), credentials),
            store,
            gateway,
        }
    }

    async fn seed_plan(&self, code: &str, price: Money) -> Plan {
        let plan = Plan::new(code, "Pro monthly", price);
        self.store.unit_of_work().insert_plan(&plan).await.unwrap();
        plan
    }

    async fn payments(&self, order_id: OrderId) -> Vec<PaymentRecord> {
        self.store
            .unit_of_work()
            .find_payments(order_id)
            .await
            .unwrap()
    }
}

fn sale(plan_id: PlanId, quantity: u32) -> ProcessSale {
    ProcessSale {
        customer_name: "Ana Souza".to_string(),
        email: "ana@example.com".to_string(),
        phone: "41999998888".to_string(),
        card_number: "4111 1111 1111 1111".to_string(),
        cvv: "123".to_string(),
        expiry: "12/30".to_string(),
        seller_id: None,
        plan_id,
        quantity,
        description: Some("first purchase".to_string()),
        client_id: None,
        total_cents: None,
    }
}

#[tokio::test]
async fn test_approved_sale_records_payment() {
    let h = TestHarness::new();
    let plan = h.seed_plan("PRO-M", Money::from_units(10)).await;

    let order = h.sales.process_sale(&sale(plan.id, 3)).await.unwrap();

    assert_eq!(order.status, OrderStatus::Approved);
    assert_eq!(order.total, Money::from_cents(3000));
    assert_eq!(order.gateway_reference.as_deref(), Some("sub_0001"));

    let stored = h
        .store
        .unit_of_work()
        .find_order(order.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, OrderStatus::Approved);
    assert_eq!(stored.plan.price, Money::from_units(10));

    let payments = h.payments(order.id).await;
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].amount, Money::from_cents(3000));
    assert_eq!(payments[0].method, PaymentRecord::CREDIT_CARD);
    assert_eq!(payments[0].status, "ACTIVE");

    let request = h.gateway.last_subscription().unwrap();
    assert_eq!(request.external_id, order.id.to_string());
    assert_eq!(request.plan_id, "PRO-M");
    assert_eq!(request.quantity, 3);
    assert_eq!(request.amount, 3000);
    assert_eq!(request.customer.email, "ana@example.com");
    assert_eq!(
        request.metadata.unwrap().note.as_deref(),
        Some("first purchase")
    );
}

#[tokio::test]
async fn test_matching_total_is_accepted() {
    let h = TestHarness::new();
    let plan = h.seed_plan("PRO-M", Money::from_units(10)).await;

    let mut command = sale(plan.id, 3);
    command.total_cents = Some(Money::from_cents(3000));

    let order = h.sales.process_sale(&command).await.unwrap();
    assert_eq!(order.status, OrderStatus::Approved);
}

#[tokio::test]
async fn test_total_mismatch_is_rejected_before_gateway() {
    let h = TestHarness::new();
    let plan = h.seed_plan("PRO-M", Money::from_units(10)).await;

    let mut command = sale(plan.id, 3);
    command.total_cents = Some(Money::from_cents(2999));

    let err = h.sales.process_sale(&command).await.unwrap_err();

    assert!(matches!(err, SagaError::Validation(_)), "{err:?}");
    assert_eq!(h.gateway.subscription_count(), 0);
    assert_eq!(h.store.count(Table::Order).await, 0);
}

#[tokio::test]
async fn test_oversized_quantity_is_rejected_before_any_write() {
    let h = TestHarness::new();
    let plan = h.seed_plan("PRO-M", Money::from_units(10)).await;

    let err = h
        .sales
        .process_sale(&sale(plan.id, 3_000_000_000))
        .await
        .unwrap_err();

    assert!(matches!(err, SagaError::Validation(_)), "{err:?}");
    assert_eq!(h.gateway.subscription_count(), 0);
    assert_eq!(h.store.count(Table::Order).await, 0);
}

#[tokio::test]
async fn test_declined_sale_keeps_gateway_reason() {
    let h = TestHarness::new();
    let plan = h.seed_plan("PRO-M", Money::from_units(10)).await;
    h.gateway.set_response("DECLINED", Some("insufficient funds"));

    let order = h.sales.process_sale(&sale(plan.id, 1)).await.unwrap();

    assert_eq!(order.status, OrderStatus::Rejected);
    assert_eq!(order.failure_reason.as_deref(), Some("insufficient funds"));

    let stored = h
        .store
        .unit_of_work()
        .find_order(order.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, OrderStatus::Rejected);
    assert_eq!(stored.failure_reason.as_deref(), Some("insufficient funds"));
    assert!(h.payments(order.id).await.is_empty());
}

#[tokio::test]
async fn test_declined_without_message_uses_status() {
    let h = TestHarness::new();
    let plan = h.seed_plan("PRO-M", Money::from_units(10)).await;
    h.gateway.set_response("DECLINED", None);

    let order = h.sales.process_sale(&sale(plan.id, 1)).await.unwrap();

    assert_eq!(order.status, OrderStatus::Rejected);
    assert_eq!(order.failure_reason.as_deref(), Some("gateway status DECLINED"));
}

#[tokio::test]
async fn test_gateway_timeout_rejects_order() {
    let h = TestHarness::new();
    let plan = h.seed_plan("PRO-M", Money::from_units(10)).await;
    h.gateway.set_fail_with_timeout();

    let order = h.sales.process_sale(&sale(plan.id, 2)).await.unwrap();

    assert_eq!(order.status, OrderStatus::Rejected);
    assert!(order.gateway_reference.is_none());
    assert!(order.failure_reason.unwrap().contains("timed out"));
    assert_eq!(h.gateway.subscription_count(), 1);
}

#[tokio::test]
async fn test_gateway_http_error_rejects_order() {
    let h = TestHarness::new();
    let plan = h.seed_plan("PRO-M", Money::from_units(10)).await;
    h.gateway.set_fail_with_status(503);

    let order = h.sales.process_sale(&sale(plan.id, 1)).await.unwrap();

    assert_eq!(order.status, OrderStatus::Rejected);
    assert!(order.failure_reason.unwrap().contains("503"));
}

#[tokio::test]
async fn test_order_keeps_price_snapshot() {
    let h = TestHarness::new();
    let mut plan = h.seed_plan("PRO-M", Money::from_units(10)).await;

    let order = h.sales.process_sale(&sale(plan.id, 1)).await.unwrap();

    plan.price = Money::from_units(25);
    plan.description = "Pro monthly, new pricing".to_string();
    h.store.unit_of_work().update_plan(&plan).await.unwrap();

    let stored = h
        .store
        .unit_of_work()
        .find_order(order.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.plan.price, Money::from_units(10));
    assert_eq!(stored.plan.description, "Pro monthly");
    assert_eq!(stored.total, Money::from_units(10));
}

#[tokio::test]
async fn test_inactive_plan_is_rejected() {
    let h = TestHarness::new();
    let mut plan = Plan::new("OLD", "Retired plan", Money::from_units(5));
    plan.active = false;
    h.store.unit_of_work().insert_plan(&plan).await.unwrap();

    let err = h.sales.process_sale(&sale(plan.id, 1)).await.unwrap_err();

    assert!(matches!(err, SagaError::Validation(_)), "{err:?}");
    assert_eq!(h.gateway.subscription_count(), 0);
}

#[tokio::test]
async fn test_unknown_plan_and_seller_are_not_found() {
    let h = TestHarness::new();

    let err = h.sales.process_sale(&sale(PlanId::new(), 1)).await.unwrap_err();
    assert!(matches!(err, SagaError::NotFound { entity: "Plan", .. }), "{err:?}");

    let plan = h.seed_plan("PRO-M", Money::from_units(10)).await;
    let mut command = sale(plan.id, 1);
    command.seller_id = Some(PersonId::new());
    let err = h.sales.process_sale(&command).await.unwrap_err();
    assert!(matches!(err, SagaError::NotFound { entity: "Seller", .. }), "{err:?}");

    let mut command = sale(plan.id, 1);
    command.client_id = Some(PersonId::new());
    let err = h.sales.process_sale(&command).await.unwrap_err();
    assert!(matches!(err, SagaError::NotFound { entity: "Client", .. }), "{err:?}");

    assert_eq!(h.store.count(Table::Order).await, 0);
}

#[tokio::test]
async fn test_invalid_card_writes_nothing() {
    let h = TestHarness::new();
    let plan = h.seed_plan("PRO-M", Money::from_units(10)).await;

    let mut command = sale(plan.id, 1);
    command.expiry = "13/30".to_string();
    let err = h.sales.process_sale(&command).await.unwrap_err();
    assert!(matches!(err, SagaError::Validation(_)), "{err:?}");

    let mut command = sale(plan.id, 1);
    command.card_number = "4111".to_string();
    let err = h.sales.process_sale(&command).await.unwrap_err();
    assert!(matches!(err, SagaError::Validation(_)), "{err:?}");

    let err = h.sales.process_sale(&sale(plan.id, 0)).await.unwrap_err();
    assert!(matches!(err, SagaError::Validation(_)), "{err:?}");

    assert_eq!(h.store.count(Table::Order).await, 0);
    assert_eq!(h.gateway.subscription_count(), 0);
}

#[tokio::test]
async fn test_buyer_login_resolves_client() {
    let h = TestHarness::new();
    let plan = h.seed_plan("PRO-M", Money::from_units(10)).await;

    let anonymous = h.sales.process_sale(&sale(plan.id, 1)).await.unwrap();
    assert!(anonymous.client_id.is_none());

    let client_id = h
        .provisioning
        .create_client(&CreateClient {
            details: PersonDetails {
                name: "Ana Souza".to_string(),
                email: "ana@example.com".to_string(),
                tax_id: "52998224725".to_string(),
                phone: "41999998888".to_string(),
                person_kind: PersonKind::Individual,
                active: true,
                trade_name: None,
                address: None,
            },
            password: "segredo123".to_string(),
            confirm_password: "segredo123".to_string(),
            seller_id: None,
        })
        .await
        .unwrap();

    let mut command = sale(plan.id, 1);
    command.email = "ANA@example.com".to_string();
    let order = h.sales.process_sale(&command).await.unwrap();

    assert_eq!(order.client_id, Some(client_id));
    let request = h.gateway.last_subscription().unwrap();
    assert_eq!(
        request.metadata.unwrap().client_id,
        Some(client_id.to_string())
    );
}

#[tokio::test]
async fn test_approval_write_failure_is_an_error() {
    let h = TestHarness::new();
    let plan = h.seed_plan("PRO-M", Money::from_units(10)).await;
    h.store.fail_on_insert(Table::PaymentRecord).await;

    let err = h.sales.process_sale(&sale(plan.id, 1)).await.unwrap_err();

    assert!(matches!(err, SagaError::Store(_)), "{err:?}");
    assert_eq!(h.gateway.subscription_count(), 1);
    assert_eq!(h.store.count(Table::PaymentRecord).await, 0);
    assert_eq!(h.store.count(Table::Order).await, 1);
}
