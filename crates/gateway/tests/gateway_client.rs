//! Runs the real client against an in-process fake gateway.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
};
use gateway::{
    Card, ChargeRequest, Customer, GatewayClient, GatewayConfig, GatewayError, Metadata,
    SubscriptionRequest, UpdateSubscriptionRequest,
};
use serde_json::{Value, json};
use tokio::sync::Mutex;

#[derive(Clone)]
struct Fake {
    token_calls: Arc<AtomicUsize>,
    api_calls: Arc<AtomicUsize>,
    expires_in: u64,
    token_delay: Duration,
    token_request: Arc<Mutex<Option<(HeaderMap, Value)>>>,
    last_api_request: Arc<Mutex<Option<(HeaderMap, Value)>>>,
}

impl Fake {
    fn new() -> Self {
        Self {
            token_calls: Arc::new(AtomicUsize::new(0)),
            api_calls: Arc::new(AtomicUsize::new(0)),
            expires_in: 3600,
            token_delay: Duration::ZERO,
            token_request: Arc::new(Mutex::new(None)),
            last_api_request: Arc::new(Mutex::new(None)),
        }
    }

    fn token_calls(&self) -> usize {
        self.token_calls.load(Ordering::SeqCst)
    }
}

async fn token(
    State(fake): State<Fake>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    let n = fake.token_calls.fetch_add(1, Ordering::SeqCst) + 1;
    *fake.token_request.lock().await = Some((headers, body));
    tokio::time::sleep(fake.token_delay).await;
    Json(json!({
        "access_token": format!("tok-{n}"),
        "expires_in": fake.expires_in,
        "token_type": "Bearer",
    }))
}

async fn record(fake: &Fake, headers: HeaderMap, body: Value) {
    fake.api_calls.fetch_add(1, Ordering::SeqCst);
    *fake.last_api_request.lock().await = Some((headers, body));
}

async fn create_subscription(
    State(fake): State<Fake>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    record(&fake, headers, body).await;
    Json(json!({"id": "sub_1", "status": "ACTIVE"}))
}

async fn get_subscription(
    State(fake): State<Fake>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Json<Value> {
    record(&fake, headers, Value::Null).await;
    Json(json!({"id": id, "status": "ACTIVE"}))
}

async fn cancel_subscription(
    State(fake): State<Fake>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Json<Value> {
    record(&fake, headers, Value::Null).await;
    Json(json!({"id": id, "status": "CANCELED"}))
}

async fn update_subscription(
    State(fake): State<Fake>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Json<Value> {
    record(&fake, headers, body).await;
    Json(json!({"id": id, "status": "ACTIVE"}))
}

async fn create_charge(
    State(fake): State<Fake>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    let declined = body["amount"].as_i64() == Some(666);
    record(&fake, headers, body).await;
    if declined {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({"error": "card declined"})),
        )
            .into_response();
    }
    Json(json!({"id": "ch_1", "status": "APPROVED", "amount": 4990})).into_response()
}

async fn get_charge(Path(id): Path<String>) -> impl IntoResponse {
    match id.as_str() {
        "garbled" => (StatusCode::OK, "{not json").into_response(),
        "slow" => {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Json(json!({"id": id, "status": "APPROVED"})).into_response()
        }
        _ => Json(json!({"id": id, "status": "DECLINED", "error_message": "insufficient funds"}))
            .into_response(),
    }
}

async fn spawn(fake: Fake) -> String {
    let app = Router::new()
        .route("/token", post(token))
        .route("/charges", post(create_charge))
        .route("/charges/{id}", get(get_charge))
        .route("/subscriptions", post(create_subscription))
        .route(
            "/subscriptions/{id}",
            get(get_subscription).put(update_subscription),
        )
        .route("/subscriptions/{id}/cancel", post(cancel_subscription))
        .with_state(fake);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

async fn client_for(fake: &Fake) -> GatewayClient {
    let base = spawn(fake.clone()).await;
    let config = GatewayConfig::new(base, "partner-id", "partner-secret").with_partner_key("pk-1");
    GatewayClient::new(config).unwrap()
}

fn card() -> Card {
    Card::new("ANA SOUZA", "4111111111111111", "123", "12/30").unwrap()
}

fn customer() -> Customer {
    Customer {
        name: "Ana Souza".to_string(),
        email: "ana@example.com".to_string(),
        phone: Some("41999998888".to_string()),
    }
}

#[tokio::test]
async fn concurrent_callers_share_one_token_request() {
    let mut fake = Fake::new();
    fake.token_delay = Duration::from_millis(100);
    let client = client_for(&fake).await;

    let mut handles = Vec::new();
    for _ in 0..10 {
        let client = client.clone();
        handles.push(tokio::spawn(async move { client.get_token().await }));
    }
    for handle in handles {
        let token = handle.await.unwrap().unwrap();
        assert_eq!(token.access_token, "tok-1");
    }

    assert_eq!(fake.token_calls(), 1);
}

#[tokio::test]
async fn token_request_uses_basic_auth_scope_and_partner_key() {
    let fake = Fake::new();
    let client = client_for(&fake).await;

    client.get_token().await.unwrap();

    let (headers, body) = fake.token_request.lock().await.clone().unwrap();
    let auth = headers["authorization"].to_str().unwrap();
    // base64("partner-id:partner-secret")
    assert_eq!(auth, "Basic cGFydG5lci1pZDpwYXJ0bmVyLXNlY3JldA==");
    assert_eq!(headers["x-partner-key"], "pk-1");
    assert_eq!(body, json!({"scope": "charges subscriptions"}));
}

#[tokio::test]
async fn token_expiring_within_margin_is_refreshed() {
    let mut fake = Fake::new();
    fake.expires_in = 30;
    let client = client_for(&fake).await;

    let first = client.get_token().await.unwrap();
    let second = client.get_token().await.unwrap();

    assert_eq!(first.access_token, "tok-1");
    assert_eq!(second.access_token, "tok-2");
    assert_eq!(fake.token_calls(), 2);
}

#[tokio::test]
async fn invalidated_token_is_requested_again() {
    let fake = Fake::new();
    let client = client_for(&fake).await;

    client.get_token().await.unwrap();
    client.get_token().await.unwrap();
    assert_eq!(fake.token_calls(), 1);

    client.invalidate_token().await;
    client.get_token().await.unwrap();
    assert_eq!(fake.token_calls(), 2);
}

#[tokio::test]
async fn token_failure_reports_status_and_body() {
    let app = Router::new().route(
        "/token",
        post(|| async { (StatusCode::UNAUTHORIZED, "bad credentials") }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    let client = GatewayClient::new(GatewayConfig::new(format!("http://{addr}"), "id", "bad")).unwrap();

    match client.get_token().await {
        Err(GatewayError::Http { status, body }) => {
            assert_eq!(status, 401);
            assert_eq!(body, "bad credentials");
        }
        other => panic!("expected HTTP error, got {other:?}"),
    }
}

#[tokio::test]
async fn subscription_carries_bearer_token_and_metadata() {
    let fake = Fake::new();
    let client = client_for(&fake).await;

    let request = SubscriptionRequest::new("order-1", "PRO-M", 2, 9980, card(), customer())
        .with_metadata(Metadata {
            client_id: Some("c-1".to_string()),
            seller_id: None,
            note: Some("first sale".to_string()),
        });
    let response = client.create_subscription(&request).await.unwrap();

    assert_eq!(response.id, "sub_1");
    assert!(response.is_approved());

    let (headers, body) = fake.last_api_request.lock().await.clone().unwrap();
    assert_eq!(headers["authorization"], "Bearer tok-1");
    assert_eq!(body["plan_id"], "PRO-M");
    assert_eq!(body["currency"], "BRL");
    assert_eq!(body["card"]["expiry_year"], 2030);
    assert_eq!(body["metadata"], json!({"client_id": "c-1", "note": "first sale"}));
}

#[tokio::test]
async fn calls_reuse_the_cached_token() {
    let fake = Fake::new();
    let client = client_for(&fake).await;

    client.get_subscription("sub_9").await.unwrap();
    let canceled = client.cancel_subscription("sub_9").await.unwrap();
    let updated = client
        .update_subscription(
            "sub_9",
            &UpdateSubscriptionRequest {
                quantity: Some(3),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(canceled.status, "CANCELED");
    assert_eq!(updated.id, "sub_9");
    assert_eq!(fake.api_calls.load(Ordering::SeqCst), 3);
    assert_eq!(fake.token_calls(), 1);

    let (_, body) = fake.last_api_request.lock().await.clone().unwrap();
    assert_eq!(body, json!({"quantity": 3}));
}

#[tokio::test]
async fn charge_rejection_is_an_http_error() {
    let fake = Fake::new();
    let client = client_for(&fake).await;

    let approved = client
        .create_charge(&ChargeRequest::new("order-1", 4990, card(), customer()))
        .await
        .unwrap();
    assert!(approved.is_approved());

    let err = client
        .create_charge(&ChargeRequest::new("order-2", 666, card(), customer()))
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(422));
}

#[tokio::test]
async fn declined_charge_keeps_error_message() {
    let fake = Fake::new();
    let client = client_for(&fake).await;

    let charge = client.get_charge("ch_7").await.unwrap();
    assert!(!charge.is_approved());
    assert_eq!(charge.error_message.as_deref(), Some("insufficient funds"));
}

#[tokio::test]
async fn malformed_body_is_a_decode_error() {
    let fake = Fake::new();
    let client = client_for(&fake).await;

    let err = client.get_charge("garbled").await.unwrap_err();
    assert!(matches!(err, GatewayError::Decode(_)), "{err:?}");
}

#[tokio::test]
async fn slow_gateway_times_out() {
    let fake = Fake::new();
    let base = spawn(fake.clone()).await;
    let config = GatewayConfig::new(base, "id", "secret").with_timeout(Duration::from_millis(300));
    let client = GatewayClient::new(config).unwrap();

    let err = client.get_charge("slow").await.unwrap_err();
    assert!(matches!(err, GatewayError::Timeout), "{err:?}");
}
