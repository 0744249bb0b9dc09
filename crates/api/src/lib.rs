//! HTTP command surface for client/seller provisioning and plan sales.
//!
//! Handlers decode the request, call the saga or the sale processor and
//! answer with the `{status, message, data}` envelope. Structured logging
//! comes from `tracing`, Prometheus metrics from `GET /metrics`.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use metrics_exporter_prometheus::PrometheusHandle;
use saga::{CredentialStore, PaymentGateway, ProvisioningSaga, SaleProcessor};
use store::BusinessStore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state accessible from all handlers.
pub struct AppState<S, C, P> {
    pub provisioning: ProvisioningSaga<S, C>,
    pub sales: SaleProcessor<S, C, P>,
}

impl<S, C, P> AppState<S, C, P>
where
    S: BusinessStore,
    C: CredentialStore + Clone + 'static,
    P: PaymentGateway + 'static,
{
    /// Wires both orchestrators to the same stores.
    pub fn new(store: S, credentials: C, gateway: P) -> Arc<Self> {
        Arc::new(Self {
            provisioning: ProvisioningSaga::new(store.clone(), credentials.clone()),
            sales: SaleProcessor::new(store, credentials, gateway),
        })
    }
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S, C, P>(
    state: Arc<AppState<S, C, P>>,
    metrics_handle: PrometheusHandle,
) -> Router
where
    S: BusinessStore,
    C: CredentialStore + Clone + 'static,
    P: PaymentGateway + 'static,
{
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/clients", post(routes::people::create_client::<S, C, P>))
        .route("/clients/{id}", put(routes::people::update_client::<S, C, P>))
        .route("/sellers", post(routes::people::create_seller::<S, C, P>))
        .route("/sellers/{id}", put(routes::people::update_seller::<S, C, P>))
        .route("/sales", post(routes::sales::process::<S, C, P>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
