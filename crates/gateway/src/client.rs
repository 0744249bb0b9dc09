use std::sync::Arc;

use chrono::Utc;
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::GatewayConfig;
use crate::error::{GatewayError, Result};
use crate::models::{ChargeRequest, GatewayResponse, SubscriptionRequest, UpdateSubscriptionRequest};
use crate::token::{GatewayToken, TokenResponse};

/// HTTP client for the payment gateway.
///
/// Clones share the token cache. The cache is refreshed by the first caller
/// that finds it expired while holding the lock; concurrent callers wait on
/// the lock and reuse the fresh token.
#[derive(Clone)]
pub struct GatewayClient {
    http: reqwest::Client,
    config: Arc<GatewayConfig>,
    token: Arc<Mutex<Option<GatewayToken>>>,
}

impl GatewayClient {
    pub fn new(config: GatewayConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(GatewayError::Network)?;
        Ok(Self {
            http,
            config: Arc::new(config),
            token: Arc::new(Mutex::new(None)),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    /// Returns the cached token, requesting a new one if it is missing or
    /// inside the expiry margin.
    pub async fn get_token(&self) -> Result<GatewayToken> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref()
            && token.is_valid(Utc::now(), self.config.token_margin)
        {
            return Ok(token.clone());
        }

        let fresh = self.request_token().await?;
        *cached = Some(fresh.clone());
        Ok(fresh)
    }

    /// Drops the cached token so the next call authenticates again.
    pub async fn invalidate_token(&self) {
        *self.token.lock().await = None;
    }

    async fn request_token(&self) -> Result<GatewayToken> {
        metrics::counter!("gateway_token_requests_total").increment(1);
        debug!(url = %self.url("/token"), "Requesting gateway token");

        let mut request = self
            .http
            .post(self.url("/token"))
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .json(&serde_json::json!({ "scope": self.config.scope }));
        if let Some(key) = &self.config.partner_key {
            request = request.header("X-Partner-Key", key);
        }

        let issued_at = Utc::now();
        let response = request.send().await?;
        let body: TokenResponse = parse(response).await.inspect_err(|e| {
            warn!(error = %e, "Gateway token request failed");
        })?;

        info!(expires_in = body.expires_in, "Gateway token acquired");
        Ok(GatewayToken::from_response(body, issued_at))
    }

    /// Sends an authenticated request and decodes the JSON body.
    async fn send<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<T> {
        metrics::counter!("gateway_requests_total", "operation" => operation).increment(1);

        let token = self.get_token().await?;
        let response = request.bearer_auth(&token.access_token).send().await?;
        parse(response).await.inspect_err(|e| {
            warn!(operation, error = %e, "Gateway call failed");
        })
    }

    #[tracing::instrument(skip(self, request), fields(external_id = %request.external_id, amount = request.amount))]
    pub async fn create_charge(&self, request: &ChargeRequest) -> Result<GatewayResponse> {
        self.send("create_charge", self.http.post(self.url("/charges")).json(request))
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_charge(&self, id: &str) -> Result<GatewayResponse> {
        self.send("get_charge", self.http.get(self.url(&format!("/charges/{id}"))))
            .await
    }

    #[tracing::instrument(skip(self, request), fields(external_id = %request.external_id, plan_id = %request.plan_id))]
    pub async fn create_subscription(
        &self,
        request: &SubscriptionRequest,
    ) -> Result<GatewayResponse> {
        self.send(
            "create_subscription",
            self.http.post(self.url("/subscriptions")).json(request),
        )
        .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_subscription(&self, id: &str) -> Result<GatewayResponse> {
        self.send(
            "get_subscription",
            self.http.get(self.url(&format!("/subscriptions/{id}"))),
        )
        .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn cancel_subscription(&self, id: &str) -> Result<GatewayResponse> {
        self.send(
            "cancel_subscription",
            self.http
                .post(self.url(&format!("/subscriptions/{id}/cancel"))),
        )
        .await
    }

    #[tracing::instrument(skip(self, request))]
    pub async fn update_subscription(
        &self,
        id: &str,
        request: &UpdateSubscriptionRequest,
    ) -> Result<GatewayResponse> {
        self.send(
            "update_subscription",
            self.http
                .put(self.url(&format!("/subscriptions/{id}")))
                .json(request),
        )
        .await
    }
}

/// Maps non-2xx to [`GatewayError::Http`] and undecodable bodies to
/// [`GatewayError::Decode`].
async fn parse<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(GatewayError::Http {
            status: status.as_u16(),
            body,
        });
    }
    serde_json::from_str(&body).map_err(|e| GatewayError::Decode(e.to_string()))
}
