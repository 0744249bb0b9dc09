use std::time::Duration;

/// Connection settings for the payment gateway.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub client_id: String,
    pub client_secret: String,
    /// Sent as `X-Partner-Key` on the token request when present.
    pub partner_key: Option<String>,
    pub scope: String,
    pub timeout: Duration,
    /// Tokens are dropped this long before they actually expire.
    pub token_margin: Duration,
}

impl GatewayConfig {
    pub const MIN_TOKEN_MARGIN: Duration = Duration::from_secs(30);

    pub fn new(
        base_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            partner_key: None,
            scope: "charges subscriptions".to_string(),
            timeout: Duration::from_secs(30),
            token_margin: Self::MIN_TOKEN_MARGIN,
        }
    }

    /// Loads configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::new(
            std::env::var("GATEWAY_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8081".to_string()),
            std::env::var("GATEWAY_CLIENT_ID").unwrap_or_default(),
            std::env::var("GATEWAY_CLIENT_SECRET").unwrap_or_default(),
        );

        config.partner_key = std::env::var("GATEWAY_PARTNER_KEY")
            .ok()
            .filter(|k| !k.is_empty());
        if let Ok(scope) = std::env::var("GATEWAY_SCOPE") {
            config.scope = scope;
        }
        if let Some(secs) = std::env::var("GATEWAY_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = std::env::var("GATEWAY_TOKEN_MARGIN_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            config = config.with_token_margin(Duration::from_secs(secs));
        }
        config
    }

    pub fn with_partner_key(mut self, key: impl Into<String>) -> Self {
        self.partner_key = Some(key.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the expiry margin, never below [`Self::MIN_TOKEN_MARGIN`].
    pub fn with_token_margin(mut self, margin: Duration) -> Self {
        self.token_margin = margin.max(Self::MIN_TOKEN_MARGIN);
        self
    }
}
