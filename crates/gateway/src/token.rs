use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// A bearer token held in process memory only.
#[derive(Clone)]
pub struct GatewayToken {
    pub access_token: String,
    pub token_type: String,
    pub issued_at: DateTime<Utc>,
    pub ttl: Duration,
}

impl GatewayToken {
    /// True while `now < issued_at + ttl - margin`.
    pub fn is_valid(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        let Some(usable) = self.ttl.checked_sub(margin) else {
            return false;
        };
        match chrono::Duration::from_std(usable) {
            Ok(usable) => now < self.issued_at + usable,
            Err(_) => false,
        }
    }

    pub(crate) fn from_response(response: TokenResponse, issued_at: DateTime<Utc>) -> Self {
        Self {
            access_token: response.access_token,
            token_type: response.token_type,
            issued_at,
            ttl: Duration::from_secs(response.expires_in),
        }
    }
}

impl std::fmt::Debug for GatewayToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayToken")
            .field("access_token", &"***")
            .field("token_type", &self.token_type)
            .field("issued_at", &self.issued_at)
            .field("ttl", &self.ttl)
            .finish()
    }
}

/// Body of a successful `POST /token`.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    pub expires_in: u64,
    #[serde(default = "default_token_type")]
    pub token_type: String,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(ttl_secs: u64) -> GatewayToken {
        GatewayToken {
            access_token: "abc".to_string(),
            token_type: "Bearer".to_string(),
            issued_at: Utc::now(),
            ttl: Duration::from_secs(ttl_secs),
        }
    }

    #[test]
    fn test_valid_within_window() {
        let t = token(3600);
        let margin = Duration::from_secs(30);
        assert!(t.is_valid(t.issued_at, margin));
        assert!(t.is_valid(t.issued_at + chrono::Duration::seconds(3569), margin));
    }

    #[test]
    fn test_invalid_inside_margin() {
        let t = token(3600);
        let margin = Duration::from_secs(30);
        assert!(!t.is_valid(t.issued_at + chrono::Duration::seconds(3570), margin));
        assert!(!t.is_valid(t.issued_at + chrono::Duration::seconds(4000), margin));
    }

    #[test]
    fn test_ttl_shorter_than_margin_is_never_valid() {
        let t = token(20);
        assert!(!t.is_valid(t.issued_at, Duration::from_secs(30)));
    }

    #[test]
    fn test_debug_hides_token() {
        let rendered = format!("{:?}", token(60));
        assert!(!rendered.contains("abc"));
    }
}
