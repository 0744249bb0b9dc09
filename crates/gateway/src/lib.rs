//! Client for the third-party payment gateway.
//!
//! [`GatewayClient`] authenticates with client credentials, caches the bearer
//! token for all concurrent callers of one process and exposes the charge and
//! subscription endpoints. Amounts are exchanged in cents.

pub mod card;
pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod token;

pub use card::{Card, CardExpiry};
pub use client::GatewayClient;
pub use config::GatewayConfig;
pub use error::{GatewayError, Result};
pub use models::{
    ChargeRequest, Customer, GatewayResponse, Metadata, SubscriptionRequest,
    UpdateSubscriptionRequest,
};
pub use token::GatewayToken;
