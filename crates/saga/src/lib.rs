//! Orchestration over the credential store, the business store and the
//! payment gateway.
//!
//! - [`ProvisioningSaga`] creates and updates clients and sellers. Business
//!   rows are written in one unit of work; a login account created by a
//!   failed call is deleted again as compensation.
//! - [`SaleProcessor`] snapshots the plan into an order, creates the gateway
//!   subscription and settles the order as approved or rejected.

pub mod error;
pub mod provisioning;
pub mod result;
pub mod sale;
pub mod services;

pub use error::{Result, SagaError};
pub use provisioning::ProvisioningSaga;
pub use result::CommandResult;
pub use sale::SaleProcessor;
pub use services::{
    CredentialError, CredentialStore, IdentityAccount, InMemoryCredentialStore,
    InMemoryPaymentGateway, PaymentGateway,
};
