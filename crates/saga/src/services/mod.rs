//! External collaborators of the saga and in-memory implementations.

pub mod credentials;
pub mod payment;

pub use credentials::{CredentialError, CredentialStore, IdentityAccount, InMemoryCredentialStore};
pub use payment::{InMemoryPaymentGateway, PaymentGateway};
