//! Domain layer for client/seller provisioning and plan sales.
//!
//! This crate provides:
//! - People and their business records (profile, address, person, role, client, seller)
//! - Value objects (`Money`, `TaxId`, `CommissionRate`)
//! - Plans and the order state machine with its plan snapshot
//! - Command shapes and their input validation

pub mod commands;
pub mod error;
pub mod order;
pub mod person;
pub mod plan;
pub mod value_objects;

pub use commands::{
    AddressInput, CreateClient, CreateSeller, PersonDetails, ProcessSale, UpdateClient,
    UpdateSeller,
};
pub use error::ValidationError;
pub use order::{Order, OrderError, OrderStatus, PaymentRecord};
pub use person::{
    Address, Client, CorporatePerson, IndividualPerson, Person, PersonKind, Profile, Role, Seller,
    UserKind,
};
pub use plan::{Plan, PlanSnapshot};
pub use value_objects::{CommissionRate, Money, TaxId};
