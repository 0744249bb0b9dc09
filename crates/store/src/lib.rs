//! Relational business store.
//!
//! Repositories are exposed as traits implemented by a [`UnitOfWork`], which
//! owns the transaction boundary. Two backends are provided: an in-memory one
//! used by tests and local runs, and PostgreSQL.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod repository;
pub mod unit_of_work;

pub use error::{Result, StoreError, constraints};
pub use memory::{InMemoryStore, InMemoryUnitOfWork, Table};
pub use postgres::{PgStore, PgUnitOfWork};
pub use repository::{
    AddressRepository, ClientRepository, CorporatePersonRepository, IndividualPersonRepository,
    OrderRepository, PaymentRecordRepository, PersonRepositoryExt, PlanRepository,
    ProfileRepository, RoleRepository, SellerRepository,
};
pub use unit_of_work::{BusinessStore, UnitOfWork};
