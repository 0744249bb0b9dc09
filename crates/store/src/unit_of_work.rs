//! Transaction boundary around business-store writes.

use async_trait::async_trait;

use crate::Result;
use crate::repository::{
    AddressRepository, ClientRepository, CorporatePersonRepository, IndividualPersonRepository,
    OrderRepository, PaymentRecordRepository, PlanRepository, ProfileRepository, RoleRepository,
    SellerRepository,
};

/// A connection to the business store with at most one open transaction.
///
/// Repository calls made while a transaction is open become visible to other
/// units of work only after [`commit`](UnitOfWork::commit). Calls made with no
/// transaction open are applied immediately.
#[async_trait]
pub trait UnitOfWork:
    AddressRepository
    + ProfileRepository
    + IndividualPersonRepository
    + CorporatePersonRepository
    + RoleRepository
    + ClientRepository
    + SellerRepository
    + PlanRepository
    + OrderRepository
    + PaymentRecordRepository
    + Send
{
    /// Opens a transaction. Fails with `TransactionAlreadyOpen` if one is open.
    async fn begin(&mut self) -> Result<()>;

    /// Flushes pending writes and commits. No-op without an open transaction.
    ///
    /// The transaction is closed afterwards whether or not the commit succeeded.
    async fn commit(&mut self) -> Result<()>;

    /// Discards pending writes. No-op without an open transaction.
    async fn rollback(&mut self) -> Result<()>;

    fn in_transaction(&self) -> bool;
}

/// Hands out units of work over a shared pool or in-memory state.
pub trait BusinessStore: Clone + Send + Sync + 'static {
    type UnitOfWork: UnitOfWork + 'static;

    fn unit_of_work(&self) -> Self::UnitOfWork;
}
