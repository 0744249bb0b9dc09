//! Repository contracts, one per entity type.
//!
//! Methods take `&mut self` because they run on the connection (or open
//! transaction) owned by a [`UnitOfWork`](crate::UnitOfWork).

use async_trait::async_trait;
use common::{OrderId, PersonId, PlanId};
use domain::{
    Address, Client, CorporatePerson, IndividualPerson, Order, PaymentRecord, Person, PersonKind,
    Plan, Profile, Role, Seller, TaxId,
};
use uuid::Uuid;

use crate::Result;

#[async_trait]
pub trait AddressRepository: Send {
    async fn insert_address(&mut self, address: &Address) -> Result<()>;

    async fn update_address(&mut self, address: &Address) -> Result<()>;

    async fn find_address(&mut self, id: Uuid) -> Result<Option<Address>>;
}

#[async_trait]
pub trait ProfileRepository: Send {
    async fn insert_profile(&mut self, profile: &Profile) -> Result<()>;

    async fn update_profile(&mut self, profile: &Profile) -> Result<()>;

    async fn find_profile(&mut self, id: PersonId) -> Result<Option<Profile>>;
}

#[async_trait]
pub trait IndividualPersonRepository: Send {
    /// Fails with a unique violation if the tax id is already taken.
    async fn insert_individual(&mut self, person: &IndividualPerson) -> Result<()>;

    async fn find_individual(&mut self, id: PersonId) -> Result<Option<IndividualPerson>>;

    async fn find_individual_by_tax_id(&mut self, tax_id: &TaxId)
    -> Result<Option<IndividualPerson>>;

    /// Returns true if a row was deleted.
    async fn delete_individual(&mut self, id: PersonId) -> Result<bool>;
}

#[async_trait]
pub trait CorporatePersonRepository: Send {
    /// Fails with a unique violation if the tax id is already taken.
    async fn insert_corporate(&mut self, person: &CorporatePerson) -> Result<()>;

    async fn find_corporate(&mut self, id: PersonId) -> Result<Option<CorporatePerson>>;

    async fn find_corporate_by_tax_id(&mut self, tax_id: &TaxId)
    -> Result<Option<CorporatePerson>>;

    /// Returns true if a row was deleted.
    async fn delete_corporate(&mut self, id: PersonId) -> Result<bool>;
}

#[async_trait]
pub trait RoleRepository: Send {
    /// Fails with a unique violation if the profile already holds this kind.
    async fn insert_role(&mut self, role: &Role) -> Result<()>;

    async fn find_roles(&mut self, profile_id: PersonId) -> Result<Vec<Role>>;
}

#[async_trait]
pub trait ClientRepository: Send {
    async fn insert_client(&mut self, client: &Client) -> Result<()>;

    async fn update_client(&mut self, client: &Client) -> Result<()>;

    async fn find_client(&mut self, id: PersonId) -> Result<Option<Client>>;
}

#[async_trait]
pub trait SellerRepository: Send {
    async fn insert_seller(&mut self, seller: &Seller) -> Result<()>;

    async fn update_seller(&mut self, seller: &Seller) -> Result<()>;

    async fn find_seller(&mut self, id: PersonId) -> Result<Option<Seller>>;
}

#[async_trait]
pub trait PlanRepository: Send {
    async fn insert_plan(&mut self, plan: &Plan) -> Result<()>;

    async fn update_plan(&mut self, plan: &Plan) -> Result<()>;

    async fn find_plan(&mut self, id: PlanId) -> Result<Option<Plan>>;

    async fn find_plan_by_code(&mut self, code: &str) -> Result<Option<Plan>>;
}

#[async_trait]
pub trait OrderRepository: Send {
    async fn insert_order(&mut self, order: &Order) -> Result<()>;

    /// Persists status, gateway reference and failure reason only. The plan
    /// snapshot, quantity and total written by `insert_order` are never
    /// touched again.
    async fn update_order_status(&mut self, order: &Order) -> Result<()>;

    async fn find_order(&mut self, id: OrderId) -> Result<Option<Order>>;
}

#[async_trait]
pub trait PaymentRecordRepository: Send {
    async fn insert_payment(&mut self, payment: &PaymentRecord) -> Result<()>;

    async fn find_payments(&mut self, order_id: OrderId) -> Result<Vec<PaymentRecord>>;
}

/// Works on the [`Person`] union over the two person tables.
#[async_trait]
pub trait PersonRepositoryExt: IndividualPersonRepository + CorporatePersonRepository {
    /// Loads whichever person record exists for `id`.
    async fn find_person(&mut self, id: PersonId) -> Result<Option<Person>> {
        if let Some(individual) = self.find_individual(id).await? {
            return Ok(Some(Person::Individual(individual)));
        }
        Ok(self.find_corporate(id).await?.map(Person::Corporate))
    }

    async fn insert_person(&mut self, person: &Person) -> Result<()> {
        match person {
            Person::Individual(p) => self.insert_individual(p).await,
            Person::Corporate(p) => self.insert_corporate(p).await,
        }
    }

    /// Deletes the person record of either kind. Returns true if one existed.
    async fn delete_person(&mut self, id: PersonId) -> Result<bool> {
        let individual = self.delete_individual(id).await?;
        let corporate = self.delete_corporate(id).await?;
        Ok(individual || corporate)
    }

    /// Id of the person holding `tax_id` in the table for `kind`.
    async fn tax_id_owner(&mut self, tax_id: &TaxId, kind: PersonKind) -> Result<Option<PersonId>> {
        let owner = match kind {
            PersonKind::Individual => self.find_individual_by_tax_id(tax_id).await?.map(|p| p.id),
            PersonKind::Corporate => self.find_corporate_by_tax_id(tax_id).await?.map(|p| p.id),
        };
        Ok(owner)
    }
}

impl<T: IndividualPersonRepository + CorporatePersonRepository> PersonRepositoryExt for T {}
