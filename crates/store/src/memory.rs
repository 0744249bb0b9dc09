use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use async_trait::async_trait;
use common::{OrderId, PersonId, PlanId};
use domain::{
    Address, Client, CorporatePerson, IndividualPerson, Order, PaymentRecord, Plan, Profile,
    Role, Seller, TaxId,
};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::constraints;
use crate::repository::{
    AddressRepository, ClientRepository, CorporatePersonRepository, IndividualPersonRepository,
    OrderRepository, PaymentRecordRepository, PlanRepository, ProfileRepository, RoleRepository,
    SellerRepository,
};
use crate::unit_of_work::{BusinessStore, UnitOfWork};
use crate::{Result, StoreError};

/// Business-store tables, used to target injected failures and counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Address,
    Profile,
    IndividualPerson,
    CorporatePerson,
    Role,
    Client,
    Seller,
    Plan,
    Order,
    PaymentRecord,
}

impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Address => "addresses",
            Table::Profile => "profiles",
            Table::IndividualPerson => "individual_persons",
            Table::CorporatePerson => "corporate_persons",
            Table::Role => "roles",
            Table::Client => "clients",
            Table::Seller => "sellers",
            Table::Plan => "plans",
            Table::Order => "orders",
            Table::PaymentRecord => "payment_records",
        }
    }
}

#[derive(Debug, Clone, Default)]
struct Tables {
    addresses: HashMap<Uuid, Address>,
    profiles: HashMap<PersonId, Profile>,
    individuals: HashMap<PersonId, IndividualPerson>,
    corporates: HashMap<PersonId, CorporatePerson>,
    roles: HashMap<Uuid, Role>,
    clients: HashMap<PersonId, Client>,
    sellers: HashMap<PersonId, Seller>,
    plans: HashMap<PlanId, Plan>,
    orders: HashMap<OrderId, Order>,
    payments: HashMap<Uuid, PaymentRecord>,
}

/// A single row mutation, replayed against the shared tables on commit.
#[derive(Debug, Clone)]
enum Write {
    InsertAddress(Address),
    UpdateAddress(Address),
    InsertProfile(Profile),
    UpdateProfile(Profile),
    InsertIndividual(IndividualPerson),
    DeleteIndividual(PersonId),
    InsertCorporate(CorporatePerson),
    DeleteCorporate(PersonId),
    InsertRole(Role),
    InsertClient(Client),
    UpdateClient(Client),
    InsertSeller(Seller),
    UpdateSeller(Seller),
    InsertPlan(Plan),
    UpdatePlan(Plan),
    InsertOrder(Order),
    UpdateOrderStatus(Order),
    InsertPayment(PaymentRecord),
}

impl Write {
    /// The table this write inserts into, if it is an insert.
    fn inserted_table(&self) -> Option<Table> {
        match self {
            Write::InsertAddress(_) => Some(Table::Address),
            Write::InsertProfile(_) => Some(Table::Profile),
            Write::InsertIndividual(_) => Some(Table::IndividualPerson),
            Write::InsertCorporate(_) => Some(Table::CorporatePerson),
            Write::InsertRole(_) => Some(Table::Role),
            Write::InsertClient(_) => Some(Table::Client),
            Write::InsertSeller(_) => Some(Table::Seller),
            Write::InsertPlan(_) => Some(Table::Plan),
            Write::InsertOrder(_) => Some(Table::Order),
            Write::InsertPayment(_) => Some(Table::PaymentRecord),
            _ => None,
        }
    }
}

fn insert_new<K: Eq + Hash, V>(
    map: &mut HashMap<K, V>,
    key: K,
    value: V,
    table: Table,
) -> Result<()> {
    if map.contains_key(&key) {
        return Err(StoreError::unique(&format!("{}_pkey", table.as_str())));
    }
    map.insert(key, value);
    Ok(())
}

fn replace_existing<K: Eq + Hash + std::fmt::Display, V>(
    map: &mut HashMap<K, V>,
    key: K,
    value: V,
    entity: &'static str,
) -> Result<()> {
    match map.get_mut(&key) {
        Some(slot) => {
            *slot = value;
            Ok(())
        }
        None => Err(StoreError::NotFound {
            entity,
            id: key.to_string(),
        }),
    }
}

impl Tables {
    fn require_profile(&self, id: PersonId, constraint: &str) -> Result<()> {
        if self.profiles.contains_key(&id) {
            Ok(())
        } else {
            Err(StoreError::foreign_key(constraint))
        }
    }

    fn require_seller(&self, id: Option<PersonId>, constraint: &str) -> Result<()> {
        match id {
            Some(id) if !self.sellers.contains_key(&id) => Err(StoreError::foreign_key(constraint)),
            _ => Ok(()),
        }
    }

    /// Applies one write, enforcing the same constraints as the SQL schema.
    fn apply(&mut self, write: Write) -> Result<()> {
        match write {
            Write::InsertAddress(a) => insert_new(&mut self.addresses, a.id, a, Table::Address),
            Write::UpdateAddress(a) => replace_existing(&mut self.addresses, a.id, a, "Address"),
            Write::InsertProfile(p) => {
                if let Some(address_id) = p.address_id
                    && !self.addresses.contains_key(&address_id)
                {
                    return Err(StoreError::foreign_key("profiles_address_id_fkey"));
                }
                insert_new(&mut self.profiles, p.id, p, Table::Profile)
            }
            Write::UpdateProfile(p) => {
                if let Some(address_id) = p.address_id
                    && !self.addresses.contains_key(&address_id)
                {
                    return Err(StoreError::foreign_key("profiles_address_id_fkey"));
                }
                replace_existing(&mut self.profiles, p.id, p, "Profile")
            }
            Write::InsertIndividual(p) => {
                self.require_profile(p.id, "individual_persons_id_fkey")?;
                if self.individuals.values().any(|o| o.tax_id == p.tax_id) {
                    return Err(StoreError::unique(constraints::INDIVIDUAL_TAX_ID));
                }
                insert_new(&mut self.individuals, p.id, p, Table::IndividualPerson)
            }
            Write::DeleteIndividual(id) => {
                self.individuals.remove(&id);
                Ok(())
            }
            Write::InsertCorporate(p) => {
                self.require_profile(p.id, "corporate_persons_id_fkey")?;
                if self.corporates.values().any(|o| o.tax_id == p.tax_id) {
                    return Err(StoreError::unique(constraints::CORPORATE_TAX_ID));
                }
                insert_new(&mut self.corporates, p.id, p, Table::CorporatePerson)
            }
            Write::DeleteCorporate(id) => {
                self.corporates.remove(&id);
                Ok(())
            }
            Write::InsertRole(r) => {
                self.require_profile(r.profile_id, "roles_profile_id_fkey")?;
                if self
                    .roles
                    .values()
                    .any(|o| o.profile_id == r.profile_id && o.kind == r.kind)
                {
                    return Err(StoreError::unique(constraints::ROLE_PER_KIND));
                }
                insert_new(&mut self.roles, r.id, r, Table::Role)
            }
            Write::InsertClient(c) => {
                self.require_profile(c.id, "clients_id_fkey")?;
                self.require_seller(c.seller_id, "clients_seller_id_fkey")?;
                insert_new(&mut self.clients, c.id, c, Table::Client)
            }
            Write::UpdateClient(c) => {
                self.require_seller(c.seller_id, "clients_seller_id_fkey")?;
                replace_existing(&mut self.clients, c.id, c, "Client")
            }
            Write::InsertSeller(s) => {
                self.require_profile(s.id, "sellers_id_fkey")?;
                self.require_seller(s.parent_seller_id, "sellers_parent_seller_id_fkey")?;
                insert_new(&mut self.sellers, s.id, s, Table::Seller)
            }
            Write::UpdateSeller(s) => {
                self.require_seller(s.parent_seller_id, "sellers_parent_seller_id_fkey")?;
                replace_existing(&mut self.sellers, s.id, s, "Seller")
            }
            Write::InsertPlan(p) => {
                if self.plans.values().any(|o| o.code == p.code) {
                    return Err(StoreError::unique(constraints::PLAN_CODE));
                }
                insert_new(&mut self.plans, p.id, p, Table::Plan)
            }
            Write::UpdatePlan(p) => {
                if self.plans.values().any(|o| o.code == p.code && o.id != p.id) {
                    return Err(StoreError::unique(constraints::PLAN_CODE));
                }
                replace_existing(&mut self.plans, p.id, p, "Plan")
            }
            Write::InsertOrder(o) => {
                if !self.plans.contains_key(&o.plan_id) {
                    return Err(StoreError::foreign_key("orders_plan_id_fkey"));
                }
                if let Some(client_id) = o.client_id
                    && !self.clients.contains_key(&client_id)
                {
                    return Err(StoreError::foreign_key("orders_client_id_fkey"));
                }
                self.require_seller(o.seller_id, "orders_seller_id_fkey")?;
                insert_new(&mut self.orders, o.id, o, Table::Order)
            }
            Write::UpdateOrderStatus(o) => match self.orders.get_mut(&o.id) {
                Some(stored) => {
                    stored.status = o.status;
                    stored.gateway_reference = o.gateway_reference;
                    stored.failure_reason = o.failure_reason;
                    stored.updated_at = o.updated_at;
                    Ok(())
                }
                None => Err(StoreError::NotFound {
                    entity: "Order",
                    id: o.id.to_string(),
                }),
            },
            Write::InsertPayment(p) => {
                if !self.orders.contains_key(&p.order_id) {
                    return Err(StoreError::foreign_key("payment_records_order_id_fkey"));
                }
                insert_new(&mut self.payments, p.id, p, Table::PaymentRecord)
            }
        }
    }

    fn count(&self, table: Table) -> usize {
        match table {
            Table::Address => self.addresses.len(),
            Table::Profile => self.profiles.len(),
            Table::IndividualPerson => self.individuals.len(),
            Table::CorporatePerson => self.corporates.len(),
            Table::Role => self.roles.len(),
            Table::Client => self.clients.len(),
            Table::Seller => self.sellers.len(),
            Table::Plan => self.plans.len(),
            Table::Order => self.orders.len(),
            Table::PaymentRecord => self.payments.len(),
        }
    }
}

#[derive(Debug, Default)]
struct Faults {
    fail_on_insert: Option<Table>,
    fail_on_commit: bool,
}

/// In-memory business store for testing.
///
/// Each unit of work stages its transaction on a private copy of the tables
/// and replays the recorded writes onto the shared tables on commit, so a
/// failed commit leaves nothing behind.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
    faults: Arc<RwLock<Faults>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every insert into `table` fail until faults are cleared.
    pub async fn fail_on_insert(&self, table: Table) {
        self.faults.write().await.fail_on_insert = Some(table);
    }

    /// Makes every commit fail until faults are cleared.
    pub async fn fail_on_commit(&self, fail: bool) {
        self.faults.write().await.fail_on_commit = fail;
    }

    pub async fn clear_faults(&self) {
        *self.faults.write().await = Faults::default();
    }

    /// Returns the number of committed rows in `table`.
    pub async fn count(&self, table: Table) -> usize {
        self.tables.read().await.count(table)
    }
}

impl BusinessStore for InMemoryStore {
    type UnitOfWork = InMemoryUnitOfWork;

    fn unit_of_work(&self) -> InMemoryUnitOfWork {
        InMemoryUnitOfWork {
            shared: self.tables.clone(),
            faults: self.faults.clone(),
            tx: None,
        }
    }
}

struct Staged {
    tables: Tables,
    log: Vec<Write>,
}

/// Unit of work over an [`InMemoryStore`].
pub struct InMemoryUnitOfWork {
    shared: Arc<RwLock<Tables>>,
    faults: Arc<RwLock<Faults>>,
    tx: Option<Staged>,
}

impl InMemoryUnitOfWork {
    async fn write(&mut self, write: Write) -> Result<()> {
        if let Some(table) = write.inserted_table()
            && self.faults.read().await.fail_on_insert == Some(table)
        {
            return Err(StoreError::Injected(format!("insert into {}", table.as_str())));
        }

        match self.tx.as_mut() {
            Some(staged) => {
                staged.tables.apply(write.clone())?;
                staged.log.push(write);
                Ok(())
            }
            None => self.shared.write().await.apply(write),
        }
    }

    async fn read<T, F>(&self, f: F) -> T
    where
        T: Send,
        F: FnOnce(&Tables) -> T + Send,
    {
        match self.tx.as_ref() {
            Some(staged) => f(&staged.tables),
            None => f(&*self.shared.read().await),
        }
    }
}

#[async_trait]
impl UnitOfWork for InMemoryUnitOfWork {
    async fn begin(&mut self) -> Result<()> {
        if self.tx.is_some() {
            return Err(StoreError::TransactionAlreadyOpen);
        }
        let tables = self.shared.read().await.clone();
        self.tx = Some(Staged {
            tables,
            log: Vec::new(),
        });
        tracing::debug!("transaction opened");
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        let Some(staged) = self.tx.take() else {
            return Ok(());
        };
        if self.faults.read().await.fail_on_commit {
            tracing::warn!("transaction commit failed (injected)");
            return Err(StoreError::Injected("commit".to_string()));
        }

        // Replay onto a copy so constraint failures caused by concurrent
        // commits leave the shared tables untouched.
        let writes = staged.log.len();
        let mut shared = self.shared.write().await;
        let mut next = shared.clone();
        for write in staged.log {
            if let Err(e) = next.apply(write) {
                tracing::warn!(error = %e, "transaction commit failed");
                return Err(e);
            }
        }
        *shared = next;
        tracing::debug!(writes, "transaction committed");
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        if let Some(staged) = self.tx.take() {
            tracing::debug!(discarded = staged.log.len(), "transaction rolled back");
        }
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        self.tx.is_some()
    }
}

#[async_trait]
impl AddressRepository for InMemoryUnitOfWork {
    async fn insert_address(&mut self, address: &Address) -> Result<()> {
        self.write(Write::InsertAddress(address.clone())).await
    }

    async fn update_address(&mut self, address: &Address) -> Result<()> {
        self.write(Write::UpdateAddress(address.clone())).await
    }

    async fn find_address(&mut self, id: Uuid) -> Result<Option<Address>> {
        Ok(self.read(|t| t.addresses.get(&id).cloned()).await)
    }
}

#[async_trait]
impl ProfileRepository for InMemoryUnitOfWork {
    async fn insert_profile(&mut self, profile: &Profile) -> Result<()> {
        self.write(Write::InsertProfile(profile.clone())).await
    }

    async fn update_profile(&mut self, profile: &Profile) -> Result<()> {
        self.write(Write::UpdateProfile(profile.clone())).await
    }

    async fn find_profile(&mut self, id: PersonId) -> Result<Option<Profile>> {
        Ok(self.read(|t| t.profiles.get(&id).cloned()).await)
    }
}

#[async_trait]
impl IndividualPersonRepository for InMemoryUnitOfWork {
    async fn insert_individual(&mut self, person: &IndividualPerson) -> Result<()> {
        self.write(Write::InsertIndividual(person.clone())).await
    }

    async fn find_individual(&mut self, id: PersonId) -> Result<Option<IndividualPerson>> {
        Ok(self.read(|t| t.individuals.get(&id).cloned()).await)
    }

    async fn find_individual_by_tax_id(
        &mut self,
        tax_id: &TaxId,
    ) -> Result<Option<IndividualPerson>> {
        Ok(self
            .read(|t| t.individuals.values().find(|p| &p.tax_id == tax_id).cloned())
            .await)
    }

    async fn delete_individual(&mut self, id: PersonId) -> Result<bool> {
        let existed = self.read(|t| t.individuals.contains_key(&id)).await;
        if existed {
            self.write(Write::DeleteIndividual(id)).await?;
        }
        Ok(existed)
    }
}

#[async_trait]
impl CorporatePersonRepository for InMemoryUnitOfWork {
    async fn insert_corporate(&mut self, person: &CorporatePerson) -> Result<()> {
        self.write(Write::InsertCorporate(person.clone())).await
    }

    async fn find_corporate(&mut self, id: PersonId) -> Result<Option<CorporatePerson>> {
        Ok(self.read(|t| t.corporates.get(&id).cloned()).await)
    }

    async fn find_corporate_by_tax_id(
        &mut self,
        tax_id: &TaxId,
    ) -> Result<Option<CorporatePerson>> {
        Ok(self
            .read(|t| t.corporates.values().find(|p| &p.tax_id == tax_id).cloned())
            .await)
    }

    async fn delete_corporate(&mut self, id: PersonId) -> Result<bool> {
        let existed = self.read(|t| t.corporates.contains_key(&id)).await;
        if existed {
            self.write(Write::DeleteCorporate(id)).await?;
        }
        Ok(existed)
    }
}

#[async_trait]
impl RoleRepository for InMemoryUnitOfWork {
    async fn insert_role(&mut self, role: &Role) -> Result<()> {
        self.write(Write::InsertRole(role.clone())).await
    }

    async fn find_roles(&mut self, profile_id: PersonId) -> Result<Vec<Role>> {
        let mut roles: Vec<Role> = self
            .read(|t| {
                t.roles
                    .values()
                    .filter(|r| r.profile_id == profile_id)
                    .cloned()
                    .collect()
            })
            .await;
        roles.sort_by_key(|r| r.created_at);
        Ok(roles)
    }
}

#[async_trait]
impl ClientRepository for InMemoryUnitOfWork {
    async fn insert_client(&mut self, client: &Client) -> Result<()> {
        self.write(Write::InsertClient(client.clone())).await
    }

    async fn update_client(&mut self, client: &Client) -> Result<()> {
        self.write(Write::UpdateClient(client.clone())).await
    }

    async fn find_client(&mut self, id: PersonId) -> Result<Option<Client>> {
        Ok(self.read(|t| t.clients.get(&id).cloned()).await)
    }
}

#[async_trait]
impl SellerRepository for InMemoryUnitOfWork {
    async fn insert_seller(&mut self, seller: &Seller) -> Result<()> {
        self.write(Write::InsertSeller(seller.clone())).await
    }

    async fn update_seller(&mut self, seller: &Seller) -> Result<()> {
        self.write(Write::UpdateSeller(seller.clone())).await
    }

    async fn find_seller(&mut self, id: PersonId) -> Result<Option<Seller>> {
        Ok(self.read(|t| t.sellers.get(&id).cloned()).await)
    }
}

#[async_trait]
impl PlanRepository for InMemoryUnitOfWork {
    async fn insert_plan(&mut self, plan: &Plan) -> Result<()> {
        self.write(Write::InsertPlan(plan.clone())).await
    }

    async fn update_plan(&mut self, plan: &Plan) -> Result<()> {
        self.write(Write::UpdatePlan(plan.clone())).await
    }

    async fn find_plan(&mut self, id: PlanId) -> Result<Option<Plan>> {
        Ok(self.read(|t| t.plans.get(&id).cloned()).await)
    }

    async fn find_plan_by_code(&mut self, code: &str) -> Result<Option<Plan>> {
        Ok(self
            .read(|t| t.plans.values().find(|p| p.code == code).cloned())
            .await)
    }
}

#[async_trait]
impl OrderRepository for InMemoryUnitOfWork {
    async fn insert_order(&mut self, order: &Order) -> Result<()> {
        self.write(Write::InsertOrder(order.clone())).await
    }

    async fn update_order_status(&mut self, order: &Order) -> Result<()> {
        self.write(Write::UpdateOrderStatus(order.clone())).await
    }

    async fn find_order(&mut self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.read(|t| t.orders.get(&id).cloned()).await)
    }
}

#[async_trait]
impl PaymentRecordRepository for InMemoryUnitOfWork {
    async fn insert_payment(&mut self, payment: &PaymentRecord) -> Result<()> {
        self.write(Write::InsertPayment(payment.clone())).await
    }

    async fn find_payments(&mut self, order_id: OrderId) -> Result<Vec<PaymentRecord>> {
        let mut payments: Vec<PaymentRecord> = self
            .read(|t| {
                t.payments
                    .values()
                    .filter(|p| p.order_id == order_id)
                    .cloned()
                    .collect()
            })
            .await;
        payments.sort_by_key(|p| p.paid_at);
        Ok(payments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::PersonRepositoryExt;
    use chrono::Utc;
    use domain::{Money, Person, PersonKind, UserKind};

    fn profile() -> Profile {
        let now = Utc::now();
        Profile {
            id: PersonId::new(),
            name: "Ana".to_string(),
            address_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn individual(id: PersonId, tax_id: &str) -> IndividualPerson {
        IndividualPerson {
            id,
            tax_id: TaxId::parse(tax_id, PersonKind::Individual).unwrap(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn writes_without_transaction_apply_immediately() {
        let store = InMemoryStore::new();
        let mut uow = store.unit_of_work();

        uow.insert_profile(&profile()).await.unwrap();

        assert!(!uow.in_transaction());
        assert_eq!(store.count(Table::Profile).await, 1);
    }

    #[tokio::test]
    async fn transaction_writes_hidden_until_commit() {
        let store = InMemoryStore::new();
        let mut uow = store.unit_of_work();
        let p = profile();

        uow.begin().await.unwrap();
        uow.insert_profile(&p).await.unwrap();

        // Visible inside the transaction, not outside it.
        assert!(uow.find_profile(p.id).await.unwrap().is_some());
        assert_eq!(store.count(Table::Profile).await, 0);
        let mut other = store.unit_of_work();
        assert!(other.find_profile(p.id).await.unwrap().is_none());

        uow.commit().await.unwrap();
        assert_eq!(store.count(Table::Profile).await, 1);
        assert!(!uow.in_transaction());
    }

    #[tokio::test]
    async fn rollback_discards_writes() {
        let store = InMemoryStore::new();
        let mut uow = store.unit_of_work();

        uow.begin().await.unwrap();
        uow.insert_profile(&profile()).await.unwrap();
        uow.rollback().await.unwrap();

        assert_eq!(store.count(Table::Profile).await, 0);
    }

    #[tokio::test]
    async fn commit_and_rollback_without_transaction_are_noops() {
        let store = InMemoryStore::new();
        let mut uow = store.unit_of_work();
        uow.commit().await.unwrap();
        uow.rollback().await.unwrap();
        uow.rollback().await.unwrap();
    }

    #[tokio::test]
    async fn second_begin_fails() {
        let store = InMemoryStore::new();
        let mut uow = store.unit_of_work();
        uow.begin().await.unwrap();
        assert!(matches!(
            uow.begin().await,
            Err(StoreError::TransactionAlreadyOpen)
        ));
    }

    #[tokio::test]
    async fn tax_id_must_be_unique() {
        let store = InMemoryStore::new();
        let mut uow = store.unit_of_work();
        let (a, b) = (profile(), profile());
        uow.insert_profile(&a).await.unwrap();
        uow.insert_profile(&b).await.unwrap();

        uow.insert_individual(&individual(a.id, "52998224725"))
            .await
            .unwrap();
        let err = uow
            .insert_individual(&individual(b.id, "52998224725"))
            .await
            .unwrap_err();
        assert_eq!(err.unique_constraint(), Some(constraints::INDIVIDUAL_TAX_ID));
    }

    #[tokio::test]
    async fn conflicting_commits_leave_first_writer_intact() {
        let store = InMemoryStore::new();
        let mut setup = store.unit_of_work();
        let (a, b) = (profile(), profile());
        setup.insert_profile(&a).await.unwrap();
        setup.insert_profile(&b).await.unwrap();

        let mut first = store.unit_of_work();
        let mut second = store.unit_of_work();
        first.begin().await.unwrap();
        second.begin().await.unwrap();
        first
            .insert_individual(&individual(a.id, "52998224725"))
            .await
            .unwrap();
        second
            .insert_individual(&individual(b.id, "52998224725"))
            .await
            .unwrap();

        first.commit().await.unwrap();
        let err = second.commit().await.unwrap_err();

        assert!(err.unique_constraint().is_some());
        assert_eq!(store.count(Table::IndividualPerson).await, 1);
        let mut check = store.unit_of_work();
        assert!(check.find_individual(a.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn person_requires_profile() {
        let store = InMemoryStore::new();
        let mut uow = store.unit_of_work();
        let err = uow
            .insert_individual(&individual(PersonId::new(), "52998224725"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ForeignKeyViolation { .. }));
    }

    #[tokio::test]
    async fn role_is_unique_per_kind() {
        let store = InMemoryStore::new();
        let mut uow = store.unit_of_work();
        let p = profile();
        uow.insert_profile(&p).await.unwrap();

        uow.insert_role(&Role::new(p.id, UserKind::Client, Utc::now()))
            .await
            .unwrap();
        uow.insert_role(&Role::new(p.id, UserKind::Seller, Utc::now()))
            .await
            .unwrap();
        let err = uow
            .insert_role(&Role::new(p.id, UserKind::Client, Utc::now()))
            .await
            .unwrap_err();

        assert_eq!(err.unique_constraint(), Some(constraints::ROLE_PER_KIND));
        assert_eq!(uow.find_roles(p.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn person_union_swaps_kind() {
        let store = InMemoryStore::new();
        let mut uow = store.unit_of_work();
        let p = profile();
        uow.insert_profile(&p).await.unwrap();
        uow.insert_person(&Person::Individual(individual(p.id, "52998224725")))
            .await
            .unwrap();

        assert!(uow.delete_person(p.id).await.unwrap());
        let corporate = Person::new(
            p.id,
            PersonKind::Corporate,
            TaxId::parse("11222333000181", PersonKind::Corporate).unwrap(),
            "ACME",
            None,
            Utc::now(),
        );
        uow.insert_person(&corporate).await.unwrap();

        let found = uow.find_person(p.id).await.unwrap().unwrap();
        assert_eq!(found.kind(), PersonKind::Corporate);
        assert_eq!(store.count(Table::IndividualPerson).await, 0);
    }

    #[tokio::test]
    async fn order_status_update_keeps_snapshot() {
        let store = InMemoryStore::new();
        let mut uow = store.unit_of_work();
        let plan = Plan::new("PRO", "Pro", Money::from_units(100));
        uow.insert_plan(&plan).await.unwrap();

        let mut order = Order::place(&plan, 1, None, None).unwrap();
        uow.insert_order(&order).await.unwrap();

        order.plan.price = Money::from_units(1);
        order.approve(Some("sub_1".to_string())).unwrap();
        uow.update_order_status(&order).await.unwrap();

        let stored = uow.find_order(order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, domain::OrderStatus::Approved);
        assert_eq!(stored.plan.price, Money::from_units(100));
    }

    #[tokio::test]
    async fn injected_insert_failure() {
        let store = InMemoryStore::new();
        store.fail_on_insert(Table::Profile).await;
        let mut uow = store.unit_of_work();
        assert!(matches!(
            uow.insert_profile(&profile()).await,
            Err(StoreError::Injected(_))
        ));

        store.clear_faults().await;
        uow.insert_profile(&profile()).await.unwrap();
    }

    #[tokio::test]
    async fn injected_commit_failure_closes_transaction() {
        let store = InMemoryStore::new();
        store.fail_on_commit(true).await;
        let mut uow = store.unit_of_work();
        uow.begin().await.unwrap();
        uow.insert_profile(&profile()).await.unwrap();

        assert!(uow.commit().await.is_err());
        assert!(!uow.in_transaction());
        assert_eq!(store.count(Table::Profile).await, 0);
    }
}
