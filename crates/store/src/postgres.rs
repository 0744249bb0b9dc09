use async_trait::async_trait;
use common::{OrderId, PersonId, PlanId};
use domain::{
    Address, Client, CommissionRate, CorporatePerson, IndividualPerson, Money, Order,
    PaymentRecord, Plan, PlanSnapshot, Profile, Role, Seller, TaxId,
};
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgConnection, PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use crate::repository::{
    AddressRepository, ClientRepository, CorporatePersonRepository, IndividualPersonRepository,
    OrderRepository, PaymentRecordRepository, PlanRepository, ProfileRepository, RoleRepository,
    SellerRepository,
};
use crate::unit_of_work::{BusinessStore, UnitOfWork};
use crate::{Result, StoreError};

/// PostgreSQL-backed business store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Creates a new store over an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects a new pool to `database_url`.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        tracing::info!("business store migrations applied");
        Ok(())
    }
}

impl BusinessStore for PgStore {
    type UnitOfWork = PgUnitOfWork;

    fn unit_of_work(&self) -> PgUnitOfWork {
        PgUnitOfWork {
            pool: self.pool.clone(),
            tx: None,
            conn: None,
        }
    }
}

/// Unit of work holding either an open transaction or a plain pooled
/// connection. An open transaction that is dropped without commit is rolled
/// back by sqlx.
pub struct PgUnitOfWork {
    pool: PgPool,
    tx: Option<Transaction<'static, Postgres>>,
    conn: Option<PoolConnection<Postgres>>,
}

impl PgUnitOfWork {
    async fn executor(&mut self) -> Result<&mut PgConnection> {
        if self.tx.is_none() && self.conn.is_none() {
            self.conn = Some(self.pool.acquire().await?);
        }
        match (self.tx.as_mut(), self.conn.as_mut()) {
            (Some(tx), _) => Ok(&mut **tx),
            (None, Some(conn)) => Ok(&mut **conn),
            (None, None) => Err(StoreError::InvalidData(
                "no connection available".to_string(),
            )),
        }
    }
}

fn parse_column<T>(row: &PgRow, column: &str) -> Result<T>
where
    T: std::str::FromStr<Err = String>,
{
    let raw: String = row.try_get(column)?;
    raw.parse().map_err(StoreError::InvalidData)
}

fn non_negative(value: i32, column: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| StoreError::InvalidData(format!("negative {column}: {value}")))
}

fn row_to_address(row: PgRow) -> Result<Address> {
    Ok(Address {
        id: row.try_get("id")?,
        street: row.try_get("street")?,
        number: row.try_get("number")?,
        complement: row.try_get("complement")?,
        neighborhood: row.try_get("neighborhood")?,
        city: row.try_get("city")?,
        state: row.try_get("state")?,
        postal_code: row.try_get("postal_code")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_profile(row: PgRow) -> Result<Profile> {
    Ok(Profile {
        id: PersonId::from_uuid(row.try_get("id")?),
        name: row.try_get("name")?,
        address_id: row.try_get("address_id")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_individual(row: PgRow) -> Result<IndividualPerson> {
    Ok(IndividualPerson {
        id: PersonId::from_uuid(row.try_get("id")?),
        tax_id: TaxId::from_stored(row.try_get::<String, _>("tax_id")?),
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_corporate(row: PgRow) -> Result<CorporatePerson> {
    Ok(CorporatePerson {
        id: PersonId::from_uuid(row.try_get("id")?),
        tax_id: TaxId::from_stored(row.try_get::<String, _>("tax_id")?),
        legal_name: row.try_get("legal_name")?,
        trade_name: row.try_get("trade_name")?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_role(row: PgRow) -> Result<Role> {
    Ok(Role {
        id: row.try_get("id")?,
        profile_id: PersonId::from_uuid(row.try_get("profile_id")?),
        kind: parse_column(&row, "kind")?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_client(row: PgRow) -> Result<Client> {
    Ok(Client {
        id: PersonId::from_uuid(row.try_get("id")?),
        person_kind: parse_column(&row, "person_kind")?,
        seller_id: row
            .try_get::<Option<Uuid>, _>("seller_id")?
            .map(PersonId::from_uuid),
        active: row.try_get("active")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_seller(row: PgRow) -> Result<Seller> {
    let commission: i32 = row.try_get("commission_bps")?;
    Ok(Seller {
        id: PersonId::from_uuid(row.try_get("id")?),
        person_kind: parse_column(&row, "person_kind")?,
        parent_seller_id: row
            .try_get::<Option<Uuid>, _>("parent_seller_id")?
            .map(PersonId::from_uuid),
        commission: CommissionRate::from_basis_points(non_negative(commission, "commission_bps")?),
        active: row.try_get("active")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_plan(row: PgRow) -> Result<Plan> {
    Ok(Plan {
        id: PlanId::from_uuid(row.try_get("id")?),
        code: row.try_get("code")?,
        description: row.try_get("description")?,
        price: Money::from_cents(row.try_get("price_cents")?),
        active: row.try_get("active")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_order(row: PgRow) -> Result<Order> {
    let quantity: i32 = row.try_get("quantity")?;
    Ok(Order {
        id: OrderId::from_uuid(row.try_get("id")?),
        client_id: row
            .try_get::<Option<Uuid>, _>("client_id")?
            .map(PersonId::from_uuid),
        seller_id: row
            .try_get::<Option<Uuid>, _>("seller_id")?
            .map(PersonId::from_uuid),
        plan_id: PlanId::from_uuid(row.try_get("plan_id")?),
        quantity: non_negative(quantity, "quantity")?,
        plan: PlanSnapshot {
            code: row.try_get("plan_code")?,
            description: row.try_get("plan_description")?,
            price: Money::from_cents(row.try_get("plan_price_cents")?),
        },
        total: Money::from_cents(row.try_get("total_cents")?),
        status: parse_column(&row, "status")?,
        gateway_reference: row.try_get("gateway_reference")?,
        failure_reason: row.try_get("failure_reason")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_payment(row: PgRow) -> Result<PaymentRecord> {
    Ok(PaymentRecord {
        id: row.try_get("id")?,
        order_id: OrderId::from_uuid(row.try_get("order_id")?),
        amount: Money::from_cents(row.try_get("amount_cents")?),
        paid_at: row.try_get("paid_at")?,
        status: row.try_get("status")?,
        method: row.try_get("method")?,
    })
}

fn ensure_updated(rows_affected: u64, entity: &'static str, id: impl ToString) -> Result<()> {
    if rows_affected == 0 {
        return Err(StoreError::NotFound {
            entity,
            id: id.to_string(),
        });
    }
    Ok(())
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn begin(&mut self) -> Result<()> {
        if self.tx.is_some() {
            return Err(StoreError::TransactionAlreadyOpen);
        }
        // Release the plain connection so the transaction owns its own.
        self.conn = None;
        self.tx = Some(self.pool.begin().await?);
        tracing::debug!("transaction opened");
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        if let Some(tx) = self.tx.take() {
            if let Err(e) = tx.commit().await {
                tracing::warn!(error = %e, "transaction commit failed");
                return Err(e.into());
            }
            tracing::debug!("transaction committed");
        }
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        if let Some(tx) = self.tx.take() {
            tx.rollback().await?;
            tracing::debug!("transaction rolled back");
        }
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        self.tx.is_some()
    }
}

#[async_trait]
impl AddressRepository for PgUnitOfWork {
    async fn insert_address(&mut self, address: &Address) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO addresses (id, street, number, complement, neighborhood, city, state, postal_code, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(address.id)
        .bind(&address.street)
        .bind(&address.number)
        .bind(&address.complement)
        .bind(&address.neighborhood)
        .bind(&address.city)
        .bind(&address.state)
        .bind(&address.postal_code)
        .bind(address.created_at)
        .bind(address.updated_at)
        .execute(self.executor().await?)
        .await?;
        Ok(())
    }

    async fn update_address(&mut self, address: &Address) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE addresses
            SET street = $2, number = $3, complement = $4, neighborhood = $5,
                city = $6, state = $7, postal_code = $8, updated_at = $9
            WHERE id = $1
            "#,
        )
        .bind(address.id)
        .bind(&address.street)
        .bind(&address.number)
        .bind(&address.complement)
        .bind(&address.neighborhood)
        .bind(&address.city)
        .bind(&address.state)
        .bind(&address.postal_code)
        .bind(address.updated_at)
        .execute(self.executor().await?)
        .await?;
        ensure_updated(result.rows_affected(), "Address", address.id)
    }

    async fn find_address(&mut self, id: Uuid) -> Result<Option<Address>> {
        sqlx::query("SELECT * FROM addresses WHERE id = $1")
            .bind(id)
            .fetch_optional(self.executor().await?)
            .await?
            .map(row_to_address)
            .transpose()
    }
}

#[async_trait]
impl ProfileRepository for PgUnitOfWork {
    async fn insert_profile(&mut self, profile: &Profile) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO profiles (id, name, address_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(profile.id.as_uuid())
        .bind(&profile.name)
        .bind(profile.address_id)
        .bind(profile.created_at)
        .bind(profile.updated_at)
        .execute(self.executor().await?)
        .await?;
        Ok(())
    }

    async fn update_profile(&mut self, profile: &Profile) -> Result<()> {
        let result = sqlx::query(
            "UPDATE profiles SET name = $2, address_id = $3, updated_at = $4 WHERE id = $1",
        )
        .bind(profile.id.as_uuid())
        .bind(&profile.name)
        .bind(profile.address_id)
        .bind(profile.updated_at)
        .execute(self.executor().await?)
        .await?;
        ensure_updated(result.rows_affected(), "Profile", profile.id)
    }

    async fn find_profile(&mut self, id: PersonId) -> Result<Option<Profile>> {
        sqlx::query("SELECT * FROM profiles WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(self.executor().await?)
            .await?
            .map(row_to_profile)
            .transpose()
    }
}

#[async_trait]
impl IndividualPersonRepository for PgUnitOfWork {
    async fn insert_individual(&mut self, person: &IndividualPerson) -> Result<()> {
        sqlx::query("INSERT INTO individual_persons (id, tax_id, created_at) VALUES ($1, $2, $3)")
            .bind(person.id.as_uuid())
            .bind(person.tax_id.as_str())
            .bind(person.created_at)
            .execute(self.executor().await?)
            .await?;
        Ok(())
    }

    async fn find_individual(&mut self, id: PersonId) -> Result<Option<IndividualPerson>> {
        sqlx::query("SELECT * FROM individual_persons WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(self.executor().await?)
            .await?
            .map(row_to_individual)
            .transpose()
    }

    async fn find_individual_by_tax_id(
        &mut self,
        tax_id: &TaxId,
    ) -> Result<Option<IndividualPerson>> {
        sqlx::query("SELECT * FROM individual_persons WHERE tax_id = $1")
            .bind(tax_id.as_str())
            .fetch_optional(self.executor().await?)
            .await?
            .map(row_to_individual)
            .transpose()
    }

    async fn delete_individual(&mut self, id: PersonId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM individual_persons WHERE id = $1")
            .bind(id.as_uuid())
            .execute(self.executor().await?)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl CorporatePersonRepository for PgUnitOfWork {
    async fn insert_corporate(&mut self, person: &CorporatePerson) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO corporate_persons (id, tax_id, legal_name, trade_name, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(person.id.as_uuid())
        .bind(person.tax_id.as_str())
        .bind(&person.legal_name)
        .bind(&person.trade_name)
        .bind(person.created_at)
        .execute(self.executor().await?)
        .await?;
        Ok(())
    }

    async fn find_corporate(&mut self, id: PersonId) -> Result<Option<CorporatePerson>> {
        sqlx::query("SELECT * FROM corporate_persons WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(self.executor().await?)
            .await?
            .map(row_to_corporate)
            .transpose()
    }

    async fn find_corporate_by_tax_id(
        &mut self,
        tax_id: &TaxId,
    ) -> Result<Option<CorporatePerson>> {
        sqlx::query("SELECT * FROM corporate_persons WHERE tax_id = $1")
            .bind(tax_id.as_str())
            .fetch_optional(self.executor().await?)
            .await?
            .map(row_to_corporate)
            .transpose()
    }

    async fn delete_corporate(&mut self, id: PersonId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM corporate_persons WHERE id = $1")
            .bind(id.as_uuid())
            .execute(self.executor().await?)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl RoleRepository for PgUnitOfWork {
    async fn insert_role(&mut self, role: &Role) -> Result<()> {
        sqlx::query("INSERT INTO roles (id, profile_id, kind, created_at) VALUES ($1, $2, $3, $4)")
            .bind(role.id)
            .bind(role.profile_id.as_uuid())
            .bind(role.kind.as_str())
            .bind(role.created_at)
            .execute(self.executor().await?)
            .await?;
        Ok(())
    }

    async fn find_roles(&mut self, profile_id: PersonId) -> Result<Vec<Role>> {
        let rows = sqlx::query("SELECT * FROM roles WHERE profile_id = $1 ORDER BY created_at ASC")
            .bind(profile_id.as_uuid())
            .fetch_all(self.executor().await?)
            .await?;
        rows.into_iter().map(row_to_role).collect()
    }
}

#[async_trait]
impl ClientRepository for PgUnitOfWork {
    async fn insert_client(&mut self, client: &Client) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO clients (id, person_kind, seller_id, active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(client.id.as_uuid())
        .bind(client.person_kind.as_str())
        .bind(client.seller_id.map(|id| id.as_uuid()))
        .bind(client.active)
        .bind(client.created_at)
        .bind(client.updated_at)
        .execute(self.executor().await?)
        .await?;
        Ok(())
    }

    async fn update_client(&mut self, client: &Client) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE clients
            SET person_kind = $2, seller_id = $3, active = $4, updated_at = $5
            WHERE id = $1
            "#,
        )
        .bind(client.id.as_uuid())
        .bind(client.person_kind.as_str())
        .bind(client.seller_id.map(|id| id.as_uuid()))
        .bind(client.active)
        .bind(client.updated_at)
        .execute(self.executor().await?)
        .await?;
        ensure_updated(result.rows_affected(), "Client", client.id)
    }

    async fn find_client(&mut self, id: PersonId) -> Result<Option<Client>> {
        sqlx::query("SELECT * FROM clients WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(self.executor().await?)
            .await?
            .map(row_to_client)
            .transpose()
    }
}

#[async_trait]
impl SellerRepository for PgUnitOfWork {
    async fn insert_seller(&mut self, seller: &Seller) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sellers (id, person_kind, parent_seller_id, commission_bps, active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(seller.id.as_uuid())
        .bind(seller.person_kind.as_str())
        .bind(seller.parent_seller_id.map(|id| id.as_uuid()))
        .bind(seller.commission.basis_points() as i32)
        .bind(seller.active)
        .bind(seller.created_at)
        .bind(seller.updated_at)
        .execute(self.executor().await?)
        .await?;
        Ok(())
    }

    async fn update_seller(&mut self, seller: &Seller) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE sellers
            SET person_kind = $2, parent_seller_id = $3, commission_bps = $4, active = $5, updated_at = $6
            WHERE id = $1
            "#,
        )
        .bind(seller.id.as_uuid())
        .bind(seller.person_kind.as_str())
        .bind(seller.parent_seller_id.map(|id| id.as_uuid()))
        .bind(seller.commission.basis_points() as i32)
        .bind(seller.active)
        .bind(seller.updated_at)
        .execute(self.executor().await?)
        .await?;
        ensure_updated(result.rows_affected(), "Seller", seller.id)
    }

    async fn find_seller(&mut self, id: PersonId) -> Result<Option<Seller>> {
        sqlx::query("SELECT * FROM sellers WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(self.executor().await?)
            .await?
            .map(row_to_seller)
            .transpose()
    }
}

#[async_trait]
impl PlanRepository for PgUnitOfWork {
    async fn insert_plan(&mut self, plan: &Plan) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO plans (id, code, description, price_cents, active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(plan.id.as_uuid())
        .bind(&plan.code)
        .bind(&plan.description)
        .bind(plan.price.cents())
        .bind(plan.active)
        .bind(plan.created_at)
        .bind(plan.updated_at)
        .execute(self.executor().await?)
        .await?;
        Ok(())
    }

    async fn update_plan(&mut self, plan: &Plan) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE plans
            SET code = $2, description = $3, price_cents = $4, active = $5, updated_at = $6
            WHERE id = $1
            "#,
        )
        .bind(plan.id.as_uuid())
        .bind(&plan.code)
        .bind(&plan.description)
        .bind(plan.price.cents())
        .bind(plan.active)
        .bind(plan.updated_at)
        .execute(self.executor().await?)
        .await?;
        ensure_updated(result.rows_affected(), "Plan", plan.id)
    }

    async fn find_plan(&mut self, id: PlanId) -> Result<Option<Plan>> {
        sqlx::query("SELECT * FROM plans WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(self.executor().await?)
            .await?
            .map(row_to_plan)
            .transpose()
    }

    async fn find_plan_by_code(&mut self, code: &str) -> Result<Option<Plan>> {
        sqlx::query("SELECT * FROM plans WHERE code = $1")
            .bind(code)
            .fetch_optional(self.executor().await?)
            .await?
            .map(row_to_plan)
            .transpose()
    }
}

#[async_trait]
impl OrderRepository for PgUnitOfWork {
    async fn insert_order(&mut self, order: &Order) -> Result<()> {
        let quantity = i32::try_from(order.quantity).map_err(|_| {
            StoreError::InvalidData(format!("quantity out of range: {}", order.quantity))
        })?;
        sqlx::query(
            r#"
            INSERT INTO orders (
                id, client_id, seller_id, plan_id, quantity,
                plan_code, plan_description, plan_price_cents, total_cents,
                status, gateway_reference, failure_reason, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.client_id.map(|id| id.as_uuid()))
        .bind(order.seller_id.map(|id| id.as_uuid()))
        .bind(order.plan_id.as_uuid())
        .bind(quantity)
        .bind(&order.plan.code)
        .bind(&order.plan.description)
        .bind(order.plan.price.cents())
        .bind(order.total.cents())
        .bind(order.status.as_str())
        .bind(&order.gateway_reference)
        .bind(&order.failure_reason)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(self.executor().await?)
        .await?;
        Ok(())
    }

    async fn update_order_status(&mut self, order: &Order) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = $2, gateway_reference = $3, failure_reason = $4, updated_at = $5
            WHERE id = $1
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.status.as_str())
        .bind(&order.gateway_reference)
        .bind(&order.failure_reason)
        .bind(order.updated_at)
        .execute(self.executor().await?)
        .await?;
        ensure_updated(result.rows_affected(), "Order", order.id)
    }

    async fn find_order(&mut self, id: OrderId) -> Result<Option<Order>> {
        sqlx::query("SELECT * FROM orders WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(self.executor().await?)
            .await?
            .map(row_to_order)
            .transpose()
    }
}

#[async_trait]
impl PaymentRecordRepository for PgUnitOfWork {
    async fn insert_payment(&mut self, payment: &PaymentRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO payment_records (id, order_id, amount_cents, paid_at, status, method)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(payment.id)
        .bind(payment.order_id.as_uuid())
        .bind(payment.amount.cents())
        .bind(payment.paid_at)
        .bind(&payment.status)
        .bind(&payment.method)
        .execute(self.executor().await?)
        .await?;
        Ok(())
    }

    async fn find_payments(&mut self, order_id: OrderId) -> Result<Vec<PaymentRecord>> {
        let rows =
            sqlx::query("SELECT * FROM payment_records WHERE order_id = $1 ORDER BY paid_at ASC")
                .bind(order_id.as_uuid())
                .fetch_all(self.executor().await?)
                .await?;
        rows.into_iter().map(row_to_payment).collect()
    }
}
