//! Client and seller provisioning across the credential store and the
//! business store.
//!
//! The two stores cannot share a transaction. Business rows are written in a
//! single unit of work; if anything fails after this invocation created the
//! login account, the unit of work is rolled back and the account is deleted
//! again. Accounts that already existed are never deleted.
//!
//! Once an account has been created, the remaining writes and any compensation
//! run on a spawned task. Dropping the caller's future at that point does not
//! leave the account behind without its business rows.

use chrono::{DateTime, Utc};
use common::PersonId;
use domain::{
    Address, Client, CommissionRate, CreateClient, CreateSeller, Person, PersonDetails, PersonKind,
    Profile, Role, Seller, TaxId, UpdateClient, UpdateSeller, UserKind,
};
use store::{
    AddressRepository, BusinessStore, ClientRepository, PersonRepositoryExt, ProfileRepository,
    RoleRepository, SellerRepository, UnitOfWork,
};
use tracing::{error, info, warn};

use crate::error::{Result, SagaError};
use crate::services::{CredentialError, CredentialStore};

/// The business record a provisioning call creates or updates.
#[derive(Debug, Clone, Copy)]
enum Membership {
    Client {
        seller_id: Option<PersonId>,
    },
    Seller {
        parent_seller_id: Option<PersonId>,
        commission: CommissionRate,
    },
}

impl Membership {
    fn kind(&self) -> UserKind {
        match self {
            Membership::Client { .. } => UserKind::Client,
            Membership::Seller { .. } => UserKind::Seller,
        }
    }

    /// Seller that must exist before anything is written.
    fn referenced_seller(&self) -> Option<PersonId> {
        match self {
            Membership::Client { seller_id } => *seller_id,
            Membership::Seller {
                parent_seller_id, ..
            } => *parent_seller_id,
        }
    }
}

struct Registration {
    details: PersonDetails,
    tax_id: TaxId,
    password: String,
    membership: Membership,
}

/// Creates and updates clients and sellers.
pub struct ProvisioningSaga<S, C> {
    store: S,
    credentials: C,
}

impl<S, C> ProvisioningSaga<S, C>
where
    S: BusinessStore,
    C: CredentialStore + Clone + 'static,
{
    pub fn new(store: S, credentials: C) -> Self {
        Self { store, credentials }
    }

    /// Registers a client, reusing the login if the e-mail already has one.
    #[tracing::instrument(skip(self, command), fields(person_kind = %command.details.person_kind))]
    pub async fn create_client(&self, command: &CreateClient) -> Result<PersonId> {
        let tax_id = command.validate()?;
        self.register(Registration {
            details: command.details.clone(),
            tax_id,
            password: command.password.clone(),
            membership: Membership::Client {
                seller_id: command.seller_id,
            },
        })
        .await
    }

    /// Registers a seller, reusing the login if the e-mail already has one.
    #[tracing::instrument(skip(self, command), fields(person_kind = %command.details.person_kind))]
    pub async fn create_seller(&self, command: &CreateSeller) -> Result<PersonId> {
        let (tax_id, commission) = command.validate()?;
        self.register(Registration {
            details: command.details.clone(),
            tax_id,
            password: command.password.clone(),
            membership: Membership::Seller {
                parent_seller_id: command.parent_seller_id,
                commission,
            },
        })
        .await
    }

    #[tracing::instrument(skip(self, command), fields(id = %command.id))]
    pub async fn update_client(&self, command: &UpdateClient) -> Result<PersonId> {
        let tax_id = command.validate()?;
        let membership = Membership::Client {
            seller_id: command.seller_id,
        };
        self.update(command.id, &command.details, tax_id, membership)
            .await
    }

    #[tracing::instrument(skip(self, command), fields(id = %command.id))]
    pub async fn update_seller(&self, command: &UpdateSeller) -> Result<PersonId> {
        let (tax_id, commission) = command.validate()?;
        let membership = Membership::Seller {
            parent_seller_id: command.parent_seller_id,
            commission,
        };
        self.update(command.id, &command.details, tax_id, membership)
            .await
    }

    async fn register(&self, registration: Registration) -> Result<PersonId> {
        let kind = registration.membership.kind().as_str();
        metrics::counter!("provisioning_total", "kind" => kind, "operation" => "create")
            .increment(1);

        let result = self.try_register(registration).await;
        if let Err(e) = &result {
            metrics::counter!("provisioning_failed_total", "kind" => kind, "operation" => "create")
                .increment(1);
            warn!(error = %e, "Provisioning failed");
        }
        result
    }

    async fn try_register(&self, registration: Registration) -> Result<PersonId> {
        let kind = registration.membership.kind();
        let email = registration.details.normalized_email();
        let mut uow = self.store.unit_of_work();

        // Every check below runs before the first write.
        ensure_seller_exists(&mut uow, registration.membership.referenced_seller()).await?;

        let existing = self.credentials.find_by_email(&email).await?;
        let existing_id = existing.as_ref().map(|account| account.id);

        if let Some(owner) = uow
            .tax_id_owner(&registration.tax_id, registration.details.person_kind)
            .await?
            && Some(owner) != existing_id
        {
            return Err(SagaError::Conflict("tax id already in use".to_string()));
        }

        let (account_id, owned) = match existing_id {
            Some(id) => {
                if has_membership(&mut uow, id, kind).await? {
                    return Err(SagaError::Conflict(format!(
                        "{email} is already in use by a {}",
                        kind.role_name().to_lowercase()
                    )));
                }
                // The login is shared, so the person record must be too.
                if let Some(person) = uow.find_person(id).await?
                    && (person.kind() != registration.details.person_kind
                        || person.tax_id() != &registration.tax_id)
                {
                    return Err(SagaError::Conflict(format!(
                        "{email} is registered with a different tax id or person kind"
                    )));
                }
                info!(account_id = %id, "Reusing existing account");
                (id, false)
            }
            None => {
                let id = self
                    .credentials
                    .create_account(&email, &registration.password, &registration.details.phone)
                    .await
                    .map_err(|e| match e {
                        CredentialError::PasswordPolicy(_) | CredentialError::DuplicateEmail(_) => {
                            SagaError::Validation(e.to_string())
                        }
                        other => SagaError::Credential(other),
                    })?;
                info!(account_id = %id, "Account created");
                (id, true)
            }
        };

        if !owned {
            return self
                .finish_registration(uow, account_id, registration, false)
                .await;
        }

        let saga = Self {
            store: self.store.clone(),
            credentials: self.credentials.clone(),
        };
        let task = tokio::spawn(async move {
            saga.finish_registration(uow, account_id, registration, true)
                .await
        });
        match task.await {
            Ok(result) => result,
            Err(join) if join.is_panic() => std::panic::resume_unwind(join.into_panic()),
            Err(join) => Err(SagaError::Interrupted(join.to_string())),
        }
    }

    async fn finish_registration(
        &self,
        mut uow: S::UnitOfWork,
        account_id: PersonId,
        registration: Registration,
        owned: bool,
    ) -> Result<PersonId> {
        let kind = registration.membership.kind();
        match self.write_registration(&mut uow, account_id, &registration).await {
            Ok(()) => {
                info!(%account_id, kind = %kind, "Provisioning committed");
                Ok(account_id)
            }
            Err(e) => {
                if let Err(rollback) = uow.rollback().await {
                    warn!(error = %rollback, "Rollback failed");
                }
                if owned {
                    Err(self.compensate(account_id, e).await)
                } else {
                    Err(e)
                }
            }
        }
    }

    /// Address, Profile, Person, Client/Seller, Role, in that order. On a
    /// reused account only the missing rows are written.
    async fn write_registration(
        &self,
        uow: &mut S::UnitOfWork,
        id: PersonId,
        registration: &Registration,
    ) -> Result<()> {
        let details = &registration.details;
        let kind = registration.membership.kind();
        let name = details.name.trim();
        let now = Utc::now();

        uow.begin().await?;

        if uow.find_profile(id).await?.is_none() {
            let address = details.address.as_ref().map(|input| Address::new(input, now));
            if let Some(address) = &address {
                uow.insert_address(address).await?;
            }
            uow.insert_profile(&Profile {
                id,
                name: name.to_string(),
                address_id: address.as_ref().map(|a| a.id),
                created_at: now,
                updated_at: now,
            })
            .await?;
        }

        let person_kind = match uow.find_person(id).await? {
            Some(person) => person.kind(),
            None => {
                let person = Person::new(
                    id,
                    details.person_kind,
                    registration.tax_id.clone(),
                    name,
                    details.trade_name.as_deref(),
                    now,
                );
                uow.insert_person(&person).await?;
                details.person_kind
            }
        };

        match registration.membership {
            Membership::Client { seller_id } => {
                uow.insert_client(&Client {
                    id,
                    person_kind,
                    seller_id,
                    active: details.active,
                    created_at: now,
                    updated_at: now,
                })
                .await?
            }
            Membership::Seller {
                parent_seller_id,
                commission,
            } => {
                uow.insert_seller(&Seller {
                    id,
                    person_kind,
                    parent_seller_id,
                    commission,
                    active: details.active,
                    created_at: now,
                    updated_at: now,
                })
                .await?
            }
        }

        uow.insert_role(&Role::new(id, kind, now)).await?;
        self.credentials.assign_role(id, kind.role_name()).await?;

        uow.commit().await?;
        Ok(())
    }

    /// Deletes an account this invocation created.
    async fn compensate(&self, account_id: PersonId, cause: SagaError) -> SagaError {
        metrics::counter!("provisioning_compensations_total").increment(1);
        warn!(%account_id, error = %cause, "Deleting account created by failed provisioning");

        let failure = match self.credentials.delete_account(account_id).await {
            Ok(()) => {
                info!(%account_id, "Compensation completed");
                return cause;
            }
            Err(e) => e.to_string(),
        };

        metrics::counter!("provisioning_compensation_failures_total").increment(1);
        error!(%account_id, %failure, "Compensation failed, account left orphaned");
        SagaError::CompensationFailed {
            source: Box::new(cause),
            account_id,
            failure,
        }
    }

    async fn update(
        &self,
        id: PersonId,
        details: &PersonDetails,
        tax_id: TaxId,
        membership: Membership,
    ) -> Result<PersonId> {
        let kind = membership.kind().as_str();
        metrics::counter!("provisioning_total", "kind" => kind, "operation" => "update")
            .increment(1);

        let result = self.try_update(id, details, tax_id, membership).await;
        if let Err(e) = &result {
            metrics::counter!("provisioning_failed_total", "kind" => kind, "operation" => "update")
                .increment(1);
            warn!(error = %e, "Update failed");
        }
        result
    }

    async fn try_update(
        &self,
        id: PersonId,
        details: &PersonDetails,
        tax_id: TaxId,
        membership: Membership,
    ) -> Result<PersonId> {
        let kind = membership.kind();
        let mut uow = self.store.unit_of_work();

        if !has_membership(&mut uow, id, kind).await? {
            return Err(SagaError::not_found(kind.role_name(), id));
        }
        ensure_seller_exists(&mut uow, membership.referenced_seller()).await?;
        if let Some(owner) = uow.tax_id_owner(&tax_id, details.person_kind).await?
            && owner != id
        {
            return Err(SagaError::Conflict("tax id already in use".to_string()));
        }

        match self
            .write_update(&mut uow, id, details, tax_id, membership)
            .await
        {
            Ok(()) => {
                info!(%id, kind = %kind, "Update committed");
                Ok(id)
            }
            Err(e) => {
                if let Err(rollback) = uow.rollback().await {
                    warn!(error = %rollback, "Rollback failed");
                }
                Err(e)
            }
        }
    }

    async fn write_update(
        &self,
        uow: &mut S::UnitOfWork,
        id: PersonId,
        details: &PersonDetails,
        tax_id: TaxId,
        membership: Membership,
    ) -> Result<()> {
        let name = details.name.trim();
        let now = Utc::now();

        uow.begin().await?;

        let mut profile = uow
            .find_profile(id)
            .await?
            .ok_or_else(|| SagaError::not_found("Profile", id))?;
        profile.name = name.to_string();
        if let Some(input) = &details.address {
            let owned = match profile.address_id {
                Some(address_id) => uow.find_address(address_id).await?,
                None => None,
            };
            match owned {
                Some(mut address) => {
                    address.replace_with(input, now);
                    uow.update_address(&address).await?;
                }
                None => {
                    let address = Address::new(input, now);
                    uow.insert_address(&address).await?;
                    profile.address_id = Some(address.id);
                }
            }
        }
        profile.updated_at = now;
        uow.update_profile(&profile).await?;

        // The kind may switch between individual and corporate, so the
        // person record is replaced rather than patched.
        uow.delete_person(id).await?;
        let person = Person::new(
            id,
            details.person_kind,
            tax_id,
            name,
            details.trade_name.as_deref(),
            now,
        );
        uow.insert_person(&person).await?;

        match membership {
            Membership::Client { seller_id } => {
                let mut client = uow
                    .find_client(id)
                    .await?
                    .ok_or_else(|| SagaError::not_found("Client", id))?;
                client.person_kind = details.person_kind;
                client.seller_id = seller_id;
                client.active = details.active;
                client.updated_at = now;
                uow.update_client(&client).await?;
            }
            Membership::Seller {
                parent_seller_id,
                commission,
            } => {
                let mut seller = uow
                    .find_seller(id)
                    .await?
                    .ok_or_else(|| SagaError::not_found("Seller", id))?;
                seller.person_kind = details.person_kind;
                seller.parent_seller_id = parent_seller_id;
                seller.commission = commission;
                seller.active = details.active;
                seller.updated_at = now;
                uow.update_seller(&seller).await?;
            }
        }
        sync_person_kind(uow, id, membership.kind(), details.person_kind, now).await?;

        self.credentials
            .update_account(id, &details.normalized_email(), details.phone.trim())
            .await?;

        uow.commit().await?;
        Ok(())
    }
}

async fn ensure_seller_exists<U: UnitOfWork>(
    uow: &mut U,
    seller_id: Option<PersonId>,
) -> Result<()> {
    if let Some(seller_id) = seller_id
        && uow.find_seller(seller_id).await?.is_none()
    {
        return Err(SagaError::not_found("Seller", seller_id));
    }
    Ok(())
}

/// Carries a person kind change over to the membership not being updated.
async fn sync_person_kind<U: UnitOfWork>(
    uow: &mut U,
    id: PersonId,
    updated: UserKind,
    person_kind: PersonKind,
    now: DateTime<Utc>,
) -> Result<()> {
    match updated {
        UserKind::Client => {
            if let Some(mut seller) = uow.find_seller(id).await?
                && seller.person_kind != person_kind
            {
                seller.person_kind = person_kind;
                seller.updated_at = now;
                uow.update_seller(&seller).await?;
            }
        }
        UserKind::Seller => {
            if let Some(mut client) = uow.find_client(id).await?
                && client.person_kind != person_kind
            {
                client.person_kind = person_kind;
                client.updated_at = now;
                uow.update_client(&client).await?;
            }
        }
        UserKind::Administrator => {}
    }
    Ok(())
}

async fn has_membership<U: UnitOfWork>(uow: &mut U, id: PersonId, kind: UserKind) -> Result<bool> {
    let exists = match kind {
        UserKind::Client => uow.find_client(id).await?.is_some(),
        UserKind::Seller => uow.find_seller(id).await?.is_some(),
        UserKind::Administrator => false,
    };
    Ok(exists)
}
