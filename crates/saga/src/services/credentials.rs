//! Credential store trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::PersonId;
use thiserror::Error;

/// Errors raised by the credential store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialError {
    #[error("Password rejected: {0}")]
    PasswordPolicy(String),

    #[error("E-mail already registered: {0}")]
    DuplicateEmail(String),

    #[error("Account not found: {0}")]
    NotFound(PersonId),

    #[error("Credential store unavailable: {0}")]
    Unavailable(String),
}

/// Login account as seen by the saga. Password hashes never leave the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityAccount {
    pub id: PersonId,
    pub email: String,
    pub phone: String,
    pub email_confirmed: bool,
    pub phone_confirmed: bool,
    pub roles: Vec<String>,
}

/// Identity store holding logins. Its id is the shared key of every business
/// record of the same person.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Creates an account, enforcing the password policy and e-mail uniqueness.
    async fn create_account(
        &self,
        email: &str,
        password: &str,
        phone: &str,
    ) -> Result<PersonId, CredentialError>;

    async fn update_account(
        &self,
        id: PersonId,
        email: &str,
        phone: &str,
    ) -> Result<(), CredentialError>;

    async fn delete_account(&self, id: PersonId) -> Result<(), CredentialError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<IdentityAccount>, CredentialError>;

    /// Adds `role_name` to the account. Assigning a held role is a no-op.
    async fn assign_role(&self, id: PersonId, role_name: &str) -> Result<(), CredentialError>;
}

/// Minimum 8 characters with at least one letter and one digit.
pub fn check_password_policy(password: &str) -> Result<(), CredentialError> {
    if password.chars().count() < 8 {
        return Err(CredentialError::PasswordPolicy(
            "password must have at least 8 characters".to_string(),
        ));
    }
    if !password.chars().any(char::is_alphabetic) || !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(CredentialError::PasswordPolicy(
            "password must contain a letter and a digit".to_string(),
        ));
    }
    Ok(())
}

#[derive(Debug, Default)]
struct InMemoryCredentialState {
    accounts: HashMap<PersonId, IdentityAccount>,
    fail_on_create: bool,
    fail_on_update: bool,
    fail_on_delete: bool,
    fail_on_assign_role: bool,
    delete_calls: usize,
}

impl InMemoryCredentialState {
    fn email_taken(&self, email: &str, except: Option<PersonId>) -> bool {
        self.accounts
            .values()
            .any(|a| a.email.eq_ignore_ascii_case(email) && Some(a.id) != except)
    }
}

/// In-memory credential store for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCredentialStore {
    state: Arc<RwLock<InMemoryCredentialState>>,
}

impl InMemoryCredentialStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_on_create(&self, fail: bool) {
        self.state.write().unwrap().fail_on_create = fail;
    }

    pub fn set_fail_on_update(&self, fail: bool) {
        self.state.write().unwrap().fail_on_update = fail;
    }

    /// Makes compensating deletes fail.
    pub fn set_fail_on_delete(&self, fail: bool) {
        self.state.write().unwrap().fail_on_delete = fail;
    }

    pub fn set_fail_on_assign_role(&self, fail: bool) {
        self.state.write().unwrap().fail_on_assign_role = fail;
    }

    /// Returns the number of accounts.
    pub fn account_count(&self) -> usize {
        self.state.read().unwrap().accounts.len()
    }

    pub fn has_account(&self, id: PersonId) -> bool {
        self.state.read().unwrap().accounts.contains_key(&id)
    }

    /// Role names held by the account, in assignment order.
    pub fn roles_of(&self, id: PersonId) -> Vec<String> {
        self.state
            .read()
            .unwrap()
            .accounts
            .get(&id)
            .map(|a| a.roles.clone())
            .unwrap_or_default()
    }

    /// Number of delete calls, including failed ones.
    pub fn delete_calls(&self) -> usize {
        self.state.read().unwrap().delete_calls
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn create_account(
        &self,
        email: &str,
        password: &str,
        phone: &str,
    ) -> Result<PersonId, CredentialError> {
        let mut state = self.state.write().unwrap();

        if state.fail_on_create {
            return Err(CredentialError::Unavailable("create rejected".to_string()));
        }
        check_password_policy(password)?;
        if state.email_taken(email, None) {
            return Err(CredentialError::DuplicateEmail(email.to_string()));
        }

        let id = PersonId::new();
        state.accounts.insert(
            id,
            IdentityAccount {
                id,
                email: email.to_string(),
                phone: phone.to_string(),
                email_confirmed: false,
                phone_confirmed: false,
                roles: Vec::new(),
            },
        );
        Ok(id)
    }

    async fn update_account(
        &self,
        id: PersonId,
        email: &str,
        phone: &str,
    ) -> Result<(), CredentialError> {
        let mut state = self.state.write().unwrap();

        if state.fail_on_update {
            return Err(CredentialError::Unavailable("update rejected".to_string()));
        }
        if state.email_taken(email, Some(id)) {
            return Err(CredentialError::DuplicateEmail(email.to_string()));
        }

        let account = state
            .accounts
            .get_mut(&id)
            .ok_or(CredentialError::NotFound(id))?;
        if !account.email.eq_ignore_ascii_case(email) {
            account.email = email.to_string();
            account.email_confirmed = false;
        }
        if account.phone != phone {
            account.phone = phone.to_string();
            account.phone_confirmed = false;
        }
        Ok(())
    }

    async fn delete_account(&self, id: PersonId) -> Result<(), CredentialError> {
        let mut state = self.state.write().unwrap();
        state.delete_calls += 1;

        if state.fail_on_delete {
            return Err(CredentialError::Unavailable("delete rejected".to_string()));
        }
        state
            .accounts
            .remove(&id)
            .map(|_| ())
            .ok_or(CredentialError::NotFound(id))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<IdentityAccount>, CredentialError> {
        let state = self.state.read().unwrap();
        Ok(state
            .accounts
            .values()
            .find(|a| a.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn assign_role(&self, id: PersonId, role_name: &str) -> Result<(), CredentialError> {
        let mut state = self.state.write().unwrap();

        if state.fail_on_assign_role {
            return Err(CredentialError::Unavailable("role assignment rejected".to_string()));
        }
        let account = state
            .accounts
            .get_mut(&id)
            .ok_or(CredentialError::NotFound(id))?;
        if !account.roles.iter().any(|r| r == role_name) {
            account.roles.push(role_name.to_string());
        }
        Ok(())
    }
}
