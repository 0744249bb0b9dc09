use thiserror::Error;

/// Constraint names shared by the PostgreSQL schema and the in-memory store.
pub mod constraints {
    pub const INDIVIDUAL_TAX_ID: &str = "individual_persons_tax_id_key";
    pub const CORPORATE_TAX_ID: &str = "corporate_persons_tax_id_key";
    pub const ROLE_PER_KIND: &str = "roles_profile_id_kind_key";
    pub const PLAN_CODE: &str = "plans_code_key";
}

/// Errors that can occur when interacting with the business store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique constraint (primary key, tax id, plan code, role kind) was violated.
    #[error("Unique constraint violated: {constraint}")]
    UniqueViolation { constraint: String },

    /// A referenced row does not exist.
    #[error("Foreign key violated: {constraint}")]
    ForeignKeyViolation { constraint: String },

    /// An update targeted a row that does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// `begin` was called while a transaction was already open.
    #[error("A transaction is already open on this unit of work")]
    TransactionAlreadyOpen,

    /// A stored value could not be mapped back into the domain.
    #[error("Invalid stored value: {0}")]
    InvalidData(String),

    /// A failure switched on in the in-memory store.
    #[error("Injected failure: {0}")]
    Injected(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl StoreError {
    pub(crate) fn unique(constraint: &str) -> Self {
        StoreError::UniqueViolation {
            constraint: constraint.to_string(),
        }
    }

    pub(crate) fn foreign_key(constraint: &str) -> Self {
        StoreError::ForeignKeyViolation {
            constraint: constraint.to_string(),
        }
    }

    /// Returns the violated constraint if this is a unique violation.
    pub fn unique_constraint(&self) -> Option<&str> {
        match self {
            StoreError::UniqueViolation { constraint } => Some(constraint),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = e {
            let constraint = db_err.constraint().unwrap_or("unknown").to_string();
            if db_err.is_unique_violation() {
                return StoreError::UniqueViolation { constraint };
            }
            if db_err.is_foreign_key_violation() {
                return StoreError::ForeignKeyViolation { constraint };
            }
        }
        StoreError::Database(e)
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
