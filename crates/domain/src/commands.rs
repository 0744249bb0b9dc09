//! Command shapes consumed by the provisioning saga and the sale processor.
//!
//! Each command validates its own shape; checks that need a store
//! (uniqueness, referenced rows) happen in the saga.

use common::{PersonId, PlanId};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::order::Order;
use crate::person::PersonKind;
use crate::value_objects::{CommissionRate, Money, TaxId, digits_only};

fn required(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "is required"));
    }
    Ok(())
}

/// Loose shape check; the credential store owns the real rules.
pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    let email = email.trim();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    };
    if !valid {
        return Err(ValidationError::new("email", "is not a valid e-mail address"));
    }
    Ok(())
}

fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    let digits = digits_only(phone);
    if !(10..=13).contains(&digits.len()) {
        return Err(ValidationError::new("phone", "must have between 10 and 13 digits"));
    }
    Ok(())
}

/// Address fields supplied with a person.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressInput {
    pub street: String,
    pub number: String,
    #[serde(default)]
    pub complement: Option<String>,
    pub neighborhood: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
}

impl AddressInput {
    pub fn validate(&self) -> Result<(), ValidationError> {
        required("address.street", &self.street)?;
        required("address.number", &self.number)?;
        required("address.neighborhood", &self.neighborhood)?;
        required("address.city", &self.city)?;
        let state = self.state.trim();
        if state.len() != 2 || !state.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ValidationError::new("address.state", "must be a two-letter code"));
        }
        if digits_only(&self.postal_code).len() != 8 {
            return Err(ValidationError::new("address.postalCode", "must have 8 digits"));
        }
        Ok(())
    }
}

/// Fields shared by every client and seller command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonDetails {
    pub name: String,
    pub email: String,
    /// Raw tax id as typed; only its digits are persisted.
    pub tax_id: String,
    pub phone: String,
    pub person_kind: PersonKind,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub trade_name: Option<String>,
    #[serde(default)]
    pub address: Option<AddressInput>,
}

fn default_active() -> bool {
    true
}

impl PersonDetails {
    /// Validates the shape and returns the normalized tax id.
    pub fn validate(&self) -> Result<TaxId, ValidationError> {
        required("name", &self.name)?;
        validate_email(&self.email)?;
        validate_phone(&self.phone)?;
        if let Some(address) = &self.address {
            address.validate()?;
        }
        TaxId::parse(&self.tax_id, self.person_kind)
    }

    /// E-mail in the form used as the login key.
    pub fn normalized_email(&self) -> String {
        self.email.trim().to_lowercase()
    }
}

fn validate_password(password: &str, confirm_password: &str) -> Result<(), ValidationError> {
    required("password", password)?;
    if password != confirm_password {
        return Err(ValidationError::new(
            "confirmPassword",
            "does not match password",
        ));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateClient {
    #[serde(flatten)]
    pub details: PersonDetails,
    pub password: String,
    pub confirm_password: String,
    #[serde(default)]
    pub seller_id: Option<PersonId>,
}

impl CreateClient {
    pub fn validate(&self) -> Result<TaxId, ValidationError> {
        let tax_id = self.details.validate()?;
        validate_password(&self.password, &self.confirm_password)?;
        Ok(tax_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateClient {
    pub id: PersonId,
    #[serde(flatten)]
    pub details: PersonDetails,
    #[serde(default)]
    pub seller_id: Option<PersonId>,
}

impl UpdateClient {
    pub fn validate(&self) -> Result<TaxId, ValidationError> {
        self.details.validate()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSeller {
    #[serde(flatten)]
    pub details: PersonDetails,
    pub password: String,
    pub confirm_password: String,
    #[serde(default)]
    pub parent_seller_id: Option<PersonId>,
    #[serde(default)]
    pub commission: f64,
}

impl CreateSeller {
    pub fn validate(&self) -> Result<(TaxId, CommissionRate), ValidationError> {
        let tax_id = self.details.validate()?;
        validate_password(&self.password, &self.confirm_password)?;
        let commission = CommissionRate::from_percent(self.commission)?;
        Ok((tax_id, commission))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSeller {
    pub id: PersonId,
    #[serde(flatten)]
    pub details: PersonDetails,
    #[serde(default)]
    pub parent_seller_id: Option<PersonId>,
    #[serde(default)]
    pub commission: f64,
}

impl UpdateSeller {
    pub fn validate(&self) -> Result<(TaxId, CommissionRate), ValidationError> {
        let tax_id = self.details.validate()?;
        if self.parent_seller_id == Some(self.id) {
            return Err(ValidationError::new(
                "parentSellerId",
                "a seller cannot be its own parent",
            ));
        }
        let commission = CommissionRate::from_percent(self.commission)?;
        Ok((tax_id, commission))
    }
}

/// A card sale of a plan. Card fields are validated by the gateway client.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessSale {
    pub customer_name: String,
    pub email: String,
    pub phone: String,
    pub card_number: String,
    pub cvv: String,
    /// Card expiry as `MM/YY`.
    pub expiry: String,
    #[serde(default)]
    pub seller_id: Option<PersonId>,
    pub plan_id: PlanId,
    pub quantity: u32,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub client_id: Option<PersonId>,
    /// Total in cents the caller expects to pay; must equal the computed total.
    #[serde(default)]
    pub total_cents: Option<Money>,
}

impl ProcessSale {
    pub fn validate(&self) -> Result<(), ValidationError> {
        required("customerName", &self.customer_name)?;
        validate_email(&self.email)?;
        if self.quantity == 0 {
            return Err(ValidationError::new("quantity", "must be at least 1"));
        }
        if self.quantity > Order::MAX_QUANTITY {
            return Err(ValidationError::new(
                "quantity",
                format!("must be at most {}", Order::MAX_QUANTITY),
            ));
        }
        Ok(())
    }
}

impl std::fmt::Debug for ProcessSale {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessSale")
            .field("customer_name", &self.customer_name)
            .field("email", &self.email)
            .field("seller_id", &self.seller_id)
            .field("plan_id", &self.plan_id)
            .field("quantity", &self.quantity)
            .field("client_id", &self.client_id)
            .field("total_cents", &self.total_cents)
            .finish_non_exhaustive()
    }
}
