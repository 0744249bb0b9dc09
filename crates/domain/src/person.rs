//! People and their business records.
//!
//! Every record here is keyed by the [`PersonId`] of the credential account,
//! except [`Address`] and [`Role`] which carry their own ids.

use chrono::{DateTime, Utc};
use common::PersonId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::commands::AddressInput;
use crate::value_objects::{CommissionRate, TaxId};

/// Selects which person record (individual or corporate) a client/seller owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PersonKind {
    Individual,
    Corporate,
}

impl PersonKind {
    /// Number of digits in this kind's national tax id.
    pub fn tax_id_len(&self) -> usize {
        match self {
            PersonKind::Individual => 11,
            PersonKind::Corporate => 14,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PersonKind::Individual => "INDIVIDUAL",
            PersonKind::Corporate => "CORPORATE",
        }
    }
}

impl std::fmt::Display for PersonKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PersonKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INDIVIDUAL" => Ok(PersonKind::Individual),
            "CORPORATE" => Ok(PersonKind::Corporate),
            other => Err(format!("unknown person kind: {other}")),
        }
    }
}

/// The role a login plays in the business store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserKind {
    Client,
    Seller,
    Administrator,
}

impl UserKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserKind::Client => "CLIENT",
            UserKind::Seller => "SELLER",
            UserKind::Administrator => "ADMINISTRATOR",
        }
    }

    /// Role name assigned to the credential account.
    pub fn role_name(&self) -> &'static str {
        match self {
            UserKind::Client => "Client",
            UserKind::Seller => "Seller",
            UserKind::Administrator => "Administrator",
        }
    }
}

impl std::fmt::Display for UserKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UserKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CLIENT" => Ok(UserKind::Client),
            "SELLER" => Ok(UserKind::Seller),
            "ADMINISTRATOR" => Ok(UserKind::Administrator),
            other => Err(format!("unknown user kind: {other}")),
        }
    }
}

/// Postal address owned by a profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub id: Uuid,
    pub street: String,
    pub number: String,
    pub complement: Option<String>,
    pub neighborhood: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Address {
    /// Builds a new address from validated input.
    pub fn new(input: &AddressInput, now: DateTime<Utc>) -> Self {
        let mut address = Self {
            id: Uuid::new_v4(),
            street: String::new(),
            number: String::new(),
            complement: None,
            neighborhood: String::new(),
            city: String::new(),
            state: String::new(),
            postal_code: String::new(),
            created_at: now,
            updated_at: now,
        };
        address.replace_with(input, now);
        address
    }

    /// Overwrites every field with `input`, keeping the id and creation time.
    pub fn replace_with(&mut self, input: &AddressInput, now: DateTime<Utc>) {
        self.street = input.street.trim().to_string();
        self.number = input.number.trim().to_string();
        self.complement = input
            .complement
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string);
        self.neighborhood = input.neighborhood.trim().to_string();
        self.city = input.city.trim().to_string();
        self.state = input.state.trim().to_uppercase();
        self.postal_code = crate::value_objects::digits_only(&input.postal_code);
        self.updated_at = now;
    }
}

/// Business-store profile of a login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: PersonId,
    pub name: String,
    pub address_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndividualPerson {
    pub id: PersonId,
    pub tax_id: TaxId,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorporatePerson {
    pub id: PersonId,
    pub tax_id: TaxId,
    pub legal_name: String,
    pub trade_name: String,
    pub created_at: DateTime<Utc>,
}

/// Exactly one of these exists per person id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Person {
    Individual(IndividualPerson),
    Corporate(CorporatePerson),
}

impl Person {
    /// Builds the record matching `kind`.
    ///
    /// `trade_name` falls back to `legal_name` for corporations.
    pub fn new(
        id: PersonId,
        kind: PersonKind,
        tax_id: TaxId,
        legal_name: &str,
        trade_name: Option<&str>,
        now: DateTime<Utc>,
    ) -> Self {
        match kind {
            PersonKind::Individual => Person::Individual(IndividualPerson {
                id,
                tax_id,
                created_at: now,
            }),
            PersonKind::Corporate => Person::Corporate(CorporatePerson {
                id,
                tax_id,
                legal_name: legal_name.to_string(),
                trade_name: trade_name.unwrap_or(legal_name).to_string(),
                created_at: now,
            }),
        }
    }

    pub fn id(&self) -> PersonId {
        match self {
            Person::Individual(p) => p.id,
            Person::Corporate(p) => p.id,
        }
    }

    pub fn kind(&self) -> PersonKind {
        match self {
            Person::Individual(_) => PersonKind::Individual,
            Person::Corporate(_) => PersonKind::Corporate,
        }
    }

    pub fn tax_id(&self) -> &TaxId {
        match self {
            Person::Individual(p) => &p.tax_id,
            Person::Corporate(p) => &p.tax_id,
        }
    }
}

/// A role held by a profile. A profile holds at most one role per kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: Uuid,
    pub profile_id: PersonId,
    pub kind: UserKind,
    pub created_at: DateTime<Utc>,
}

impl Role {
    pub fn new(profile_id: PersonId, kind: UserKind, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            profile_id,
            kind,
            created_at: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    pub id: PersonId,
    pub person_kind: PersonKind,
    /// Seller who brought this client in.
    pub seller_id: Option<PersonId>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seller {
    pub id: PersonId,
    pub person_kind: PersonKind,
    pub parent_seller_id: Option<PersonId>,
    pub commission: CommissionRate,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
