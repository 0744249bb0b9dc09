//! Value objects shared by the provisioning and sales domains.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::person::PersonKind;

/// Money amount represented in cents to avoid floating point issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money {
    /// Amount in cents (e.g., 1000 = R$10.00)
    cents: i64,
}

impl Money {
    /// Creates a new Money amount from cents.
    pub fn from_cents(cents: i64) -> Self {
        Self { cents }
    }

    /// Creates a new Money amount from a whole currency value.
    pub fn from_units(units: i64) -> Self {
        Self { cents: units * 100 }
    }

    /// Returns the amount in cents.
    pub fn cents(&self) -> i64 {
        self.cents
    }

    /// Returns the whole-unit portion.
    pub fn units(&self) -> i64 {
        self.cents / 100
    }

    /// Returns the cents portion (remainder after units).
    pub fn cents_part(&self) -> i64 {
        self.cents.abs() % 100
    }

    /// Multiplies by a quantity. `None` if the result does not fit.
    pub fn multiply(&self, quantity: u32) -> Option<Money> {
        self.cents
            .checked_mul(i64::from(quantity))
            .map(Money::from_cents)
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.cents < 0 {
            write!(f, "-R${}.{:02}", self.units().abs(), self.cents_part())
        } else {
            write!(f, "R${}.{:02}", self.units(), self.cents_part())
        }
    }
}

/// Keeps only the ASCII digits of `raw`.
pub fn digits_only(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// A national tax id stripped to digits and checked against the person kind.
///
/// Individuals carry an 11-digit id, corporations a 14-digit one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaxId(String);

impl TaxId {
    /// Normalizes a raw tax id (punctuation allowed) for the given person kind.
    pub fn parse(raw: &str, kind: PersonKind) -> Result<Self, ValidationError> {
        let digits = digits_only(raw);
        let expected = kind.tax_id_len();
        if digits.len() != expected {
            return Err(ValidationError::new(
                "taxId",
                format!(
                    "{} tax id must have {} digits, got {}",
                    kind.as_str().to_lowercase(),
                    expected,
                    digits.len()
                ),
            ));
        }
        let first = digits.as_bytes()[0];
        if digits.bytes().all(|b| b == first) {
            return Err(ValidationError::new("taxId", "tax id cannot repeat a single digit"));
        }
        Ok(Self(digits))
    }

    /// Wraps an already-normalized value read back from storage.
    pub fn from_stored(digits: impl Into<String>) -> Self {
        Self(digits.into())
    }

    /// Returns the digits.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TaxId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A seller's commission, held in hundredths of a percent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommissionRate(u32);

impl CommissionRate {
    const MAX_BASIS_POINTS: u32 = 10_000;

    /// Converts a percentage such as `12.5` into a rate.
    pub fn from_percent(percent: f64) -> Result<Self, ValidationError> {
        if !percent.is_finite() || !(0.0..=100.0).contains(&percent) {
            return Err(ValidationError::new(
                "commission",
                "commission must be between 0 and 100",
            ));
        }
        Ok(Self((percent * 100.0).round() as u32))
    }

    /// Builds a rate from basis points, clamping at 100%.
    pub fn from_basis_points(bps: u32) -> Self {
        Self(bps.min(Self::MAX_BASIS_POINTS))
    }

    /// Returns the rate in basis points.
    pub fn basis_points(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for CommissionRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:02}%", self.0 / 100, self.0 % 100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_from_cents() {
        let money = Money::from_cents(1234);
        assert_eq!(money.cents(), 1234);
        assert_eq!(money.units(), 12);
        assert_eq!(money.cents_part(), 34);
    }

    #[test]
    fn test_money_display() {
        assert_eq!(Money::from_cents(1234).to_string(), "R$12.34");
        assert_eq!(Money::from_cents(5).to_string(), "R$0.05");
        assert_eq!(Money::from_cents(-1234).to_string(), "-R$12.34");
    }

    #[test]
    fn test_money_multiply() {
        assert_eq!(Money::from_units(10).multiply(3), Some(Money::from_cents(3000)));
        assert_eq!(Money::from_cents(i64::MAX / 2).multiply(3), None);
    }

    #[test]
    fn test_tax_id_strips_punctuation() {
        let tax_id = TaxId::parse("529.982.247-25", PersonKind::Individual).unwrap();
        assert_eq!(tax_id.as_str(), "52998224725");

        let tax_id = TaxId::parse("11.222.333/0001-81", PersonKind::Corporate).unwrap();
        assert_eq!(tax_id.as_str(), "11222333000181");
    }

    #[test]
    fn test_tax_id_length_depends_on_kind() {
        assert!(TaxId::parse("52998224725", PersonKind::Corporate).is_err());
        assert!(TaxId::parse("11222333000181", PersonKind::Individual).is_err());
        let err = TaxId::parse("123", PersonKind::Individual).unwrap_err();
        assert_eq!(err.field, "taxId");
    }

    #[test]
    fn test_tax_id_rejects_repeated_digit() {
        assert!(TaxId::parse("111.111.111-11", PersonKind::Individual).is_err());
    }

    #[test]
    fn test_commission_rate() {
        let rate = CommissionRate::from_percent(12.5).unwrap();
        assert_eq!(rate.basis_points(), 1250);
        assert_eq!(rate.to_string(), "12.50%");
        assert!(CommissionRate::from_percent(100.01).is_err());
        assert!(CommissionRate::from_percent(-1.0).is_err());
        assert!(CommissionRate::from_percent(f64::NAN).is_err());
        assert_eq!(CommissionRate::from_basis_points(20_000).basis_points(), 10_000);
    }
}
