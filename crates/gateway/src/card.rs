//! Card data as sent to the gateway. Never rendered in full by `Debug`.

use serde::Serialize;

use crate::error::{GatewayError, Result};

/// Card expiry split from the `MM/YY` form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CardExpiry {
    #[serde(rename = "expiry_month")]
    pub month: u8,
    /// Four-digit year.
    #[serde(rename = "expiry_year")]
    pub year: u16,
}

impl CardExpiry {
    /// Parses `MM/YY`, prefixing the year with `20`.
    pub fn parse(raw: &str) -> Result<Self> {
        let invalid =
            || GatewayError::Validation(format!("card expiry must be MM/YY, got {raw:?}"));

        let (month, year) = raw.trim().split_once('/').ok_or_else(invalid)?;
        if month.len() != 2
            || year.len() != 2
            || !month.bytes().all(|b| b.is_ascii_digit())
            || !year.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(invalid());
        }

        let month: u8 = month.parse().map_err(|_| invalid())?;
        if !(1..=12).contains(&month) {
            return Err(invalid());
        }
        let year: u16 = format!("20{year}").parse().map_err(|_| invalid())?;
        Ok(Self { month, year })
    }
}

#[derive(Clone, Serialize)]
pub struct Card {
    pub holder_name: String,
    pub number: String,
    pub cvv: String,
    #[serde(flatten)]
    pub expiry: CardExpiry,
}

impl Card {
    /// Builds a card, stripping spaces and dashes from the number.
    pub fn new(
        holder_name: impl Into<String>,
        number: &str,
        cvv: &str,
        expiry: &str,
    ) -> Result<Self> {
        let number: String = number.chars().filter(|c| !matches!(c, ' ' | '-')).collect();
        if !(13..=19).contains(&number.len()) || !number.bytes().all(|b| b.is_ascii_digit()) {
            return Err(GatewayError::Validation(
                "card number must have 13 to 19 digits".to_string(),
            ));
        }

        let cvv = cvv.trim();
        if !(3..=4).contains(&cvv.len()) || !cvv.bytes().all(|b| b.is_ascii_digit()) {
            return Err(GatewayError::Validation(
                "card cvv must have 3 or 4 digits".to_string(),
            ));
        }

        Ok(Self {
            holder_name: holder_name.into(),
            number,
            cvv: cvv.to_string(),
            expiry: CardExpiry::parse(expiry)?,
        })
    }

    /// Last four digits of the number.
    pub fn last_four(&self) -> &str {
        &self.number[self.number.len().saturating_sub(4)..]
    }
}

impl std::fmt::Debug for Card {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Card")
            .field("holder_name", &self.holder_name)
            .field("number", &format_args!("****{}", self.last_four()))
            .field("cvv", &"***")
            .field("expiry", &self.expiry)
            .finish()
    }
}
