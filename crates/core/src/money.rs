//! Monetary amounts in minor units (cents), single currency per value.

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// ISO-4217 style currency code (three upper-case ASCII letters).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Currency(String);

impl Currency {
    pub fn parse(code: &str) -> DomainResult<Self> {
        let code = code.trim().to_ascii_uppercase();
        if code.len() != 3 || !code.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(DomainError::validation(format!(
                "currency must be a three-letter code, got '{code}'"
            )));
        }
        Ok(Self(code))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Currency {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Currency::parse(&value)
    }
}

impl From<Currency> for String {
    fn from(value: Currency) -> Self {
        value.0
    }
}

impl core::fmt::Display for Currency {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    pub amount_minor: u64,
    pub currency: Currency,
}

impl Money {
    pub fn new(amount_minor: u64, currency: Currency) -> Self {
        Self {
            amount_minor,
            currency,
        }
    }

    pub fn zero(currency: Currency) -> Self {
        Self::new(0, currency)
    }

    /// `quantity × unit_price`, failing on overflow.
    pub fn line_total(quantity: u64, unit_price_minor: u64, currency: &Currency) -> DomainResult<Self> {
        let amount = quantity
            .checked_mul(unit_price_minor)
            .ok_or_else(|| DomainError::validation("line total overflows"))?;
        Ok(Self::new(amount, currency.clone()))
    }

    pub fn checked_add(&self, other: &Money) -> DomainResult<Money> {
        if self.currency != other.currency {
            return Err(DomainError::validation(format!(
                "cannot add {} to {}",
                other.currency, self.currency
            )));
        }
        let amount = self
            .amount_minor
            .checked_add(other.amount_minor)
            .ok_or_else(|| DomainError::validation("amount overflows"))?;
        Ok(Money::new(amount, self.currency.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn currency_is_normalized_and_validated() {
        assert_eq!(Currency::parse(" usd ").unwrap().as_str(), "USD");
        assert!(Currency::parse("US").is_err());
        assert!(Currency::parse("U5D").is_err());
    }

    #[test]
    fn adding_mixed_currencies_fails() {
        let usd = Money::new(100, Currency::parse("USD").unwrap());
        let eur = Money::new(100, Currency::parse("EUR").unwrap());
        assert!(matches!(usd.checked_add(&eur), Err(DomainError::Validation(_))));
        assert_eq!(usd.checked_add(&usd).unwrap().amount_minor, 200);
    }

    #[test]
    fn line_total_detects_overflow() {
        let usd = Currency::parse("USD").unwrap();
        assert_eq!(Money::line_total(3, 250, &usd).unwrap().amount_minor, 750);
        assert!(Money::line_total(u64::MAX, 2, &usd).is_err());
    }

    #[test]
    fn currency_deserialization_validates() {
        let ok: Money = serde_json::from_str(r#"{"amount_minor":5,"currency":"eur"}"#).unwrap();
        assert_eq!(ok.currency.as_str(), "EUR");
        assert!(serde_json::from_str::<Money>(r#"{"amount_minor":5,"currency":"euro"}"#).is_err());
    }
}
