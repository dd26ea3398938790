//! Currency codes, currency records and monetary amounts.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::InvalidCurrencyCode;
use crate::identifiers::CurrencyId;

/// ISO 4217-style currency code: exactly three ASCII letters, upper case.
///
/// Every lookup and creation goes through [`CurrencyCode::parse`], so two
/// spellings of the same code (`"eur"`, `" EUR "`) always map to one value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CurrencyCode(String);

impl CurrencyCode {
    /// Normalize and validate a raw code.
    pub fn parse(raw: &str) -> Result<Self, InvalidCurrencyCode> {
        let trimmed = raw.trim();
        if trimmed.len() != 3 || !trimmed.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(InvalidCurrencyCode(raw.to_string()));
        }
        Ok(Self(trimmed.to_ascii_uppercase()))
    }

    /// Get the code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Get the standard decimal places for this currency.
    pub fn decimal_places(&self) -> u32 {
        match self.0.as_str() {
            "JPY" | "KRW" | "VND" => 0,
            "BHD" | "KWD" | "OMR" => 3,
            _ => 2,
        }
    }

    /// Common currencies
    pub fn usd() -> Self {
        Self("USD".to_string())
    }

    pub fn eur() -> Self {
        Self("EUR".to_string())
    }

    pub fn gbp() -> Self {
        Self("GBP".to_string())
    }

    pub fn jpy() -> Self {
        Self("JPY".to_string())
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CurrencyCode {
    type Err = InvalidCurrencyCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for CurrencyCode {
    type Error = InvalidCurrencyCode;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CurrencyCode> for String {
    fn from(code: CurrencyCode) -> Self {
        code.0
    }
}

/// A persisted currency record.
///
/// Only `name` may change after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Currency {
    /// Store-allocated identity.
    pub id: CurrencyId,
    /// Normalized code, unique across all records.
    pub code: CurrencyCode,
    /// Optional display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} ({})", self.code, name),
            None => write!(f, "{}", self.code),
        }
    }
}

/// A monetary amount with currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    /// The amount value (high precision decimal).
    pub value: Decimal,
    /// Currency of the amount.
    pub currency: CurrencyCode,
}

impl Money {
    /// Create a new Money instance.
    pub fn new(value: Decimal, currency: CurrencyCode) -> Self {
        Self { value, currency }
    }

    /// Round to the currency's standard decimal places.
    pub fn round(&self) -> Self {
        let places = self.currency.decimal_places();
        Self {
            value: self.value.round_dp(places),
            currency: self.currency.clone(),
        }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.value, self.currency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_code_normalization() {
        assert_eq!(CurrencyCode::parse("eur").unwrap(), CurrencyCode::eur());
        assert_eq!(CurrencyCode::parse(" Gbp ").unwrap(), CurrencyCode::gbp());
        assert_eq!(CurrencyCode::parse("USD").unwrap().as_str(), "USD");
    }

    #[test]
    fn test_code_rejects_malformed() {
        assert!(CurrencyCode::parse("").is_err());
        assert!(CurrencyCode::parse("US").is_err());
        assert!(CurrencyCode::parse("USDT").is_err());
        assert!(CurrencyCode::parse("U5D").is_err());
        assert!(CurrencyCode::parse("ÜSD").is_err());
    }

    #[test]
    fn test_code_serde_validates() {
        let code: CurrencyCode = serde_json::from_str("\"jpy\"").unwrap();
        assert_eq!(code, CurrencyCode::jpy());
        assert!(serde_json::from_str::<CurrencyCode>("\"yen\"").is_ok());
        assert!(serde_json::from_str::<CurrencyCode>("\"yens\"").is_err());
        assert_eq!(serde_json::to_string(&code).unwrap(), "\"JPY\"");
    }

    #[test]
    fn test_currency_decimal_places() {
        assert_eq!(CurrencyCode::usd().decimal_places(), 2);
        assert_eq!(CurrencyCode::jpy().decimal_places(), 0);
        assert_eq!(CurrencyCode::parse("KWD").unwrap().decimal_places(), 3);
    }

    #[test]
    fn test_money_round() {
        let yen = Money::new(dec!(1234.567), CurrencyCode::jpy());
        assert_eq!(yen.round().value, dec!(1235));

        let gbp = Money::new(dec!(85.869565), CurrencyCode::gbp());
        assert_eq!(gbp.round().value, dec!(85.87));
    }

    proptest! {
        #[test]
        fn prop_case_variants_normalize_to_one_code(code in "[a-zA-Z]{3}") {
            let lower = CurrencyCode::parse(&code.to_lowercase()).unwrap();
            let upper = CurrencyCode::parse(&code.to_uppercase()).unwrap();
            prop_assert_eq!(&lower, &upper);
            prop_assert_eq!(lower.as_str(), code.to_uppercase());
        }
    }
}
