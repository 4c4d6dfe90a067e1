//! Currency codes and their minor-unit factors.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::ValidationError;

/// ISO 4217 alphabetic currency code, always upper case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CurrencyCode([u8; 3]);

impl CurrencyCode {
    /// Parses a three-letter code. Lower-case input is normalized.
    pub fn new(code: &str) -> Result<Self, ValidationError> {
        let trimmed = code.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::empty_field("currency"));
        }
        let bytes = trimmed.as_bytes();
        if bytes.len() != 3 || !bytes.iter().all(|b| b.is_ascii_alphabetic()) {
            return Err(ValidationError::invalid_format(
                "currency",
                format!("'{}' is not a three-letter currency code", trimmed),
            ));
        }
        let mut out = [0u8; 3];
        for (slot, b) in out.iter_mut().zip(bytes) {
            *slot = b.to_ascii_uppercase();
        }
        Ok(Self(out))
    }

    pub fn as_str(&self) -> &str {
        // Constructed only from ASCII letters.
        std::str::from_utf8(&self.0).unwrap_or("???")
    }

    /// Number of decimal places in the currency's minor unit.
    pub fn minor_unit_exponent(&self) -> u32 {
        match self.as_str() {
            "BIF" | "CLP" | "DJF" | "GNF" | "ISK" | "JPY" | "KMF" | "KRW" | "PYG" | "RWF"
            | "UGX" | "UYI" | "VND" | "VUV" | "XAF" | "XOF" | "XPF" => 0,
            "BHD" | "IQD" | "JOD" | "KWD" | "LYD" | "OMR" | "TND" => 3,
            _ => 2,
        }
    }

    /// Multiplier from major to minor units (100 for USD, 1 for JPY).
    pub fn minor_unit_factor(&self) -> i64 {
        10_i64.pow(self.minor_unit_exponent())
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CurrencyCode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for CurrencyCode {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<CurrencyCode> for String {
    fn from(code: CurrencyCode) -> Self {
        code.as_str().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_to_upper_case() {
        assert_eq!(CurrencyCode::new("usd").unwrap().as_str(), "USD");
    }

    #[test]
    fn rejects_wrong_length_and_digits() {
        assert!(CurrencyCode::new("US").is_err());
        assert!(CurrencyCode::new("U5D").is_err());
        assert!(CurrencyCode::new("").is_err());
    }

    #[test]
    fn minor_unit_factors_follow_iso_exponents() {
        assert_eq!(CurrencyCode::new("USD").unwrap().minor_unit_factor(), 100);
        assert_eq!(CurrencyCode::new("JPY").unwrap().minor_unit_factor(), 1);
        assert_eq!(CurrencyCode::new("KWD").unwrap().minor_unit_factor(), 1000);
    }

    #[test]
    fn deserializes_from_json_string() {
        let code: CurrencyCode = serde_json::from_str("\"eur\"").unwrap();
        assert_eq!(code.to_string(), "EUR");
        assert!(serde_json::from_str::<CurrencyCode>("\"EURO\"").is_err());
    }
}
