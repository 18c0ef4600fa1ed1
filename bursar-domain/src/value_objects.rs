//! Value Objects for the Bursar Domain
//!
//! Immutable, validated domain primitives.
//! All value objects enforce invariants at construction time.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Domain errors for value object validation and entity transitions
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    /// Operation amount must be positive
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Symbol must be a valid ticker
    #[error("Invalid symbol: {0}")]
    InvalidSymbol(String),

    /// Decision against a request already in a terminal state
    #[error("Already decided: {0}")]
    AlreadyDecided(String),

    /// Sell quantity exceeds the held position
    #[error("Insufficient position: {0}")]
    InsufficientPosition(String),

    /// IPO offering parameters are invalid
    #[error("Invalid offering: {0}")]
    InvalidOffering(String),
}

// =============================================================================
// Amount
// =============================================================================

/// Amount represents a positive money amount in the ledger currency
///
/// # Invariants
/// - Must be > 0
///
/// Balances themselves are plain `Decimal` values owned by the ledger;
/// `Amount` is the type of operation inputs (credits, debits, stakes),
/// which are always strictly positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Amount(Decimal);

impl Amount {
    /// Create a new Amount with validation
    ///
    /// # Errors
    /// Returns `DomainError::InvalidAmount` if value <= 0
    pub fn new(value: Decimal) -> Result<Self, DomainError> {
        if value <= Decimal::ZERO {
            return Err(DomainError::InvalidAmount("Amount must be positive".to_string()));
        }
        Ok(Self(value))
    }

    /// Get the underlying Decimal value
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Symbol
// =============================================================================

/// Symbol represents a listed security ticker (e.g., ACME)
///
/// # Invariants
/// - Non-empty, at most 12 characters
/// - Uppercase ASCII letters, digits, and '.' only
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Symbol(String);

impl Symbol {
    /// Create a Symbol from a ticker string
    ///
    /// # Examples
    /// ```
    /// # use bursar_domain::value_objects::Symbol;
    /// let symbol = Symbol::new("ACME").unwrap();
    /// assert_eq!(symbol.as_str(), "ACME");
    /// ```
    ///
    /// # Errors
    /// Returns `DomainError::InvalidSymbol` if the ticker is empty, too
    /// long, or contains characters outside [A-Z0-9.]
    pub fn new(ticker: &str) -> Result<Self, DomainError> {
        if ticker.is_empty() {
            return Err(DomainError::InvalidSymbol("Ticker must be non-empty".to_string()));
        }

        if ticker.len() > 12 {
            return Err(DomainError::InvalidSymbol(format!("Ticker too long: {}", ticker)));
        }

        let valid = ticker
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '.');
        if !valid {
            return Err(DomainError::InvalidSymbol(format!(
                "Ticker must be uppercase alphanumeric: {}",
                ticker
            )));
        }

        Ok(Self(ticker.to_string()))
    }

    /// Get the ticker as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    // Amount tests
    #[test]
    fn test_amount_validation() {
        assert!(Amount::new(dec!(100.0)).is_ok());
        assert!(Amount::new(dec!(0.01)).is_ok());
        assert!(Amount::new(dec!(-1.0)).is_err());
        assert!(Amount::new(dec!(0.0)).is_err());
    }

    #[test]
    fn test_amount_as_decimal() {
        let amount = Amount::new(dec!(12345.67)).unwrap();
        assert_eq!(amount.as_decimal(), dec!(12345.67));
    }

    #[test]
    fn test_amount_display() {
        let amount = Amount::new(dec!(980.50)).unwrap();
        assert_eq!(amount.to_string(), "980.50");
    }

    // Symbol tests
    #[test]
    fn test_symbol_valid_tickers() {
        assert!(Symbol::new("ACME").is_ok());
        assert!(Symbol::new("A").is_ok());
        assert!(Symbol::new("BRK.B").is_ok());
        assert!(Symbol::new("X2").is_ok());
    }

    #[test]
    fn test_symbol_invalid() {
        assert!(Symbol::new("").is_err());
        assert!(Symbol::new("acme").is_err());
        assert!(Symbol::new("TOO-LONG-TICKER").is_err());
        assert!(Symbol::new("A B").is_err());
    }

    #[test]
    fn test_symbol_as_str() {
        let symbol = Symbol::new("ACME").unwrap();
        assert_eq!(symbol.as_str(), "ACME");
        assert_eq!(symbol.to_string(), "ACME");
    }
}
