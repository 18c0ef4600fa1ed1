//! Ledger layer errors

use bursar_domain::AccountId;
use rust_decimal::Decimal;
use thiserror::Error;

/// Errors that can occur in the ledger store
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    /// Operation amount was zero or negative
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Spendable balance cannot cover the requested debit or block
    #[error("Insufficient funds: account {account_id} requested {requested}, spendable {spendable}")]
    InsufficientFunds {
        account_id: AccountId,
        requested: Decimal,
        spendable: Decimal,
    },

    /// Account does not exist
    #[error("Account not found: {0}")]
    NotFound(AccountId),

    /// Account was soft-disabled; it no longer accepts new spends
    #[error("Account disabled: {0}")]
    AccountDisabled(AccountId),

    /// A balance invariant would be broken; signals a bug, not user error
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),
}

impl LedgerError {
    /// Create an insufficient-funds error from the observed state
    pub fn insufficient(account_id: AccountId, requested: Decimal, spendable: Decimal) -> Self {
        Self::InsufficientFunds { account_id, requested, spendable }
    }
}
