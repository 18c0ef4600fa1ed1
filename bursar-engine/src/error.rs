//! Engine error types.

use bursar_domain::DomainError;
use bursar_ledger::LedgerError;
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by the approval and accounting engines.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// Domain error (invalid amount, terminal-state transition, ...)
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// Ledger error (insufficient funds, unknown account, ...)
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Request, trade, offering, or application not found
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: Uuid },

    /// IPO application below the offering's minimum investment
    #[error("Below minimum investment: requested {requested}, minimum {minimum}")]
    BelowMinimumInvestment { requested: Decimal, minimum: Decimal },

    /// Withdrawal rejections must carry a reason
    #[error("Rejection reason is required for withdrawal requests")]
    RejectionReasonRequired,
}

impl EngineError {
    /// Create a not-found error
    pub fn not_found(entity: &'static str, id: Uuid) -> Self {
        Self::NotFound { entity, id }
    }

    /// True if this error is the idempotency guard (a decision was
    /// replayed against an already-terminal record); callers may treat
    /// it as "no-op, already handled"
    pub fn is_already_decided(&self) -> bool {
        matches!(self, EngineError::Domain(DomainError::AlreadyDecided(_)))
    }
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
