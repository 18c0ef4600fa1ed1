//! Daemon error types.

use bursar_domain::DomainError;
use bursar_engine::EngineError;
use bursar_ledger::LedgerError;
use thiserror::Error;

/// Daemon-level errors.
#[derive(Debug, Error)]
pub enum DaemonError {
    /// Domain error
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// Ledger error
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Engine error
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// API server error
    #[error("Server error: {0}")]
    Server(String),
}

/// Result type for daemon operations.
pub type DaemonResult<T> = Result<T, DaemonError>;
