//! Bursar Domain
//!
//! Core types for the brokerage ledger and position-accounting core:
//! value objects, entities, and domain events.
//!
//! This crate is pure data and invariants. It has no storage, no I/O,
//! and no async code. Higher layers (`bursar-ledger`, `bursar-engine`)
//! enforce the cross-entity invariants.

#![warn(clippy::all)]

pub mod entities;
pub mod events;
pub mod value_objects;

// Re-export commonly used types
pub use entities::{
    Account, AccountId, ApplicationId, EntryId, EntryKind, IpoApplication, IpoId, IpoOffering,
    IpoStatus, LedgerEntry, Position, RealizedPnl, RequestId, RequestKind, RequestStatus, Side,
    TimedTrade, TradeId, TradeOutcome, TradeStatus, WorkflowRequest,
};
pub use events::CoreEvent;
pub use value_objects::{Amount, DomainError, Symbol};
