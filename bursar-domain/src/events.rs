//! Domain Events for Bursar
//!
//! Events represent state changes in the ledger core. They are handed to
//! the notification sink after a mutation commits; delivery is
//! fire-and-forget and never rolls a mutation back.

use crate::entities::{
    AccountId, ApplicationId, IpoId, RequestId, Side, TradeId,
};
use crate::value_objects::Symbol;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Events emitted on state transitions in the core
///
/// Events are immutable records; external collaborators (UI push,
/// email/SMS) consume them from the notification sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CoreEvent {
    /// A new account was opened at registration
    AccountOpened {
        account_id: AccountId,
        timestamp: DateTime<Utc>,
    },

    /// A user submitted a request (deposit, withdrawal, or KYC)
    RequestSubmitted {
        request_id: RequestId,
        account_id: AccountId,
        /// Request kind name ("deposit", "withdrawal", "kyc")
        kind: String,
        /// Amount for money requests, None for KYC
        amount: Option<Decimal>,
        timestamp: DateTime<Utc>,
    },

    /// An administrator approved a pending request
    RequestApproved {
        request_id: RequestId,
        account_id: AccountId,
        kind: String,
        timestamp: DateTime<Utc>,
    },

    /// An administrator rejected a pending request
    RequestRejected {
        request_id: RequestId,
        account_id: AccountId,
        kind: String,
        reason: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// A buy or sell was executed against the position book
    OrderExecuted {
        account_id: AccountId,
        symbol: Symbol,
        side: Side,
        quantity: Decimal,
        price: Decimal,
        /// Realized P&L for sells, None for buys
        realized_pnl: Option<Decimal>,
        timestamp: DateTime<Utc>,
    },

    /// A timed trade was opened and its stake blocked
    TimedTradeOpened {
        trade_id: TradeId,
        account_id: AccountId,
        stake: Decimal,
        expires_at: DateTime<Utc>,
        timestamp: DateTime<Utc>,
    },

    /// An administrator set the result of a timed trade
    TimedTradeSettled {
        trade_id: TradeId,
        account_id: AccountId,
        /// Outcome name ("win", "lose", "draw")
        outcome: String,
        timestamp: DateTime<Utc>,
    },

    /// A user applied for IPO lots and the cost was blocked
    IpoApplicationSubmitted {
        application_id: ApplicationId,
        account_id: AccountId,
        ipo_id: IpoId,
        blocked_amount: Decimal,
        timestamp: DateTime<Utc>,
    },

    /// An IPO application reached a terminal allotment state
    IpoApplicationDecided {
        application_id: ApplicationId,
        account_id: AccountId,
        allotted: bool,
        timestamp: DateTime<Utc>,
    },
}

impl CoreEvent {
    /// Get the account ID from any event
    pub fn account_id(&self) -> AccountId {
        match self {
            CoreEvent::AccountOpened { account_id, .. }
            | CoreEvent::RequestSubmitted { account_id, .. }
            | CoreEvent::RequestApproved { account_id, .. }
            | CoreEvent::RequestRejected { account_id, .. }
            | CoreEvent::OrderExecuted { account_id, .. }
            | CoreEvent::TimedTradeOpened { account_id, .. }
            | CoreEvent::TimedTradeSettled { account_id, .. }
            | CoreEvent::IpoApplicationSubmitted { account_id, .. }
            | CoreEvent::IpoApplicationDecided { account_id, .. } => *account_id,
        }
    }

    /// Get the timestamp from any event
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            CoreEvent::AccountOpened { timestamp, .. }
            | CoreEvent::RequestSubmitted { timestamp, .. }
            | CoreEvent::RequestApproved { timestamp, .. }
            | CoreEvent::RequestRejected { timestamp, .. }
            | CoreEvent::OrderExecuted { timestamp, .. }
            | CoreEvent::TimedTradeOpened { timestamp, .. }
            | CoreEvent::TimedTradeSettled { timestamp, .. }
            | CoreEvent::IpoApplicationSubmitted { timestamp, .. }
            | CoreEvent::IpoApplicationDecided { timestamp, .. } => *timestamp,
        }
    }

    /// Get the event type name
    pub fn event_type(&self) -> &'static str {
        match self {
            CoreEvent::AccountOpened { .. } => "account_opened",
            CoreEvent::RequestSubmitted { .. } => "request_submitted",
            CoreEvent::RequestApproved { .. } => "request_approved",
            CoreEvent::RequestRejected { .. } => "request_rejected",
            CoreEvent::OrderExecuted { .. } => "order_executed",
            CoreEvent::TimedTradeOpened { .. } => "timed_trade_opened",
            CoreEvent::TimedTradeSettled { .. } => "timed_trade_settled",
            CoreEvent::IpoApplicationSubmitted { .. } => "ipo_application_submitted",
            CoreEvent::IpoApplicationDecided { .. } => "ipo_application_decided",
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
