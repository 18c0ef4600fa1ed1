//! Bursar Engine
//!
//! The approval state machines and accounting engines of the brokerage
//! core:
//!
//! - [`Workflows`]: deposit/withdrawal/KYC requests, one parameterized
//!   pending → approved/rejected state machine
//! - [`PositionBook`]: per-symbol holdings, weighted-average cost,
//!   realized P&L
//! - [`TimedTrades`]: wager-style contracts settled by an explicit
//!   admin result
//! - [`IpoDesk`]: IPO offerings, applications, and allotment
//!
//! All balance mutation is delegated to the injected
//! [`bursar_ledger::LedgerStore`]; no engine touches a balance directly.

#![warn(clippy::all)]

mod error;
mod ipo;
mod ports;
mod positions;
mod stub;
mod timed_trades;
mod workflow;

pub use error::{EngineError, EngineResult};
pub use ipo::IpoDesk;
pub use ports::{MarketPricePort, NotificationPort};
pub use positions::{PortfolioSummary, PortfolioTotals, PositionBook, PositionValuation};
pub use stub::{NullNotifier, RecordingNotifier, StaticPrices};
pub use timed_trades::TimedTrades;
pub use workflow::{WorkflowConfig, Workflows};
