//! Engine port definitions.
//!
//! Ports define the interfaces toward the excluded collaborators
//! (market data feed, notification fan-out). Adapters implement them;
//! stubs live in [`crate::stub`].

use async_trait::async_trait;
use bursar_domain::{CoreEvent, Symbol};
use rust_decimal::Decimal;

// =============================================================================
// Market Price Port
// =============================================================================

/// Port for the injected market price lookup.
///
/// Used only to value open positions for unrealized P&L display. The
/// core never acts on these prices; a missing quote simply leaves the
/// valuation empty.
#[async_trait]
pub trait MarketPricePort: Send + Sync {
    /// Current market price for a symbol, if a quote exists.
    async fn price(&self, symbol: &Symbol) -> Option<Decimal>;
}

// =============================================================================
// Notification Port
// =============================================================================

/// Port for the fire-and-forget event sink.
///
/// Called after a state transition commits. Implementations must not
/// fail the caller: a lost notification never rolls back a ledger
/// mutation.
pub trait NotificationPort: Send + Sync {
    /// Hand an event to the sink. Delivery is best-effort.
    fn notify(&self, event: CoreEvent);
}
