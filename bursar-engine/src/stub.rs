//! Stub implementations for testing.
//!
//! These implementations simulate the market data and notification
//! collaborators without any external service.

use async_trait::async_trait;
use bursar_domain::{CoreEvent, Symbol};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::{Mutex, RwLock};

use crate::ports::{MarketPricePort, NotificationPort};

// =============================================================================
// Static Prices
// =============================================================================

/// Market price stub with manually injected quotes.
pub struct StaticPrices {
    prices: RwLock<HashMap<String, Decimal>>,
}

impl StaticPrices {
    /// Create a stub with no quotes.
    pub fn new() -> Self {
        Self { prices: RwLock::new(HashMap::new()) }
    }

    /// Set the quote for a symbol.
    pub fn set_price(&self, symbol: &Symbol, price: Decimal) {
        let mut prices = self.prices.write().unwrap();
        prices.insert(symbol.as_str().to_string(), price);
    }

    /// Remove the quote for a symbol.
    pub fn clear_price(&self, symbol: &Symbol) {
        let mut prices = self.prices.write().unwrap();
        prices.remove(symbol.as_str());
    }
}

impl Default for StaticPrices {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MarketPricePort for StaticPrices {
    async fn price(&self, symbol: &Symbol) -> Option<Decimal> {
        let prices = self.prices.read().unwrap();
        prices.get(symbol.as_str()).copied()
    }
}

// =============================================================================
// Notifiers
// =============================================================================

/// Notification sink that drops every event.
pub struct NullNotifier;

impl NotificationPort for NullNotifier {
    fn notify(&self, _event: CoreEvent) {}
}

/// Notification sink that records every event, for assertions in tests.
pub struct RecordingNotifier {
    events: Mutex<Vec<CoreEvent>>,
}

impl RecordingNotifier {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self { events: Mutex::new(Vec::new()) }
    }

    /// Snapshot of the events received so far.
    pub fn events(&self) -> Vec<CoreEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Number of events received so far.
    pub fn len(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    /// True if no event was received.
    pub fn is_empty(&self) -> bool {
        self.events.lock().unwrap().is_empty()
    }
}

impl Default for RecordingNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationPort for RecordingNotifier {
    fn notify(&self, event: CoreEvent) {
        self.events.lock().unwrap().push(event);
    }
}

// =============================================================================
// Tests
// =============================================================================
