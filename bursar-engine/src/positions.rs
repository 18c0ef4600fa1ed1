//! Position accounting engine.
//!
//! Maintains per-account, per-symbol positions with weighted-average
//! cost and a realized-P&L log. Cash legs go through the ledger; the
//! ordering makes each operation all-or-nothing:
//!
//! - buy: debit first (the step that can fail), then update the position
//! - sell: reduce the position first (the step that can fail), then
//!   credit, which cannot fail once the reduction succeeded
//!
//! Unrealized P&L is a display concern: positions are marked at an
//! injected market price and a missing quote simply leaves the
//! valuation empty.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use bursar_domain::{
    AccountId, Amount, DomainError, EntryKind, Position, RealizedPnl, Symbol,
};
use bursar_ledger::{LedgerError, LedgerStore};

use crate::error::EngineResult;
use crate::ports::MarketPricePort;

// =============================================================================
// Portfolio views
// =============================================================================

/// A position marked at the injected market price.
#[derive(Debug, Clone, Serialize)]
pub struct PositionValuation {
    pub position: Position,
    /// Current quote, None when the market feed has no price
    pub market_price: Option<Decimal>,
    /// quantity × market_price
    pub market_value: Option<Decimal>,
    /// quantity × (market_price − avg_cost)
    pub unrealized_pnl: Option<Decimal>,
}

/// Totals over all priced positions of an account.
#[derive(Debug, Clone, Serialize)]
pub struct PortfolioTotals {
    pub realized_pnl: Decimal,
    pub unrealized_pnl: Decimal,
    pub market_value: Decimal,
}

/// Read-only projection combining positions and realized P&L records.
#[derive(Debug, Clone, Serialize)]
pub struct PortfolioSummary {
    pub account_id: AccountId,
    pub positions: Vec<PositionValuation>,
    pub realized: Vec<RealizedPnl>,
    pub totals: PortfolioTotals,
}

// =============================================================================
// Position Book
// =============================================================================

/// Per-account, per-symbol position registry.
pub struct PositionBook {
    ledger: Arc<LedgerStore>,
    positions: RwLock<HashMap<(AccountId, Symbol), Position>>,
    realized: RwLock<Vec<RealizedPnl>>,
}

impl PositionBook {
    /// Create an empty book over the given ledger.
    pub fn new(ledger: Arc<LedgerStore>) -> Self {
        Self {
            ledger,
            positions: RwLock::new(HashMap::new()),
            realized: RwLock::new(Vec::new()),
        }
    }

    /// Execute a buy: debit cash, then fold the fill into the position
    /// at weighted-average cost.
    ///
    /// # Errors
    /// - `InvalidAmount` if quantity or price is not positive
    /// - `InsufficientFunds` if the spendable balance cannot cover
    ///   `quantity × price` (position untouched)
    pub async fn buy(
        &self,
        account_id: AccountId,
        symbol: Symbol,
        quantity: Decimal,
        price: Decimal,
        correlation_id: Uuid,
    ) -> EngineResult<Position> {
        let quantity = Amount::new(quantity)?;
        let price = Amount::new(price)?;
        self.check_account_active(account_id).await?;

        let cost = quantity.as_decimal() * price.as_decimal();
        self.ledger
            .debit(account_id, cost, EntryKind::TradeDebit, correlation_id)
            .await?;

        let position = {
            let mut positions = self.positions.write().unwrap();
            let position = positions
                .entry((account_id, symbol.clone()))
                .or_insert_with(|| Position::new(account_id, symbol));
            position.apply_buy(quantity, price);
            position.clone()
        };

        info!(%account_id, symbol = %position.symbol, %quantity, %price, %cost, "buy executed");
        Ok(position)
    }

    /// Execute a sell: reduce the position, then credit the proceeds.
    ///
    /// The realized P&L record is appended regardless of sign; the
    /// remaining lot keeps its average cost.
    ///
    /// # Errors
    /// - `InvalidAmount` if quantity or price is not positive
    /// - `InsufficientPosition` if quantity exceeds the held quantity
    ///   (nothing changes, no ledger write)
    pub async fn sell(
        &self,
        account_id: AccountId,
        symbol: Symbol,
        quantity: Decimal,
        price: Decimal,
        correlation_id: Uuid,
    ) -> EngineResult<(Position, RealizedPnl)> {
        let quantity = Amount::new(quantity)?;
        let price = Amount::new(price)?;
        self.check_account_active(account_id).await?;

        let (position, record) = {
            let mut positions = self.positions.write().unwrap();
            let position = positions
                .get_mut(&(account_id, symbol.clone()))
                .ok_or_else(|| {
                    DomainError::InsufficientPosition(format!("no position in {}", symbol))
                })?;

            let avg_cost = position.avg_cost;
            let pnl = position.apply_sell(quantity, price)?;

            let record = RealizedPnl {
                id: Uuid::now_v7(),
                account_id,
                symbol: symbol.clone(),
                quantity: quantity.as_decimal(),
                price: price.as_decimal(),
                avg_cost,
                pnl,
                occurred_at: Utc::now(),
            };
            (position.clone(), record)
        };

        // Proceeds credit cannot fail once the reduction succeeded
        let proceeds = quantity.as_decimal() * price.as_decimal();
        self.ledger
            .credit(account_id, proceeds, EntryKind::TradeCredit, correlation_id)
            .await?;

        {
            let mut realized = self.realized.write().unwrap();
            realized.push(record.clone());
        }

        info!(%account_id, symbol = %record.symbol, %quantity, %price, pnl = %record.pnl,
            "sell executed");
        Ok((position, record))
    }

    /// Fold an IPO allotment into the position at the effective price.
    ///
    /// The cash leg was already moved by the IPO debit; only the
    /// position changes here.
    pub(crate) fn record_allotment(
        &self,
        account_id: AccountId,
        symbol: Symbol,
        quantity: Amount,
        price: Amount,
    ) {
        let mut positions = self.positions.write().unwrap();
        let position = positions
            .entry((account_id, symbol.clone()))
            .or_insert_with(|| Position::new(account_id, symbol));
        position.apply_buy(quantity, price);
        debug!(%account_id, symbol = %position.symbol, %quantity, %price, "allotment recorded");
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    /// Current position in one symbol, if any.
    pub fn position(&self, account_id: AccountId, symbol: &Symbol) -> Option<Position> {
        let positions = self.positions.read().unwrap();
        positions.get(&(account_id, symbol.clone())).cloned()
    }

    /// All open (non-zero) positions of an account, sorted by symbol.
    pub fn positions_for(&self, account_id: AccountId) -> Vec<Position> {
        let positions = self.positions.read().unwrap();
        let mut found: Vec<Position> = positions
            .values()
            .filter(|p| p.account_id == account_id && p.quantity > Decimal::ZERO)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.symbol.as_str().cmp(b.symbol.as_str()));
        found
    }

    /// Realized P&L records of an account, in execution order.
    pub fn realized_for(&self, account_id: AccountId) -> Vec<RealizedPnl> {
        let realized = self.realized.read().unwrap();
        realized.iter().filter(|r| r.account_id == account_id).cloned().collect()
    }

    /// Build the portfolio projection for an account, marking open
    /// positions at the injected market price. Purely derived, no side
    /// effects.
    pub async fn portfolio_summary(
        &self,
        account_id: AccountId,
        market: &dyn MarketPricePort,
    ) -> PortfolioSummary {
        let positions = self.positions_for(account_id);
        let realized = self.realized_for(account_id);

        let mut valuations = Vec::with_capacity(positions.len());
        let mut total_unrealized = Decimal::ZERO;
        let mut total_value = Decimal::ZERO;

        for position in positions {
            let market_price = market.price(&position.symbol).await;
            let market_value = market_price.map(|px| position.quantity * px);
            let unrealized_pnl = market_price.map(|px| position.quantity * (px - position.avg_cost));

            if let Some(value) = market_value {
                total_value += value;
            }
            if let Some(pnl) = unrealized_pnl {
                total_unrealized += pnl;
            }

            valuations.push(PositionValuation {
                position,
                market_price,
                market_value,
                unrealized_pnl,
            });
        }

        let total_realized = realized.iter().map(|r| r.pnl).sum();

        PortfolioSummary {
            account_id,
            positions: valuations,
            realized,
            totals: PortfolioTotals {
                realized_pnl: total_realized,
                unrealized_pnl: total_unrealized,
                market_value: total_value,
            },
        }
    }

    async fn check_account_active(&self, account_id: AccountId) -> EngineResult<()> {
        let account = self.ledger.account(account_id).await?;
        if account.disabled {
            return Err(LedgerError::AccountDisabled(account_id).into());
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::stub::StaticPrices;
    use rust_decimal_macros::dec;

    async fn setup(balance: Decimal) -> (Arc<LedgerStore>, PositionBook, AccountId) {
        let ledger = Arc::new(LedgerStore::new());
        let account = ledger.open_account().await;
        if balance > Decimal::ZERO {
            ledger
                .credit(account.id, balance, EntryKind::Deposit, Uuid::now_v7())
                .await
                .unwrap();
        }
        let book = PositionBook::new(ledger.clone());
        (ledger, book, account.id)
    }

    fn acme() -> Symbol {
        Symbol::new("ACME").unwrap()
    }

    #[tokio::test]
    async fn test_buy_debits_cash_and_opens_position() {
        let (ledger, book, account_id) = setup(dec!(5000)).await;

        let position = book
            .buy(account_id, acme(), dec!(10), dec!(100), Uuid::now_v7())
            .await
            .unwrap();

        assert_eq!(position.quantity, dec!(10));
        assert_eq!(position.avg_cost, dec!(100));
        assert_eq!(ledger.account(account_id).await.unwrap().balance, dec!(4000));
    }

    #[tokio::test]
    async fn test_buy_insufficient_funds_leaves_position_untouched() {
        let (ledger, book, account_id) = setup(dec!(500)).await;

        let err = book
            .buy(account_id, acme(), dec!(10), dec!(100), Uuid::now_v7())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Ledger(LedgerError::InsufficientFunds { .. })
        ));

        assert!(book.position(account_id, &acme()).is_none());
        assert_eq!(ledger.account(account_id).await.unwrap().balance, dec!(500));
    }

    #[tokio::test]
    async fn test_average_cost_and_realized_pnl() {
        // Buy 10 @ 100, buy 10 @ 200 → avg 150; sell 5 @ 180 → pnl 150
        let (ledger, book, account_id) = setup(dec!(10000)).await;

        book.buy(account_id, acme(), dec!(10), dec!(100), Uuid::now_v7()).await.unwrap();
        let position = book
            .buy(account_id, acme(), dec!(10), dec!(200), Uuid::now_v7())
            .await
            .unwrap();
        assert_eq!(position.quantity, dec!(20));
        assert_eq!(position.avg_cost, dec!(150));

        let (position, record) = book
            .sell(account_id, acme(), dec!(5), dec!(180), Uuid::now_v7())
            .await
            .unwrap();

        assert_eq!(record.pnl, dec!(150)); // 5 × (180 − 150)
        assert_eq!(position.quantity, dec!(15));
        assert_eq!(position.avg_cost, dec!(150)); // selling never moves avg cost

        // Cash: 10000 − 1000 − 2000 + 900
        assert_eq!(ledger.account(account_id).await.unwrap().balance, dec!(7900));
    }

    #[tokio::test]
    async fn test_sell_records_losses_too() {
        let (_ledger, book, account_id) = setup(dec!(1000)).await;

        book.buy(account_id, acme(), dec!(5), dec!(100), Uuid::now_v7()).await.unwrap();
        let (_, record) = book
            .sell(account_id, acme(), dec!(5), dec!(80), Uuid::now_v7())
            .await
            .unwrap();

        assert_eq!(record.pnl, dec!(-100)); // 5 × (80 − 100)
        assert_eq!(book.realized_for(account_id).len(), 1);
    }

    #[tokio::test]
    async fn test_sell_beyond_position_changes_nothing() {
        let (ledger, book, account_id) = setup(dec!(1000)).await;

        book.buy(account_id, acme(), dec!(5), dec!(100), Uuid::now_v7()).await.unwrap();
        let balance_before = ledger.account(account_id).await.unwrap().balance;

        let err = book
            .sell(account_id, acme(), dec!(6), dec!(100), Uuid::now_v7())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Domain(DomainError::InsufficientPosition(_))
        ));

        let position = book.position(account_id, &acme()).unwrap();
        assert_eq!(position.quantity, dec!(5));
        assert_eq!(ledger.account(account_id).await.unwrap().balance, balance_before);
        assert!(book.realized_for(account_id).is_empty());
    }

    #[tokio::test]
    async fn test_sell_unknown_symbol_is_insufficient_position() {
        let (_ledger, book, account_id) = setup(dec!(1000)).await;

        let err = book
            .sell(account_id, acme(), dec!(1), dec!(100), Uuid::now_v7())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Domain(DomainError::InsufficientPosition(_))
        ));
    }

    #[tokio::test]
    async fn test_portfolio_summary_marks_at_injected_price() {
        let (_ledger, book, account_id) = setup(dec!(10000)).await;
        let prices = StaticPrices::new();

        book.buy(account_id, acme(), dec!(10), dec!(100), Uuid::now_v7()).await.unwrap();
        let other = Symbol::new("OTHR").unwrap();
        book.buy(account_id, other.clone(), dec!(4), dec!(50), Uuid::now_v7()).await.unwrap();
        book.sell(account_id, acme(), dec!(2), dec!(120), Uuid::now_v7()).await.unwrap();

        prices.set_price(&acme(), dec!(130));
        // No quote for OTHR

        let summary = book.portfolio_summary(account_id, &prices).await;

        assert_eq!(summary.positions.len(), 2);
        let acme_view = summary
            .positions
            .iter()
            .find(|v| v.position.symbol == acme())
            .unwrap();
        assert_eq!(acme_view.market_price, Some(dec!(130)));
        assert_eq!(acme_view.market_value, Some(dec!(1040))); // 8 × 130
        assert_eq!(acme_view.unrealized_pnl, Some(dec!(240))); // 8 × (130 − 100)

        let other_view = summary
            .positions
            .iter()
            .find(|v| v.position.symbol == other)
            .unwrap();
        assert_eq!(other_view.market_price, None);
        assert_eq!(other_view.unrealized_pnl, None);

        assert_eq!(summary.totals.realized_pnl, dec!(40)); // 2 × (120 − 100)
        assert_eq!(summary.totals.unrealized_pnl, dec!(240));
        assert_eq!(summary.totals.market_value, dec!(1040));
    }

    #[tokio::test]
    async fn test_fully_sold_position_drops_out_of_summary() {
        let (_ledger, book, account_id) = setup(dec!(1000)).await;

        book.buy(account_id, acme(), dec!(5), dec!(100), Uuid::now_v7()).await.unwrap();
        book.sell(account_id, acme(), dec!(5), dec!(110), Uuid::now_v7()).await.unwrap();

        assert!(book.positions_for(account_id).is_empty());
        assert_eq!(book.realized_for(account_id).len(), 1);
    }

    #[tokio::test]
    async fn test_allotment_adds_shares_without_cash_leg() {
        let (ledger, book, account_id) = setup(dec!(1000)).await;

        book.record_allotment(
            account_id,
            acme(),
            Amount::new(dec!(100)).unwrap(),
            Amount::new(dec!(90)).unwrap(),
        );

        let position = book.position(account_id, &acme()).unwrap();
        assert_eq!(position.quantity, dec!(100));
        assert_eq!(position.avg_cost, dec!(90));
        // Cash untouched here; the IPO debit is the cash leg
        assert_eq!(ledger.account(account_id).await.unwrap().balance, dec!(1000));
    }
}
