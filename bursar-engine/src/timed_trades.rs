//! Timed-trade settlement engine.
//!
//! A timed trade blocks its stake at open and sits Pending until an
//! administrator sets the result: reaching expiry changes nothing by
//! itself. Settlement applies the ledger effect exactly once per trade:
//!
//! - Win:  release the stake, credit stake × profit_rate as profit
//! - Lose: release the stake, then debit it (the stake is consumed)
//! - Draw: release only, no net change

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::Duration;
use rust_decimal::Decimal;
use tracing::info;

use bursar_domain::{
    AccountId, Amount, DomainError, EntryKind, TimedTrade, TradeId, TradeOutcome,
};
use bursar_ledger::{LedgerError, LedgerOp, LedgerStore};

use crate::error::{EngineError, EngineResult};

/// Timed-trade lifecycle service.
pub struct TimedTrades {
    ledger: Arc<LedgerStore>,
    trades: RwLock<HashMap<TradeId, TimedTrade>>,
}

impl TimedTrades {
    /// Create a new service over the given ledger.
    pub fn new(ledger: Arc<LedgerStore>) -> Self {
        Self {
            ledger,
            trades: RwLock::new(HashMap::new()),
        }
    }

    /// Open a trade, blocking the stake.
    ///
    /// The stake stays in the balance (only spendable drops) until the
    /// result consumes or releases it.
    ///
    /// # Errors
    /// - `InvalidAmount` if stake, duration, or profit rate is not
    ///   positive
    /// - `InsufficientFunds` if the spendable balance cannot cover the
    ///   stake
    pub async fn open(
        &self,
        account_id: AccountId,
        stake: Decimal,
        duration: Duration,
        profit_rate: Decimal,
    ) -> EngineResult<TimedTrade> {
        self.check_account_active(account_id).await?;
        let stake = Amount::new(stake)?;
        if profit_rate <= Decimal::ZERO {
            return Err(DomainError::InvalidAmount(format!(
                "profit rate must be positive, got {}",
                profit_rate
            ))
            .into());
        }
        if duration <= Duration::zero() {
            return Err(
                DomainError::InvalidAmount("trade duration must be positive".to_string()).into()
            );
        }

        let trade = TimedTrade::open(account_id, stake, duration, profit_rate);
        self.ledger
            .block(account_id, stake.as_decimal(), EntryKind::TradeBlock, trade.id)
            .await?;

        info!(trade_id = %trade.id, %account_id, %stake, %profit_rate,
            expires_at = %trade.expires_at, "timed trade opened");

        let mut trades = self.trades.write().unwrap();
        trades.insert(trade.id, trade.clone());
        Ok(trade)
    }

    /// Record the administrator's result and settle into the ledger.
    ///
    /// Legal at any time while the trade is Pending, including past
    /// expiry: settlement is an explicit decision, never a timer.
    ///
    /// # Errors
    /// Returns `AlreadyDecided` (via `DomainError`) if the trade was
    /// already settled; the replay causes no state change.
    pub async fn set_result(
        &self,
        trade_id: TradeId,
        outcome: TradeOutcome,
    ) -> EngineResult<TimedTrade> {
        // Reserve the transition first; the terminal status is the
        // exactly-once guard
        let trade = {
            let mut trades = self.trades.write().unwrap();
            let trade = trades
                .get_mut(&trade_id)
                .ok_or(EngineError::not_found("trade", trade_id))?;
            trade.settle(outcome)?;
            trade.clone()
        };

        let release = LedgerOp::Release { amount: trade.stake, kind: EntryKind::TradeRelease };
        let ops = match outcome {
            TradeOutcome::Win => vec![
                release,
                LedgerOp::Credit {
                    amount: trade.stake * trade.profit_rate,
                    kind: EntryKind::TradeCredit,
                },
            ],
            TradeOutcome::Lose => vec![
                release,
                LedgerOp::Debit { amount: trade.stake, kind: EntryKind::TradeDebit },
            ],
            TradeOutcome::Draw => vec![release],
        };

        // The stake was blocked at open, so settlement cannot fail
        if let Err(error) = self.ledger.apply(trade.account_id, &ops, trade.id).await {
            tracing::error!(trade_id = %trade.id, %error,
                "settlement effect failed after transition");
            return Err(error.into());
        }

        info!(trade_id = %trade.id, account_id = %trade.account_id,
            outcome = outcome.as_str(), stake = %trade.stake, "timed trade settled");
        Ok(trade)
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    /// Look up a trade by id.
    pub fn trade(&self, trade_id: TradeId) -> EngineResult<TimedTrade> {
        let trades = self.trades.read().unwrap();
        trades
            .get(&trade_id)
            .cloned()
            .ok_or(EngineError::not_found("trade", trade_id))
    }

    /// All trades of an account, newest first.
    pub fn find_by_account(&self, account_id: AccountId) -> Vec<TimedTrade> {
        let trades = self.trades.read().unwrap();
        let mut found: Vec<TimedTrade> = trades
            .values()
            .filter(|t| t.account_id == account_id)
            .cloned()
            .collect();
        found.sort_by_key(|t| std::cmp::Reverse(t.opened_at));
        found
    }

    /// All trades still awaiting a result (expired ones included).
    pub fn pending(&self) -> Vec<TimedTrade> {
        let trades = self.trades.read().unwrap();
        trades.values().filter(|t| t.is_pending()).cloned().collect()
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
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    async fn setup(balance: Decimal) -> (Arc<LedgerStore>, TimedTrades, AccountId) {
        let ledger = Arc::new(LedgerStore::new());
        let account = ledger.open_account().await;
        if balance > Decimal::ZERO {
            ledger
                .credit(account.id, balance, EntryKind::Deposit, Uuid::now_v7())
                .await
                .unwrap();
        }
        let trades = TimedTrades::new(ledger.clone());
        (ledger, trades, account.id)
    }

    #[tokio::test]
    async fn test_open_blocks_stake() {
        let (ledger, trades, account_id) = setup(dec!(1000)).await;

        let trade = trades
            .open(account_id, dec!(100), Duration::seconds(60), dec!(0.85))
            .await
            .unwrap();
        assert!(trade.is_pending());

        let account = ledger.account(account_id).await.unwrap();
        assert_eq!(account.balance, dec!(1000)); // stake not debited yet
        assert_eq!(account.blocked, dec!(100));
        assert_eq!(account.spendable(), dec!(900));
    }

    #[tokio::test]
    async fn test_open_insufficient_spendable_fails() {
        let (ledger, trades, account_id) = setup(dec!(50)).await;

        let err = trades
            .open(account_id, dec!(100), Duration::seconds(60), dec!(0.85))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Ledger(LedgerError::InsufficientFunds { .. })
        ));
        assert!(trades.pending().is_empty());
        assert_eq!(ledger.account(account_id).await.unwrap().blocked, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_open_rejects_bad_parameters() {
        let (_ledger, trades, account_id) = setup(dec!(1000)).await;

        for result in [
            trades.open(account_id, dec!(0), Duration::seconds(60), dec!(0.85)).await,
            trades.open(account_id, dec!(100), Duration::seconds(60), dec!(0)).await,
            trades.open(account_id, dec!(100), Duration::zero(), dec!(0.85)).await,
        ] {
            assert!(matches!(
                result.unwrap_err(),
                EngineError::Domain(DomainError::InvalidAmount(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_win_pays_profit_on_top_of_stake() {
        let (ledger, trades, account_id) = setup(dec!(1000)).await;

        let trade = trades
            .open(account_id, dec!(100), Duration::seconds(60), dec!(0.85))
            .await
            .unwrap();
        trades.set_result(trade.id, TradeOutcome::Win).await.unwrap();

        let account = ledger.account(account_id).await.unwrap();
        assert_eq!(account.balance, dec!(1085.00)); // stake back + 85 profit
        assert_eq!(account.blocked, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_lose_consumes_stake() {
        let (ledger, trades, account_id) = setup(dec!(1000)).await;

        let trade = trades
            .open(account_id, dec!(100), Duration::seconds(60), dec!(0.85))
            .await
            .unwrap();
        trades.set_result(trade.id, TradeOutcome::Lose).await.unwrap();

        let account = ledger.account(account_id).await.unwrap();
        assert_eq!(account.balance, dec!(900));
        assert_eq!(account.blocked, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_draw_returns_stake_unchanged() {
        let (ledger, trades, account_id) = setup(dec!(1000)).await;

        let trade = trades
            .open(account_id, dec!(100), Duration::seconds(60), dec!(0.85))
            .await
            .unwrap();
        trades.set_result(trade.id, TradeOutcome::Draw).await.unwrap();

        let account = ledger.account(account_id).await.unwrap();
        assert_eq!(account.balance, dec!(1000));
        assert_eq!(account.blocked, Decimal::ZERO);
        assert_eq!(account.spendable(), dec!(1000));
    }

    #[tokio::test]
    async fn test_settlement_is_exactly_once() {
        let (ledger, trades, account_id) = setup(dec!(1000)).await;

        let trade = trades
            .open(account_id, dec!(100), Duration::seconds(60), dec!(0.85))
            .await
            .unwrap();
        trades.set_result(trade.id, TradeOutcome::Win).await.unwrap();

        let err = trades.set_result(trade.id, TradeOutcome::Win).await.unwrap_err();
        assert!(err.is_already_decided());
        let err = trades.set_result(trade.id, TradeOutcome::Lose).await.unwrap_err();
        assert!(err.is_already_decided());

        // Settled once: open block + release + profit credit
        let account = ledger.account(account_id).await.unwrap();
        assert_eq!(account.balance, dec!(1085.00));
        assert_eq!(ledger.entries(account_id).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_expired_trade_still_requires_explicit_result() {
        let (ledger, trades, account_id) = setup(dec!(1000)).await;

        // Opens with a 1ms lifetime; expiry passes immediately
        let trade = trades
            .open(account_id, dec!(100), Duration::milliseconds(1), dec!(0.85))
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;

        // Still pending, stake still blocked
        let pending = trades.trade(trade.id).unwrap();
        assert!(pending.is_pending());
        assert!(pending.is_expired(chrono::Utc::now()));
        assert_eq!(ledger.account(account_id).await.unwrap().blocked, dec!(100));

        // Settlement after expiry works normally
        trades.set_result(trade.id, TradeOutcome::Draw).await.unwrap();
        assert_eq!(ledger.account(account_id).await.unwrap().blocked, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_unknown_trade_is_not_found() {
        let (_ledger, trades, _account_id) = setup(dec!(0)).await;
        let err = trades.set_result(Uuid::now_v7(), TradeOutcome::Win).await.unwrap_err();
        assert!(matches!(err, EngineError::NotFound { entity: "trade", .. }));
    }
}
