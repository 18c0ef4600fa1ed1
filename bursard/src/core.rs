//! Brokerage core: composes the ledger and the engines behind the
//! admin/user command surface.
//!
//! Every mutating call runs the engine operation first; only after the
//! transition commits is a core event handed to the notifier and the
//! matching counter incremented. Notification delivery is best-effort
//! and never rolls anything back.
//!
//! # Architecture
//!
//! ```text
//! HTTP API → Brokerage → Workflows / PositionBook / TimedTrades / IpoDesk
//!                              ↓
//!                         LedgerStore (sole writer of balances)
//!                              ↓
//!                    EventBus → notification consumers
//! ```

use std::sync::Arc;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use bursar_domain::{
    Account, AccountId, ApplicationId, CoreEvent, IpoApplication, IpoId, IpoOffering, LedgerEntry,
    Position, RealizedPnl, RequestId, Side, Symbol, TimedTrade, TradeId, TradeOutcome,
    WorkflowRequest,
};
use bursar_engine::{
    IpoDesk, MarketPricePort, NotificationPort, PortfolioSummary, PositionBook, TimedTrades,
    WorkflowConfig, Workflows,
};
use bursar_ledger::LedgerStore;

use crate::error::DaemonResult;
use crate::metrics::Metrics;

/// Result of a buy or sell execution.
#[derive(Debug, Clone, Serialize)]
pub struct OrderExecution {
    pub position: Position,
    /// Present for sells only
    pub realized: Option<RealizedPnl>,
}

/// The brokerage core behind the command surface.
pub struct Brokerage {
    ledger: Arc<LedgerStore>,
    workflows: Arc<Workflows>,
    positions: Arc<PositionBook>,
    trades: Arc<TimedTrades>,
    ipo: Arc<IpoDesk>,
    market: Arc<dyn MarketPricePort>,
    notifier: Arc<dyn NotificationPort>,
    metrics: Arc<Metrics>,
}

impl Brokerage {
    /// Wire a new core over a fresh ledger.
    pub fn new(
        config: WorkflowConfig,
        market: Arc<dyn MarketPricePort>,
        notifier: Arc<dyn NotificationPort>,
        metrics: Arc<Metrics>,
    ) -> Self {
        let ledger = Arc::new(LedgerStore::new());
        let workflows = Arc::new(Workflows::new(ledger.clone(), config));
        let positions = Arc::new(PositionBook::new(ledger.clone()));
        let trades = Arc::new(TimedTrades::new(ledger.clone()));
        let ipo = Arc::new(IpoDesk::new(ledger.clone(), positions.clone()));

        Self {
            ledger,
            workflows,
            positions,
            trades,
            ipo,
            market,
            notifier,
            metrics,
        }
    }

    // -------------------------------------------------------------------------
    // Accounts
    // -------------------------------------------------------------------------

    /// Open a new account (registration).
    pub async fn open_account(&self) -> Account {
        let account = self.ledger.open_account().await;
        info!(account_id = %account.id, "account opened");

        self.notifier.notify(CoreEvent::AccountOpened {
            account_id: account.id,
            timestamp: Utc::now(),
        });
        account
    }

    /// Current account snapshot.
    pub async fn account(&self, account_id: AccountId) -> DaemonResult<Account> {
        Ok(self.ledger.account(account_id).await?)
    }

    /// Full audit trail of an account.
    pub async fn ledger_entries(&self, account_id: AccountId) -> DaemonResult<Vec<LedgerEntry>> {
        Ok(self.ledger.entries(account_id).await?)
    }

    /// Portfolio projection marked at the injected market price.
    pub async fn portfolio(&self, account_id: AccountId) -> DaemonResult<PortfolioSummary> {
        // Surface NotFound for unknown accounts before projecting
        self.ledger.account(account_id).await?;
        Ok(self.positions.portfolio_summary(account_id, self.market.as_ref()).await)
    }

    // -------------------------------------------------------------------------
    // Workflow requests
    // -------------------------------------------------------------------------

    /// Submit a deposit request.
    pub async fn submit_deposit(
        &self,
        account_id: AccountId,
        amount: Decimal,
    ) -> DaemonResult<WorkflowRequest> {
        let request = self.workflows.submit_deposit(account_id, amount).await?;
        self.after_submission(&request);
        Ok(request)
    }

    /// Submit a withdrawal request (blocks the amount).
    pub async fn submit_withdrawal(
        &self,
        account_id: AccountId,
        amount: Decimal,
    ) -> DaemonResult<WorkflowRequest> {
        let request = self.workflows.submit_withdrawal(account_id, amount).await?;
        self.after_submission(&request);
        Ok(request)
    }

    /// Submit a KYC verification request.
    pub async fn submit_kyc(&self, account_id: AccountId) -> DaemonResult<WorkflowRequest> {
        let request = self.workflows.submit_kyc(account_id).await?;
        self.after_submission(&request);
        Ok(request)
    }

    /// Approve a pending request (admin).
    pub async fn approve_request(&self, request_id: RequestId) -> DaemonResult<WorkflowRequest> {
        let request = self.workflows.approve(request_id).await?;

        self.metrics
            .requests_decided
            .with_label_values(&[request.kind.name(), "approved"])
            .inc();
        self.notifier.notify(CoreEvent::RequestApproved {
            request_id: request.id,
            account_id: request.account_id,
            kind: request.kind.name().to_string(),
            timestamp: Utc::now(),
        });
        Ok(request)
    }

    /// Reject a pending request (admin); reason mandatory for
    /// withdrawals.
    pub async fn reject_request(
        &self,
        request_id: RequestId,
        reason: Option<String>,
    ) -> DaemonResult<WorkflowRequest> {
        let request = self.workflows.reject(request_id, reason).await?;

        self.metrics
            .requests_decided
            .with_label_values(&[request.kind.name(), "rejected"])
            .inc();
        self.notifier.notify(CoreEvent::RequestRejected {
            request_id: request.id,
            account_id: request.account_id,
            kind: request.kind.name().to_string(),
            reason: request.rejection_reason.clone(),
            timestamp: Utc::now(),
        });
        Ok(request)
    }

    /// All requests awaiting a decision (admin view).
    pub fn pending_requests(&self) -> Vec<WorkflowRequest> {
        self.workflows.pending()
    }

    /// Request history of an account.
    pub fn requests_for(&self, account_id: AccountId) -> Vec<WorkflowRequest> {
        self.workflows.find_by_account(account_id)
    }

    fn after_submission(&self, request: &WorkflowRequest) {
        let amount = match request.kind {
            bursar_domain::RequestKind::Deposit { amount } => Some(amount),
            bursar_domain::RequestKind::Withdrawal { amount, .. } => Some(amount),
            bursar_domain::RequestKind::Kyc => None,
        };

        self.metrics
            .requests_submitted
            .with_label_values(&[request.kind.name()])
            .inc();
        self.notifier.notify(CoreEvent::RequestSubmitted {
            request_id: request.id,
            account_id: request.account_id,
            kind: request.kind.name().to_string(),
            amount,
            timestamp: Utc::now(),
        });
    }

    // -------------------------------------------------------------------------
    // Trade execution
    // -------------------------------------------------------------------------

    /// Execute a buy or sell against the position book.
    pub async fn execute_order(
        &self,
        account_id: AccountId,
        symbol: Symbol,
        side: Side,
        quantity: Decimal,
        price: Decimal,
    ) -> DaemonResult<OrderExecution> {
        let correlation_id = Uuid::now_v7();

        let execution = match side {
            Side::Buy => {
                let position = self
                    .positions
                    .buy(account_id, symbol.clone(), quantity, price, correlation_id)
                    .await?;
                OrderExecution { position, realized: None }
            }
            Side::Sell => {
                let (position, realized) = self
                    .positions
                    .sell(account_id, symbol.clone(), quantity, price, correlation_id)
                    .await?;
                OrderExecution { position, realized: Some(realized) }
            }
        };

        self.metrics.orders_executed.with_label_values(&[side.as_str()]).inc();
        self.notifier.notify(CoreEvent::OrderExecuted {
            account_id,
            symbol,
            side,
            quantity,
            price,
            realized_pnl: execution.realized.as_ref().map(|r| r.pnl),
            timestamp: Utc::now(),
        });
        Ok(execution)
    }

    // -------------------------------------------------------------------------
    // Timed trades
    // -------------------------------------------------------------------------

    /// Open a timed trade, blocking the stake.
    pub async fn open_timed_trade(
        &self,
        account_id: AccountId,
        stake: Decimal,
        duration: Duration,
        profit_rate: Decimal,
    ) -> DaemonResult<TimedTrade> {
        let trade = self.trades.open(account_id, stake, duration, profit_rate).await?;

        self.notifier.notify(CoreEvent::TimedTradeOpened {
            trade_id: trade.id,
            account_id,
            stake: trade.stake,
            expires_at: trade.expires_at,
            timestamp: Utc::now(),
        });
        Ok(trade)
    }

    /// Set the result of a timed trade (admin).
    pub async fn set_trade_result(
        &self,
        trade_id: TradeId,
        outcome: TradeOutcome,
    ) -> DaemonResult<TimedTrade> {
        let trade = self.trades.set_result(trade_id, outcome).await?;

        self.metrics.trades_settled.with_label_values(&[outcome.as_str()]).inc();
        self.notifier.notify(CoreEvent::TimedTradeSettled {
            trade_id: trade.id,
            account_id: trade.account_id,
            outcome: outcome.as_str().to_string(),
            timestamp: Utc::now(),
        });
        Ok(trade)
    }

    /// All trades awaiting a result (admin view; expired ones included).
    pub fn pending_trades(&self) -> Vec<TimedTrade> {
        self.trades.pending()
    }

    /// Trade history of an account.
    pub fn trades_for(&self, account_id: AccountId) -> Vec<TimedTrade> {
        self.trades.find_by_account(account_id)
    }

    // -------------------------------------------------------------------------
    // IPOs
    // -------------------------------------------------------------------------

    /// Register an IPO offering (admin).
    pub fn create_offering(
        &self,
        symbol: Symbol,
        price_per_share: Decimal,
        discount_price: Option<Decimal>,
        lot_size: u32,
        min_investment: Decimal,
    ) -> DaemonResult<IpoOffering> {
        Ok(self.ipo.create_offering(
            symbol,
            price_per_share,
            discount_price,
            lot_size,
            min_investment,
        )?)
    }

    /// All registered offerings.
    pub fn offerings(&self) -> Vec<IpoOffering> {
        self.ipo.offerings()
    }

    /// Apply for IPO lots, blocking the cost.
    pub async fn apply_ipo(
        &self,
        account_id: AccountId,
        ipo_id: IpoId,
        lots: u32,
    ) -> DaemonResult<IpoApplication> {
        let application = self.ipo.apply(account_id, ipo_id, lots).await?;

        self.notifier.notify(CoreEvent::IpoApplicationSubmitted {
            application_id: application.id,
            account_id,
            ipo_id,
            blocked_amount: application.blocked_amount,
            timestamp: Utc::now(),
        });
        Ok(application)
    }

    /// Allot an application (admin): consume the hold, credit shares.
    pub async fn allot_ipo(&self, application_id: ApplicationId) -> DaemonResult<IpoApplication> {
        let application = self.ipo.allot(application_id).await?;
        self.after_ipo_decision(&application, true);
        Ok(application)
    }

    /// Reject an application (admin): release the hold in full.
    pub async fn reject_ipo(&self, application_id: ApplicationId) -> DaemonResult<IpoApplication> {
        let application = self.ipo.reject(application_id).await?;
        self.after_ipo_decision(&application, false);
        Ok(application)
    }

    /// All applications awaiting allotment (admin view).
    pub fn pending_applications(&self) -> Vec<IpoApplication> {
        self.ipo.pending()
    }

    /// Application history of an account.
    pub fn applications_for(&self, account_id: AccountId) -> Vec<IpoApplication> {
        self.ipo.find_by_account(account_id)
    }

    fn after_ipo_decision(&self, application: &IpoApplication, allotted: bool) {
        let status = if allotted { "allotted" } else { "not_allotted" };
        self.metrics.ipo_applications_decided.with_label_values(&[status]).inc();
        self.notifier.notify(CoreEvent::IpoApplicationDecided {
            application_id: application.id,
            account_id: application.account_id,
            allotted,
            timestamp: Utc::now(),
        });
    }
}

// =============================================================================
// Tests
// =============================================================================
