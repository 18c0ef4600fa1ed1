//! Domain Entities for Bursar
//!
//! Core business entities with lifecycle management.
//! All entities have identity and monotonic state transitions:
//! a request, trade, or application that reached a terminal state
//! never changes again.

use crate::value_objects::{Amount, DomainError, Symbol};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// Identifiers
// =============================================================================

/// Unique identifier for an Account
pub type AccountId = Uuid;

/// Unique identifier for a LedgerEntry
pub type EntryId = Uuid;

/// Unique identifier for a WorkflowRequest
pub type RequestId = Uuid;

/// Unique identifier for a TimedTrade
pub type TradeId = Uuid;

/// Unique identifier for an IpoOffering
pub type IpoId = Uuid;

/// Unique identifier for an IpoApplication
pub type ApplicationId = Uuid;

// =============================================================================
// Account
// =============================================================================

/// Account holds a user's cash balance and the portion of it reserved
/// against pending payouts.
///
/// Key concepts:
/// - `balance` is the total cash the account owns (never negative)
/// - `blocked` is reserved against pending withdrawals, IPO applications,
///   and timed trades; still counted in `balance`
/// - Spendable balance = `balance - blocked`
/// - Accounts are never deleted; registration rejection soft-disables them
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub balance: Decimal,
    pub blocked: Decimal,

    /// Identity verification flag, flipped by KYC approval
    pub verified: bool,
    /// Soft-disable flag, set when registration is rejected
    pub disabled: bool,

    // Audit
    pub opened_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Create a new empty account
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            balance: Decimal::ZERO,
            blocked: Decimal::ZERO,
            verified: false,
            disabled: false,
            opened_at: now,
            updated_at: now,
        }
    }

    /// Amount the account may actually debit against
    ///
    /// `spendable = balance - blocked`
    pub fn spendable(&self) -> Decimal {
        self.balance - self.blocked
    }
}

impl Default for Account {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Ledger Entries
// =============================================================================

/// Kind of a ledger entry
///
/// Balance-moving kinds carry a non-zero signed amount; hold-adjustment
/// kinds (`*Block` / `*Release`) carry a zero amount and only move the
/// blocked counter, so conservation sums are unaffected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Deposit,
    Withdrawal,
    WithdrawalBlock,
    WithdrawalRelease,
    IpoBlock,
    IpoRelease,
    IpoDebit,
    TradeBlock,
    TradeRelease,
    TradeDebit,
    TradeCredit,
    Fee,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Deposit => "deposit",
            EntryKind::Withdrawal => "withdrawal",
            EntryKind::WithdrawalBlock => "withdrawal_block",
            EntryKind::WithdrawalRelease => "withdrawal_release",
            EntryKind::IpoBlock => "ipo_block",
            EntryKind::IpoRelease => "ipo_release",
            EntryKind::IpoDebit => "ipo_debit",
            EntryKind::TradeBlock => "trade_block",
            EntryKind::TradeRelease => "trade_release",
            EntryKind::TradeDebit => "trade_debit",
            EntryKind::TradeCredit => "trade_credit",
            EntryKind::Fee => "fee",
        }
    }
}

/// Immutable record of one ledger mutation
///
/// The entry log is append-only. Summing `amount` over all entries of an
/// account reproduces its current balance exactly; the balance field on
/// `Account` is a cached projection of this log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: EntryId,
    pub account_id: AccountId,
    pub kind: EntryKind,

    /// Signed balance delta (zero for hold adjustments)
    pub amount: Decimal,

    // Snapshots after this entry was applied
    pub balance_after: Decimal,
    pub blocked_after: Decimal,

    pub occurred_at: DateTime<Utc>,

    /// Idempotency key linking the mutation to the workflow request,
    /// trade, or application that caused it
    pub correlation_id: Uuid,
}

// =============================================================================
// Workflow Requests
// =============================================================================

/// Status of an approval workflow request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

/// Per-kind payload of a workflow request
///
/// Each kind has a fixed schema validated at the boundary; there is no
/// untyped bag of fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RequestKind {
    Deposit {
        amount: Decimal,
    },
    Withdrawal {
        amount: Decimal,
        /// Fee quoted at submission time; frozen so a later config change
        /// cannot alter an in-flight payout
        fee: Decimal,
    },
    Kyc,
}

impl RequestKind {
    pub fn name(&self) -> &'static str {
        match self {
            RequestKind::Deposit { .. } => "deposit",
            RequestKind::Withdrawal { .. } => "withdrawal",
            RequestKind::Kyc => "kyc",
        }
    }
}

/// A user-initiated request awaiting an administrator decision
///
/// # Invariants
/// - Status transitions are monotonic: Pending → {Approved, Rejected} only
/// - Terminal states are final; `decide` on a decided request fails
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowRequest {
    pub id: RequestId,
    pub account_id: AccountId,
    pub kind: RequestKind,
    pub status: RequestStatus,

    pub created_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
}

impl WorkflowRequest {
    fn new(account_id: AccountId, kind: RequestKind) -> Self {
        Self {
            id: Uuid::now_v7(),
            account_id,
            kind,
            status: RequestStatus::Pending,
            created_at: Utc::now(),
            decided_at: None,
            rejection_reason: None,
        }
    }

    /// Create a pending deposit request
    pub fn deposit(account_id: AccountId, amount: Amount) -> Self {
        Self::new(account_id, RequestKind::Deposit { amount: amount.as_decimal() })
    }

    /// Create a pending withdrawal request with the fee quoted now
    pub fn withdrawal(account_id: AccountId, amount: Amount, fee: Decimal) -> Self {
        Self::new(
            account_id,
            RequestKind::Withdrawal { amount: amount.as_decimal(), fee },
        )
    }

    /// Create a pending KYC submission
    pub fn kyc(account_id: AccountId) -> Self {
        Self::new(account_id, RequestKind::Kyc)
    }

    /// Check if the request is still awaiting a decision
    pub fn is_pending(&self) -> bool {
        matches!(self.status, RequestStatus::Pending)
    }

    /// Transition to a terminal state
    ///
    /// # Errors
    /// Returns `DomainError::AlreadyDecided` if the request is not Pending.
    pub fn decide(
        &mut self,
        status: RequestStatus,
        reason: Option<String>,
    ) -> Result<(), DomainError> {
        if !self.is_pending() {
            return Err(DomainError::AlreadyDecided(format!(
                "request {} is {:?}",
                self.id, self.status
            )));
        }
        debug_assert!(matches!(status, RequestStatus::Approved | RequestStatus::Rejected));

        self.status = status;
        self.decided_at = Some(Utc::now());
        self.rejection_reason = reason;
        Ok(())
    }
}

// =============================================================================
// Positions
// =============================================================================

/// Direction of a trade execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }
}

/// Per-account, per-symbol holding with weighted-average cost
///
/// # Invariants
/// - `quantity >= 0`, `avg_cost >= 0`
/// - Quantity and average cost change only via the weighted-average rule
///   on buy; a sell decreases quantity and leaves average cost unchanged
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub account_id: AccountId,
    pub symbol: Symbol,
    pub quantity: Decimal,
    pub avg_cost: Decimal,

    /// Realized profit/loss accumulated over every reduction of this
    /// position
    pub realized_pnl: Decimal,

    pub opened_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Position {
    /// Create an empty position
    pub fn new(account_id: AccountId, symbol: Symbol) -> Self {
        let now = Utc::now();
        Self {
            account_id,
            symbol,
            quantity: Decimal::ZERO,
            avg_cost: Decimal::ZERO,
            realized_pnl: Decimal::ZERO,
            opened_at: now,
            updated_at: now,
        }
    }

    /// Apply a buy fill using the weighted-average cost rule
    ///
    /// ```text
    /// new_avg = (old_qty × old_avg + qty × price) / (old_qty + qty)
    /// ```
    ///
    /// The average cost is rounded to the precision of `price` after
    /// each buy so repeated partial fills cannot accumulate drift.
    pub fn apply_buy(&mut self, quantity: Amount, price: Amount) {
        let qty = quantity.as_decimal();
        let px = price.as_decimal();

        let old_notional = self.quantity * self.avg_cost;
        let new_qty = self.quantity + qty;
        let avg = (old_notional + qty * px) / new_qty;

        self.avg_cost = avg.round_dp(px.scale());
        self.quantity = new_qty;
        self.updated_at = Utc::now();
    }

    /// Apply a sell fill, returning the realized P&L of the reduction
    ///
    /// `realized = qty × (price − avg_cost)`. The remaining lot keeps its
    /// average cost; only the quantity shrinks.
    ///
    /// # Errors
    /// Returns `DomainError::InsufficientPosition` if `quantity` exceeds
    /// the held quantity. The position is unchanged on error.
    pub fn apply_sell(&mut self, quantity: Amount, price: Amount) -> Result<Decimal, DomainError> {
        let qty = quantity.as_decimal();
        if qty > self.quantity {
            return Err(DomainError::InsufficientPosition(format!(
                "sell {} exceeds held {} of {}",
                qty, self.quantity, self.symbol
            )));
        }

        let realized = qty * (price.as_decimal() - self.avg_cost);
        self.quantity -= qty;
        self.realized_pnl += realized;
        self.updated_at = Utc::now();
        Ok(realized)
    }
}

/// Record of profit/loss recognized at the moment a position was reduced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealizedPnl {
    pub id: Uuid,
    pub account_id: AccountId,
    pub symbol: Symbol,
    pub quantity: Decimal,
    pub price: Decimal,
    pub avg_cost: Decimal,
    pub pnl: Decimal,
    pub occurred_at: DateTime<Utc>,
}

// =============================================================================
// Timed Trades
// =============================================================================

/// Outcome an administrator assigns to a timed trade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeOutcome {
    Win,
    Lose,
    Draw,
}

impl TradeOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeOutcome::Win => "win",
            TradeOutcome::Lose => "lose",
            TradeOutcome::Draw => "draw",
        }
    }
}

/// Status of a timed trade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeStatus {
    Pending,
    Win,
    Lose,
    Draw,
}

/// Short-lived wager-style contract settled by an explicit admin decision
///
/// # Invariants
/// - The stake is blocked (not debited) while Pending
/// - The ledger effect of settlement is applied exactly once per trade
/// - Reaching `expires_at` does NOT auto-settle; an administrator must
///   set the result even after expiry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimedTrade {
    pub id: TradeId,
    pub account_id: AccountId,
    pub stake: Decimal,
    /// Profit paid on a win, as a fraction of the stake (0.85 = 85%)
    pub profit_rate: Decimal,
    pub status: TradeStatus,

    pub opened_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub settled_at: Option<DateTime<Utc>>,
}

impl TimedTrade {
    /// Open a new pending trade expiring `duration` from now
    pub fn open(account_id: AccountId, stake: Amount, duration: Duration, profit_rate: Decimal) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            account_id,
            stake: stake.as_decimal(),
            profit_rate,
            status: TradeStatus::Pending,
            opened_at: now,
            expires_at: now + duration,
            settled_at: None,
        }
    }

    /// Check if the trade is still awaiting a result
    pub fn is_pending(&self) -> bool {
        matches!(self.status, TradeStatus::Pending)
    }

    /// Check if the trade is past its expiry at `now`
    ///
    /// Informational only; expiry never settles a trade by itself.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Record the administrator's result
    ///
    /// # Errors
    /// Returns `DomainError::AlreadyDecided` if the trade is not Pending.
    pub fn settle(&mut self, outcome: TradeOutcome) -> Result<(), DomainError> {
        if !self.is_pending() {
            return Err(DomainError::AlreadyDecided(format!(
                "trade {} is {:?}",
                self.id, self.status
            )));
        }

        self.status = match outcome {
            TradeOutcome::Win => TradeStatus::Win,
            TradeOutcome::Lose => TradeStatus::Lose,
            TradeOutcome::Draw => TradeStatus::Draw,
        };
        self.settled_at = Some(Utc::now());
        Ok(())
    }
}

// =============================================================================
// IPO Offerings & Applications
// =============================================================================

/// An IPO open for applications
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpoOffering {
    pub id: IpoId,
    pub symbol: Symbol,
    pub price_per_share: Decimal,
    /// Discounted price applied instead of `price_per_share` when set
    pub discount_price: Option<Decimal>,
    /// Shares per lot
    pub lot_size: u32,
    pub min_investment: Decimal,

    pub created_at: DateTime<Utc>,
}

impl IpoOffering {
    /// Create a new offering
    ///
    /// # Errors
    /// Returns `DomainError::InvalidOffering` if prices or lot size are
    /// not positive, or the discount is not below the list price.
    pub fn new(
        symbol: Symbol,
        price_per_share: Decimal,
        discount_price: Option<Decimal>,
        lot_size: u32,
        min_investment: Decimal,
    ) -> Result<Self, DomainError> {
        if price_per_share <= Decimal::ZERO {
            return Err(DomainError::InvalidOffering("Price must be positive".to_string()));
        }
        if lot_size == 0 {
            return Err(DomainError::InvalidOffering("Lot size must be positive".to_string()));
        }
        if min_investment < Decimal::ZERO {
            return Err(DomainError::InvalidOffering(
                "Minimum investment cannot be negative".to_string(),
            ));
        }
        if let Some(discount) = discount_price {
            if discount <= Decimal::ZERO || discount >= price_per_share {
                return Err(DomainError::InvalidOffering(
                    "Discount price must be positive and below list price".to_string(),
                ));
            }
        }

        Ok(Self {
            id: Uuid::now_v7(),
            symbol,
            price_per_share,
            discount_price,
            lot_size,
            min_investment,
            created_at: Utc::now(),
        })
    }

    /// Price applications actually pay per share
    pub fn effective_price(&self) -> Decimal {
        self.discount_price.unwrap_or(self.price_per_share)
    }

    /// Cost of `lots` lots at the effective price
    pub fn cost_of(&self, lots: u32) -> Decimal {
        Decimal::from(lots) * self.effective_price() * Decimal::from(self.lot_size)
    }
}

/// Status of an IPO application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IpoStatus {
    PendingAllotment,
    Allotted,
    NotAllotted,
}

/// A user's application for lots in an IPO
///
/// # Invariants
/// - `blocked_amount` is held (reduces spendable, not balance) from
///   submission until the decision
/// - Exactly one of {debit on Allotted, release on NotAllotted} happens,
///   exactly once
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpoApplication {
    pub id: ApplicationId,
    pub account_id: AccountId,
    pub ipo_id: IpoId,
    pub lots: u32,
    pub blocked_amount: Decimal,
    pub status: IpoStatus,

    pub created_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
}

impl IpoApplication {
    /// Create a pending application holding `blocked_amount`
    pub fn new(account_id: AccountId, ipo_id: IpoId, lots: u32, blocked_amount: Decimal) -> Self {
        Self {
            id: Uuid::now_v7(),
            account_id,
            ipo_id,
            lots,
            blocked_amount,
            status: IpoStatus::PendingAllotment,
            created_at: Utc::now(),
            decided_at: None,
        }
    }

    /// Check if the application is still awaiting allotment
    pub fn is_pending(&self) -> bool {
        matches!(self.status, IpoStatus::PendingAllotment)
    }

    /// Transition to a terminal allotment state
    ///
    /// # Errors
    /// Returns `DomainError::AlreadyDecided` if not PendingAllotment.
    pub fn decide(&mut self, status: IpoStatus) -> Result<(), DomainError> {
        if !self.is_pending() {
            return Err(DomainError::AlreadyDecided(format!(
                "application {} is {:?}",
                self.id, self.status
            )));
        }
        debug_assert!(matches!(status, IpoStatus::Allotted | IpoStatus::NotAllotted));

        self.status = status;
        self.decided_at = Some(Utc::now());
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

    fn amount(v: Decimal) -> Amount {
        Amount::new(v).unwrap()
    }

    // Account tests
    #[test]
    fn test_account_new_is_empty_and_enabled() {
        let account = Account::new();
        assert_eq!(account.balance, Decimal::ZERO);
        assert_eq!(account.blocked, Decimal::ZERO);
        assert!(!account.verified);
        assert!(!account.disabled);
    }

    #[test]
    fn test_account_spendable() {
        let mut account = Account::new();
        account.balance = dec!(1000);
        account.blocked = dec!(300);
        assert_eq!(account.spendable(), dec!(700));
    }

    // WorkflowRequest tests
    #[test]
    fn test_request_decide_is_monotonic() {
        let mut request = WorkflowRequest::deposit(Uuid::now_v7(), amount(dec!(100)));
        assert!(request.is_pending());

        request.decide(RequestStatus::Approved, None).unwrap();
        assert_eq!(request.status, RequestStatus::Approved);
        assert!(request.decided_at.is_some());

        // Terminal states are final
        let err = request.decide(RequestStatus::Rejected, None).unwrap_err();
        assert!(matches!(err, DomainError::AlreadyDecided(_)));
        assert_eq!(request.status, RequestStatus::Approved);
    }

    #[test]
    fn test_request_reject_records_reason() {
        let mut request = WorkflowRequest::withdrawal(Uuid::now_v7(), amount(dec!(500)), dec!(20));
        request
            .decide(RequestStatus::Rejected, Some("bank details mismatch".to_string()))
            .unwrap();
        assert_eq!(request.status, RequestStatus::Rejected);
        assert_eq!(request.rejection_reason.as_deref(), Some("bank details mismatch"));
    }

    #[test]
    fn test_withdrawal_freezes_quoted_fee() {
        let request = WorkflowRequest::withdrawal(Uuid::now_v7(), amount(dec!(1000)), dec!(20));
        match request.kind {
            RequestKind::Withdrawal { amount, fee } => {
                assert_eq!(amount, dec!(1000));
                assert_eq!(fee, dec!(20));
            }
            _ => panic!("Expected withdrawal kind"),
        }
    }

    // Position tests
    #[test]
    fn test_position_weighted_average_buy() {
        let mut position = Position::new(Uuid::now_v7(), Symbol::new("ACME").unwrap());

        position.apply_buy(amount(dec!(10)), amount(dec!(100)));
        assert_eq!(position.quantity, dec!(10));
        assert_eq!(position.avg_cost, dec!(100));

        position.apply_buy(amount(dec!(10)), amount(dec!(200)));
        assert_eq!(position.quantity, dec!(20));
        assert_eq!(position.avg_cost, dec!(150));
    }

    #[test]
    fn test_position_sell_realizes_pnl_and_keeps_avg_cost() {
        let mut position = Position::new(Uuid::now_v7(), Symbol::new("ACME").unwrap());
        position.apply_buy(amount(dec!(10)), amount(dec!(100)));
        position.apply_buy(amount(dec!(10)), amount(dec!(200)));

        let realized = position.apply_sell(amount(dec!(5)), amount(dec!(180))).unwrap();
        assert_eq!(realized, dec!(150)); // 5 × (180 − 150)
        assert_eq!(position.quantity, dec!(15));
        assert_eq!(position.avg_cost, dec!(150));
        assert_eq!(position.realized_pnl, dec!(150));
    }

    #[test]
    fn test_position_sell_beyond_held_is_rejected() {
        let mut position = Position::new(Uuid::now_v7(), Symbol::new("ACME").unwrap());
        position.apply_buy(amount(dec!(5)), amount(dec!(50)));

        let err = position.apply_sell(amount(dec!(6)), amount(dec!(60))).unwrap_err();
        assert!(matches!(err, DomainError::InsufficientPosition(_)));

        // State unchanged on error
        assert_eq!(position.quantity, dec!(5));
        assert_eq!(position.avg_cost, dec!(50));
        assert_eq!(position.realized_pnl, Decimal::ZERO);
    }

    #[test]
    fn test_position_avg_cost_rounds_to_price_precision() {
        let mut position = Position::new(Uuid::now_v7(), Symbol::new("ACME").unwrap());
        position.apply_buy(amount(dec!(3)), amount(dec!(10.00)));
        position.apply_buy(amount(dec!(1)), amount(dec!(10.01)));

        // (3×10.00 + 1×10.01) / 4 = 10.0025 → rounded to 2 dp
        assert_eq!(position.avg_cost, dec!(10.00));
        assert_eq!(position.quantity, dec!(4));
    }

    // TimedTrade tests
    #[test]
    fn test_timed_trade_settle_once() {
        let mut trade =
            TimedTrade::open(Uuid::now_v7(), amount(dec!(100)), Duration::seconds(60), dec!(0.85));
        assert!(trade.is_pending());

        trade.settle(TradeOutcome::Win).unwrap();
        assert_eq!(trade.status, TradeStatus::Win);
        assert!(trade.settled_at.is_some());

        let err = trade.settle(TradeOutcome::Lose).unwrap_err();
        assert!(matches!(err, DomainError::AlreadyDecided(_)));
        assert_eq!(trade.status, TradeStatus::Win);
    }

    #[test]
    fn test_timed_trade_expiry_is_informational() {
        let trade =
            TimedTrade::open(Uuid::now_v7(), amount(dec!(100)), Duration::seconds(60), dec!(0.85));

        assert!(!trade.is_expired(trade.opened_at));
        assert!(trade.is_expired(trade.expires_at + Duration::seconds(1)));
        // Past expiry the trade is still Pending and still settleable
        assert!(trade.is_pending());
    }

    // IPO tests
    #[test]
    fn test_offering_validation() {
        let symbol = Symbol::new("NEWCO").unwrap();
        assert!(IpoOffering::new(symbol.clone(), dec!(100), None, 50, dec!(1000)).is_ok());
        assert!(IpoOffering::new(symbol.clone(), dec!(0), None, 50, dec!(1000)).is_err());
        assert!(IpoOffering::new(symbol.clone(), dec!(100), None, 0, dec!(1000)).is_err());
        assert!(IpoOffering::new(symbol.clone(), dec!(100), Some(dec!(100)), 50, dec!(0)).is_err());
        assert!(IpoOffering::new(symbol, dec!(100), Some(dec!(90)), 50, dec!(0)).is_ok());
    }

    #[test]
    fn test_offering_cost_uses_discount_when_configured() {
        let offering = IpoOffering::new(
            Symbol::new("NEWCO").unwrap(),
            dec!(100),
            Some(dec!(90)),
            50,
            dec!(1000),
        )
        .unwrap();

        assert_eq!(offering.effective_price(), dec!(90));
        assert_eq!(offering.cost_of(2), dec!(9000)); // 2 × 90 × 50
    }

    #[test]
    fn test_application_decide_is_monotonic() {
        let mut application = IpoApplication::new(Uuid::now_v7(), Uuid::now_v7(), 2, dec!(10000));
        assert!(application.is_pending());

        application.decide(IpoStatus::Allotted).unwrap();
        let err = application.decide(IpoStatus::NotAllotted).unwrap_err();
        assert!(matches!(err, DomainError::AlreadyDecided(_)));
        assert_eq!(application.status, IpoStatus::Allotted);
    }
}
