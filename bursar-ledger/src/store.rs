//! In-memory ledger store
//!
//! Accounts are kept in a registry guarded by a plain RwLock; each
//! account's state sits behind its own async mutex. The registry lock is
//! held only long enough to clone the account's Arc, so contention on one
//! account never blocks another.
//!
//! A workflow decision may move balance and blocked funds in several
//! steps (e.g. withdrawal approval: release the hold, debit the payout,
//! debit the fee). [`LedgerStore::apply`] runs such a batch under a
//! single acquisition of the account lock: every step is validated
//! against the simulated post-state before anything is written, so the
//! batch either fully applies or fully fails.

use crate::error::LedgerError;
use bursar_domain::{Account, AccountId, EntryKind, LedgerEntry};
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;
use uuid::Uuid;

// =============================================================================
// Operations
// =============================================================================

/// One step of a ledger mutation batch
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LedgerOp {
    /// Increase the balance
    Credit { amount: Decimal, kind: EntryKind },
    /// Decrease the balance, checked against the spendable balance
    Debit { amount: Decimal, kind: EntryKind },
    /// Reserve part of the balance (balance unchanged, blocked grows)
    Block { amount: Decimal, kind: EntryKind },
    /// Return a previously blocked amount to the spendable balance
    Release { amount: Decimal, kind: EntryKind },
}

impl LedgerOp {
    fn kind(&self) -> EntryKind {
        match self {
            LedgerOp::Credit { kind, .. }
            | LedgerOp::Debit { kind, .. }
            | LedgerOp::Block { kind, .. }
            | LedgerOp::Release { kind, .. } => *kind,
        }
    }
}

// =============================================================================
// Per-account state
// =============================================================================

/// Per-account state: the cached balance projection, the append-only
/// entry log it is derived from, and the set of applied correlation ids.
struct AccountState {
    account: Account,
    entries: Vec<LedgerEntry>,
    /// (correlation_id, kind) → index into `entries`; one decision may
    /// produce several entries sharing a correlation id, so the kind is
    /// part of the key
    applied: HashMap<(Uuid, EntryKind), usize>,
}

impl AccountState {
    /// Replayed operation? Return the original entry without re-applying.
    fn replay(&self, correlation_id: Uuid, kind: EntryKind) -> Option<LedgerEntry> {
        self.applied
            .get(&(correlation_id, kind))
            .map(|ix| self.entries[*ix].clone())
    }

    /// Validate every op of a batch against the simulated post-state,
    /// then apply. Returns the entries in op order; ops whose
    /// (correlation_id, kind) was already applied contribute their
    /// original entry and are not re-applied.
    fn apply_batch(
        &mut self,
        ops: &[LedgerOp],
        correlation_id: Uuid,
    ) -> Result<Vec<LedgerEntry>, LedgerError> {
        // Validation pass: nothing is written until every op checks out
        let mut balance = self.account.balance;
        let mut blocked = self.account.blocked;
        let mut fresh = Vec::with_capacity(ops.len());

        for op in ops {
            if self.replay(correlation_id, op.kind()).is_some() {
                continue;
            }

            match *op {
                LedgerOp::Credit { amount, .. } => {
                    validate_amount(amount)?;
                    balance += amount;
                }
                LedgerOp::Debit { amount, .. } => {
                    validate_amount(amount)?;
                    let spendable = balance - blocked;
                    if spendable < amount {
                        return Err(LedgerError::insufficient(self.account.id, amount, spendable));
                    }
                    balance -= amount;
                }
                LedgerOp::Block { amount, .. } => {
                    validate_amount(amount)?;
                    let spendable = balance - blocked;
                    if spendable < amount {
                        return Err(LedgerError::insufficient(self.account.id, amount, spendable));
                    }
                    blocked += amount;
                }
                LedgerOp::Release { amount, .. } => {
                    validate_amount(amount)?;
                    if blocked < amount {
                        let message = format!(
                            "release {} exceeds blocked {} on account {}",
                            amount, blocked, self.account.id
                        );
                        tracing::error!(account_id = %self.account.id, %amount, %blocked,
                            "release would drive blocked negative");
                        return Err(LedgerError::InvariantViolation(message));
                    }
                    blocked -= amount;
                }
            }
            fresh.push(*op);
        }

        if balance < Decimal::ZERO || blocked < Decimal::ZERO || blocked > balance {
            // Unreachable given the per-op checks above
            let message = format!(
                "batch on account {} would leave balance={} blocked={}",
                self.account.id, balance, blocked
            );
            tracing::error!(account_id = %self.account.id, %balance, %blocked,
                "ledger invariant violation");
            return Err(LedgerError::InvariantViolation(message));
        }

        // Apply pass: infallible now
        for op in &fresh {
            let (amount, blocked_delta) = match *op {
                LedgerOp::Credit { amount, .. } => (amount, Decimal::ZERO),
                LedgerOp::Debit { amount, .. } => (-amount, Decimal::ZERO),
                LedgerOp::Block { amount, .. } => (Decimal::ZERO, amount),
                LedgerOp::Release { amount, .. } => (Decimal::ZERO, -amount),
            };

            let now = Utc::now();
            self.account.balance += amount;
            self.account.blocked += blocked_delta;
            self.account.updated_at = now;

            let entry = LedgerEntry {
                id: Uuid::now_v7(),
                account_id: self.account.id,
                kind: op.kind(),
                amount,
                balance_after: self.account.balance,
                blocked_after: self.account.blocked,
                occurred_at: now,
                correlation_id,
            };

            self.applied.insert((correlation_id, op.kind()), self.entries.len());
            self.entries.push(entry);
        }

        // Collect results in op order, replays included
        let results = ops
            .iter()
            .filter_map(|op| self.replay(correlation_id, op.kind()))
            .collect();
        Ok(results)
    }
}

// =============================================================================
// Ledger Store
// =============================================================================

/// Durable, keyed storage of per-account balances and the append-only
/// transaction log. The sole writer of balance values.
pub struct LedgerStore {
    accounts: RwLock<HashMap<AccountId, Arc<Mutex<AccountState>>>>,
}

impl LedgerStore {
    /// Create a new empty ledger
    pub fn new() -> Self {
        Self { accounts: RwLock::new(HashMap::new()) }
    }

    /// Open a new account with zero balances
    pub async fn open_account(&self) -> Account {
        let account = Account::new();
        let state = AccountState {
            account: account.clone(),
            entries: Vec::new(),
            applied: HashMap::new(),
        };

        let mut accounts = self.accounts.write().unwrap();
        accounts.insert(account.id, Arc::new(Mutex::new(state)));
        account
    }

    /// Number of open accounts
    pub fn account_count(&self) -> usize {
        self.accounts.read().unwrap().len()
    }

    fn slot(&self, account_id: AccountId) -> Result<Arc<Mutex<AccountState>>, LedgerError> {
        let accounts = self.accounts.read().unwrap();
        accounts
            .get(&account_id)
            .cloned()
            .ok_or(LedgerError::NotFound(account_id))
    }

    /// Read the current account snapshot
    pub async fn account(&self, account_id: AccountId) -> Result<Account, LedgerError> {
        let slot = self.slot(account_id)?;
        let state = slot.lock().await;
        Ok(state.account.clone())
    }

    /// Read the full audit trail for an account, in append order
    pub async fn entries(&self, account_id: AccountId) -> Result<Vec<LedgerEntry>, LedgerError> {
        let slot = self.slot(account_id)?;
        let state = slot.lock().await;
        Ok(state.entries.clone())
    }

    /// Apply a batch of operations atomically under the account lock
    ///
    /// Every op is validated against the simulated post-state of the ops
    /// before it; if any check fails, nothing is written. Ops whose
    /// (correlation_id, kind) was applied before are skipped and their
    /// original entry returned, so a crash-and-retry of a whole decision
    /// cannot double-apply.
    pub async fn apply(
        &self,
        account_id: AccountId,
        ops: &[LedgerOp],
        correlation_id: Uuid,
    ) -> Result<Vec<LedgerEntry>, LedgerError> {
        let slot = self.slot(account_id)?;
        let mut state = slot.lock().await;
        state.apply_batch(ops, correlation_id)
    }

    /// Increase the balance
    ///
    /// # Errors
    /// - `InvalidAmount` if `amount <= 0`
    /// - `NotFound` if the account does not exist
    pub async fn credit(
        &self,
        account_id: AccountId,
        amount: Decimal,
        kind: EntryKind,
        correlation_id: Uuid,
    ) -> Result<LedgerEntry, LedgerError> {
        self.apply_one(account_id, LedgerOp::Credit { amount, kind }, correlation_id)
            .await
    }

    /// Decrease the balance, checked against the spendable balance
    ///
    /// # Errors
    /// - `InvalidAmount` if `amount <= 0`
    /// - `InsufficientFunds` if `balance - blocked < amount`
    pub async fn debit(
        &self,
        account_id: AccountId,
        amount: Decimal,
        kind: EntryKind,
        correlation_id: Uuid,
    ) -> Result<LedgerEntry, LedgerError> {
        self.apply_one(account_id, LedgerOp::Debit { amount, kind }, correlation_id)
            .await
    }

    /// Reserve part of the balance against a pending payout
    ///
    /// The balance is unchanged; only the blocked counter moves. The
    /// audit entry carries a zero amount.
    ///
    /// # Errors
    /// Same as [`debit`](Self::debit): the spendable balance must cover
    /// the hold.
    pub async fn block(
        &self,
        account_id: AccountId,
        amount: Decimal,
        kind: EntryKind,
        correlation_id: Uuid,
    ) -> Result<LedgerEntry, LedgerError> {
        self.apply_one(account_id, LedgerOp::Block { amount, kind }, correlation_id)
            .await
    }

    /// Return a previously blocked amount to the spendable balance
    ///
    /// # Errors
    /// - `InvalidAmount` if `amount <= 0`
    /// - `InvariantViolation` if the release would drive blocked negative
    pub async fn release(
        &self,
        account_id: AccountId,
        amount: Decimal,
        kind: EntryKind,
        correlation_id: Uuid,
    ) -> Result<LedgerEntry, LedgerError> {
        self.apply_one(account_id, LedgerOp::Release { amount, kind }, correlation_id)
            .await
    }

    async fn apply_one(
        &self,
        account_id: AccountId,
        op: LedgerOp,
        correlation_id: Uuid,
    ) -> Result<LedgerEntry, LedgerError> {
        let mut entries = self.apply(account_id, &[op], correlation_id).await?;
        entries.pop().ok_or_else(|| {
            LedgerError::InvariantViolation("batch of one op returned no entry".to_string())
        })
    }

    /// Flip the KYC verification flag
    pub async fn set_verified(
        &self,
        account_id: AccountId,
        verified: bool,
    ) -> Result<Account, LedgerError> {
        let slot = self.slot(account_id)?;
        let mut state = slot.lock().await;
        state.account.verified = verified;
        state.account.updated_at = Utc::now();
        Ok(state.account.clone())
    }

    /// Soft-disable (or re-enable) an account
    ///
    /// The flag gates new user-initiated spends at the engine boundary;
    /// the ledger itself keeps accepting operations so pending refunds
    /// and settlements can still complete.
    pub async fn set_disabled(
        &self,
        account_id: AccountId,
        disabled: bool,
    ) -> Result<Account, LedgerError> {
        let slot = self.slot(account_id)?;
        let mut state = slot.lock().await;
        state.account.disabled = disabled;
        state.account.updated_at = Utc::now();
        Ok(state.account.clone())
    }
}

impl Default for LedgerStore {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_amount(amount: Decimal) -> Result<(), LedgerError> {
    if amount <= Decimal::ZERO {
        return Err(LedgerError::InvalidAmount(format!("Amount must be positive, got {}", amount)));
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
