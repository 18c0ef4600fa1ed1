//! Transaction workflow engine.
//!
//! One state machine serves deposits, withdrawals, and KYC submissions:
//! the shape (Pending → Approved | Rejected, terminal both ways) is
//! identical, only the ledger effect of the decision differs per kind.
//! `decide` reserves the transition first (that is the idempotency
//! gate) and then applies the per-kind effect, whose funds were
//! already reserved at submission.
//!
//! The key correctness property separating withdrawal from deposit:
//! a withdrawal blocks its amount at submission, so funds earmarked for
//! payout cannot be spent while the request is pending.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{info, warn};

use bursar_domain::{
    AccountId, Amount, DomainError, EntryKind, RequestId, RequestKind, RequestStatus,
    WorkflowRequest,
};
use bursar_ledger::{LedgerError, LedgerOp, LedgerStore};

use crate::error::{EngineError, EngineResult};

// =============================================================================
// Configuration
// =============================================================================

/// Method-specific minimums and fees applied at submission.
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    /// Smallest accepted deposit
    pub min_deposit: Decimal,
    /// Smallest accepted withdrawal
    pub min_withdrawal: Decimal,
    /// Flat fee charged on withdrawal approval
    pub withdrawal_fee: Decimal,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            min_deposit: dec!(10),
            min_withdrawal: dec!(50),
            withdrawal_fee: dec!(20),
        }
    }
}

// =============================================================================
// Workflows
// =============================================================================

/// Approval workflow service for deposits, withdrawals, and KYC.
pub struct Workflows {
    ledger: Arc<LedgerStore>,
    config: WorkflowConfig,
    requests: RwLock<HashMap<RequestId, WorkflowRequest>>,
}

impl Workflows {
    /// Create a new workflow service over the given ledger.
    pub fn new(ledger: Arc<LedgerStore>, config: WorkflowConfig) -> Self {
        Self {
            ledger,
            config,
            requests: RwLock::new(HashMap::new()),
        }
    }

    // -------------------------------------------------------------------------
    // Submission (user-initiated)
    // -------------------------------------------------------------------------

    /// Submit a deposit request.
    ///
    /// No ledger effect until approval; the money does not exist in the
    /// ledger before an administrator confirms receipt.
    pub async fn submit_deposit(
        &self,
        account_id: AccountId,
        amount: Decimal,
    ) -> EngineResult<WorkflowRequest> {
        self.check_account_active(account_id).await?;
        let amount = Amount::new(amount)?;
        if amount.as_decimal() < self.config.min_deposit {
            return Err(DomainError::InvalidAmount(format!(
                "deposit {} below minimum {}",
                amount, self.config.min_deposit
            ))
            .into());
        }

        let request = WorkflowRequest::deposit(account_id, amount);
        info!(request_id = %request.id, %account_id, %amount, "deposit submitted");

        self.insert(request.clone());
        Ok(request)
    }

    /// Submit a withdrawal request, immediately blocking the amount.
    ///
    /// The block is the double-spend defense: spendable balance drops by
    /// the full amount while the balance itself is untouched until the
    /// decision.
    pub async fn submit_withdrawal(
        &self,
        account_id: AccountId,
        amount: Decimal,
    ) -> EngineResult<WorkflowRequest> {
        self.check_account_active(account_id).await?;
        let amount = Amount::new(amount)?;
        if amount.as_decimal() < self.config.min_withdrawal {
            return Err(DomainError::InvalidAmount(format!(
                "withdrawal {} below minimum {}",
                amount, self.config.min_withdrawal
            ))
            .into());
        }
        let fee = self.config.withdrawal_fee;
        if amount.as_decimal() <= fee {
            return Err(DomainError::InvalidAmount(format!(
                "withdrawal {} does not cover the {} fee",
                amount, fee
            ))
            .into());
        }

        let request = WorkflowRequest::withdrawal(account_id, amount, fee);

        // Block before the request becomes visible; if the hold fails
        // the request never existed
        self.ledger
            .block(
                account_id,
                amount.as_decimal(),
                EntryKind::WithdrawalBlock,
                request.id,
            )
            .await?;

        info!(request_id = %request.id, %account_id, %amount, %fee, "withdrawal submitted");

        self.insert(request.clone());
        Ok(request)
    }

    /// Submit a KYC verification request. No ledger effect.
    pub async fn submit_kyc(&self, account_id: AccountId) -> EngineResult<WorkflowRequest> {
        self.check_account_active(account_id).await?;

        let request = WorkflowRequest::kyc(account_id);
        info!(request_id = %request.id, %account_id, "kyc submitted");

        self.insert(request.clone());
        Ok(request)
    }

    // -------------------------------------------------------------------------
    // Decision (admin-initiated)
    // -------------------------------------------------------------------------

    /// Approve a pending request and apply its ledger effect.
    ///
    /// # Errors
    /// Returns `AlreadyDecided` (via `DomainError`) if the request is in
    /// a terminal state; the replay causes no state change.
    pub async fn approve(&self, request_id: RequestId) -> EngineResult<WorkflowRequest> {
        self.decide(request_id, RequestStatus::Approved, None).await
    }

    /// Reject a pending request, unwinding any hold it placed.
    ///
    /// The reason is mandatory for withdrawals and optional otherwise.
    pub async fn reject(
        &self,
        request_id: RequestId,
        reason: Option<String>,
    ) -> EngineResult<WorkflowRequest> {
        self.decide(request_id, RequestStatus::Rejected, reason).await
    }

    /// The single decision path shared by every request kind.
    async fn decide(
        &self,
        request_id: RequestId,
        status: RequestStatus,
        reason: Option<String>,
    ) -> EngineResult<WorkflowRequest> {
        // Reserve the transition under the registry lock. A concurrent
        // second decision sees the terminal status and gets
        // AlreadyDecided before any effect runs.
        let request = {
            let mut requests = self.requests.write().unwrap();
            let request = requests
                .get_mut(&request_id)
                .ok_or(EngineError::not_found("request", request_id))?;

            if request.is_pending()
                && status == RequestStatus::Rejected
                && matches!(request.kind, RequestKind::Withdrawal { .. })
                && reason.is_none()
            {
                return Err(EngineError::RejectionReasonRequired);
            }

            request.decide(status, reason)?;
            request.clone()
        };

        // Funds for every approved effect were reserved at submission,
        // so a failure here is a defect, not a user error.
        if let Err(error) = self.apply_effect(&request).await {
            tracing::error!(request_id = %request.id, %error,
                "decision effect failed after transition");
            return Err(error);
        }

        info!(request_id = %request.id, account_id = %request.account_id,
            kind = request.kind.name(), status = ?request.status, "request decided");
        Ok(request)
    }

    /// Per-kind ledger effect of a terminal decision.
    async fn apply_effect(&self, request: &WorkflowRequest) -> EngineResult<()> {
        match (&request.kind, request.status) {
            // Deposit: money enters the ledger only on approval
            (RequestKind::Deposit { amount }, RequestStatus::Approved) => {
                self.ledger
                    .credit(request.account_id, *amount, EntryKind::Deposit, request.id)
                    .await?;
            }
            (RequestKind::Deposit { .. }, RequestStatus::Rejected) => {}

            // Withdrawal approval: unwind the hold, pay out net of fee,
            // charge the fee as its own audit entry
            (RequestKind::Withdrawal { amount, fee }, RequestStatus::Approved) => {
                let mut ops = vec![
                    LedgerOp::Release { amount: *amount, kind: EntryKind::WithdrawalRelease },
                    LedgerOp::Debit { amount: *amount - *fee, kind: EntryKind::Withdrawal },
                ];
                if *fee > Decimal::ZERO {
                    ops.push(LedgerOp::Debit { amount: *fee, kind: EntryKind::Fee });
                }
                self.ledger.apply(request.account_id, &ops, request.id).await?;
            }

            // Withdrawal rejection: full refund of the hold
            (RequestKind::Withdrawal { amount, .. }, RequestStatus::Rejected) => {
                self.ledger
                    .release(
                        request.account_id,
                        *amount,
                        EntryKind::WithdrawalRelease,
                        request.id,
                    )
                    .await?;
            }

            // KYC: flag flips only, no ledger effect
            (RequestKind::Kyc, RequestStatus::Approved) => {
                self.ledger.set_verified(request.account_id, true).await?;
            }
            (RequestKind::Kyc, RequestStatus::Rejected) => {
                // Registration rejection soft-disables the account
                warn!(account_id = %request.account_id, "kyc rejected, disabling account");
                self.ledger.set_disabled(request.account_id, true).await?;
            }

            (_, RequestStatus::Pending) => {
                // decide() never leaves a request Pending
            }
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    /// Look up a request by id.
    pub fn request(&self, request_id: RequestId) -> EngineResult<WorkflowRequest> {
        let requests = self.requests.read().unwrap();
        requests
            .get(&request_id)
            .cloned()
            .ok_or(EngineError::not_found("request", request_id))
    }

    /// All requests for an account, newest first.
    pub fn find_by_account(&self, account_id: AccountId) -> Vec<WorkflowRequest> {
        let requests = self.requests.read().unwrap();
        let mut found: Vec<WorkflowRequest> = requests
            .values()
            .filter(|r| r.account_id == account_id)
            .cloned()
            .collect();
        found.sort_by_key(|r| std::cmp::Reverse(r.created_at));
        found
    }

    /// All requests still awaiting a decision.
    pub fn pending(&self) -> Vec<WorkflowRequest> {
        let requests = self.requests.read().unwrap();
        requests.values().filter(|r| r.is_pending()).cloned().collect()
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    async fn check_account_active(&self, account_id: AccountId) -> EngineResult<()> {
        let account = self.ledger.account(account_id).await?;
        if account.disabled {
            return Err(LedgerError::AccountDisabled(account_id).into());
        }
        Ok(())
    }

    fn insert(&self, request: WorkflowRequest) {
        let mut requests = self.requests.write().unwrap();
        requests.insert(request.id, request);
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    async fn setup(balance: Decimal) -> (Arc<LedgerStore>, Workflows, AccountId) {
        let ledger = Arc::new(LedgerStore::new());
        let account = ledger.open_account().await;
        if balance > Decimal::ZERO {
            ledger
                .credit(account.id, balance, EntryKind::Deposit, Uuid::now_v7())
                .await
                .unwrap();
        }
        let workflows = Workflows::new(ledger.clone(), WorkflowConfig::default());
        (ledger, workflows, account.id)
    }

    #[tokio::test]
    async fn test_deposit_approve_credits_balance() {
        let (ledger, workflows, account_id) = setup(dec!(0)).await;

        let request = workflows.submit_deposit(account_id, dec!(500)).await.unwrap();
        assert!(request.is_pending());

        // Nothing credited while pending
        assert_eq!(ledger.account(account_id).await.unwrap().balance, dec!(0));

        let decided = workflows.approve(request.id).await.unwrap();
        assert_eq!(decided.status, RequestStatus::Approved);
        assert_eq!(ledger.account(account_id).await.unwrap().balance, dec!(500));
    }

    #[tokio::test]
    async fn test_deposit_below_minimum_is_rejected_at_submit() {
        let (ledger, workflows, account_id) = setup(dec!(0)).await;

        let err = workflows.submit_deposit(account_id, dec!(5)).await.unwrap_err();
        assert!(matches!(err, EngineError::Domain(DomainError::InvalidAmount(_))));

        // Zero side effects
        assert!(ledger.entries(account_id).await.unwrap().is_empty());
        assert!(workflows.pending().is_empty());
    }

    #[tokio::test]
    async fn test_withdrawal_submit_blocks_amount() {
        let (ledger, workflows, account_id) = setup(dec!(1500)).await;

        workflows.submit_withdrawal(account_id, dec!(1000)).await.unwrap();

        let account = ledger.account(account_id).await.unwrap();
        assert_eq!(account.balance, dec!(1500)); // balance unchanged
        assert_eq!(account.blocked, dec!(1000));
        assert_eq!(account.spendable(), dec!(500));
    }

    #[tokio::test]
    async fn test_withdrawal_round_trip_with_fee() {
        let (ledger, workflows, account_id) = setup(dec!(1500)).await;

        let request = workflows.submit_withdrawal(account_id, dec!(1000)).await.unwrap();
        workflows.approve(request.id).await.unwrap();

        let account = ledger.account(account_id).await.unwrap();
        // Final balance = original − amount; payout was amount − fee,
        // fee recorded separately
        assert_eq!(account.balance, dec!(500));
        assert_eq!(account.blocked, Decimal::ZERO);

        let entries = ledger.entries(account_id).await.unwrap();
        let fee_entry = entries.iter().find(|e| e.kind == EntryKind::Fee).unwrap();
        assert_eq!(fee_entry.amount, dec!(-20));
        let payout = entries.iter().find(|e| e.kind == EntryKind::Withdrawal).unwrap();
        assert_eq!(payout.amount, dec!(-980));
    }

    #[tokio::test]
    async fn test_withdrawal_reject_restores_spendable() {
        let (ledger, workflows, account_id) = setup(dec!(1000)).await;

        let request = workflows.submit_withdrawal(account_id, dec!(1000)).await.unwrap();
        assert_eq!(ledger.account(account_id).await.unwrap().spendable(), Decimal::ZERO);

        let decided = workflows
            .reject(request.id, Some("bank details mismatch".to_string()))
            .await
            .unwrap();
        assert_eq!(decided.status, RequestStatus::Rejected);

        let account = ledger.account(account_id).await.unwrap();
        assert_eq!(account.balance, dec!(1000));
        assert_eq!(account.spendable(), dec!(1000));
    }

    #[tokio::test]
    async fn test_withdrawal_reject_requires_reason() {
        let (ledger, workflows, account_id) = setup(dec!(1000)).await;

        let request = workflows.submit_withdrawal(account_id, dec!(500)).await.unwrap();
        let err = workflows.reject(request.id, None).await.unwrap_err();
        assert!(matches!(err, EngineError::RejectionReasonRequired));

        // Still pending, hold still in place
        assert!(workflows.request(request.id).unwrap().is_pending());
        assert_eq!(ledger.account(account_id).await.unwrap().blocked, dec!(500));
    }

    #[tokio::test]
    async fn test_withdrawal_insufficient_spendable_leaves_no_request() {
        let (ledger, workflows, account_id) = setup(dec!(100)).await;

        let err = workflows.submit_withdrawal(account_id, dec!(200)).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Ledger(LedgerError::InsufficientFunds { .. })
        ));

        assert!(workflows.pending().is_empty());
        assert_eq!(ledger.account(account_id).await.unwrap().blocked, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_kyc_approve_sets_verified_flag() {
        let (ledger, workflows, account_id) = setup(dec!(0)).await;

        let request = workflows.submit_kyc(account_id).await.unwrap();
        workflows.approve(request.id).await.unwrap();

        let account = ledger.account(account_id).await.unwrap();
        assert!(account.verified);
        assert!(ledger.entries(account_id).await.unwrap().is_empty()); // no ledger effect
    }

    #[tokio::test]
    async fn test_kyc_reject_soft_disables_account() {
        let (ledger, workflows, account_id) = setup(dec!(0)).await;

        let request = workflows.submit_kyc(account_id).await.unwrap();
        workflows.reject(request.id, None).await.unwrap();

        let account = ledger.account(account_id).await.unwrap();
        assert!(account.disabled);

        // Disabled accounts cannot submit anything new
        let err = workflows.submit_deposit(account_id, dec!(100)).await.unwrap_err();
        assert!(matches!(err, EngineError::Ledger(LedgerError::AccountDisabled(_))));
    }

    #[tokio::test]
    async fn test_terminal_requests_are_immutable() {
        let (ledger, workflows, account_id) = setup(dec!(0)).await;

        let request = workflows.submit_deposit(account_id, dec!(100)).await.unwrap();
        workflows.approve(request.id).await.unwrap();

        let err = workflows.approve(request.id).await.unwrap_err();
        assert!(err.is_already_decided());
        let err = workflows.reject(request.id, Some("late".to_string())).await.unwrap_err();
        assert!(err.is_already_decided());

        // Applied exactly once
        assert_eq!(ledger.account(account_id).await.unwrap().balance, dec!(100));
        assert_eq!(ledger.entries(account_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_decide_unknown_request_is_not_found() {
        let (_ledger, workflows, _account_id) = setup(dec!(0)).await;

        let err = workflows.approve(Uuid::now_v7()).await.unwrap_err();
        assert!(matches!(err, EngineError::NotFound { entity: "request", .. }));
    }

    #[tokio::test]
    async fn test_multiple_pending_requests_coexist() {
        // A user may have several pending requests as long as each only
        // touches the balance it explicitly reserved
        let (ledger, workflows, account_id) = setup(dec!(1000)).await;

        let w1 = workflows.submit_withdrawal(account_id, dec!(400)).await.unwrap();
        let w2 = workflows.submit_withdrawal(account_id, dec!(400)).await.unwrap();
        let d = workflows.submit_deposit(account_id, dec!(100)).await.unwrap();

        // Third withdrawal would over-reserve
        let err = workflows.submit_withdrawal(account_id, dec!(400)).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Ledger(LedgerError::InsufficientFunds { .. })
        ));

        workflows.approve(w1.id).await.unwrap();
        workflows.reject(w2.id, Some("second payout denied".to_string())).await.unwrap();
        workflows.approve(d.id).await.unwrap();

        let account = ledger.account(account_id).await.unwrap();
        // 1000 − 400 (w1) + 100 (d); w2 fully refunded
        assert_eq!(account.balance, dec!(700));
        assert_eq!(account.blocked, Decimal::ZERO);
    }
}
