//! Helper functions for seeding in-memory test fixtures.

use std::sync::Arc;

use rust_decimal::Decimal;
use uuid::Uuid;

use bursar_domain::{Account, AccountId, EntryKind};
use bursar_engine::{
    IpoDesk, PositionBook, RecordingNotifier, StaticPrices, TimedTrades, WorkflowConfig, Workflows,
};
use bursar_ledger::LedgerStore;

/// Fully wired in-memory core for tests.
///
/// Every service shares one ledger; the notifier records instead of
/// delivering and the price feed serves manually injected quotes.
pub struct Harness {
    pub ledger: Arc<LedgerStore>,
    pub workflows: Arc<Workflows>,
    pub positions: Arc<PositionBook>,
    pub trades: Arc<TimedTrades>,
    pub ipo: Arc<IpoDesk>,
    pub prices: Arc<StaticPrices>,
    pub notifier: Arc<RecordingNotifier>,
}

impl Harness {
    /// Wire a fresh core with default workflow limits.
    pub fn new() -> Self {
        Self::with_config(WorkflowConfig::default())
    }

    /// Wire a fresh core with custom workflow limits.
    pub fn with_config(config: WorkflowConfig) -> Self {
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
            prices: Arc::new(StaticPrices::new()),
            notifier: Arc::new(RecordingNotifier::new()),
        }
    }

    /// Open an account and credit it with an opening balance.
    pub async fn funded_account(&self, balance: Decimal) -> Account {
        funded_account(&self.ledger, balance).await
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

/// Open an account and credit it with an opening balance.
pub async fn funded_account(ledger: &LedgerStore, balance: Decimal) -> Account {
    let account = ledger.open_account().await;
    if balance > Decimal::ZERO {
        ledger
            .credit(account.id, balance, EntryKind::Deposit, Uuid::now_v7())
            .await
            .expect("seeding credit cannot fail");
    }
    ledger.account(account.id).await.expect("freshly opened account exists")
}

/// Assert the conservation invariant: the sum of entry amounts must
/// reproduce the cached balance exactly.
pub async fn assert_conservation(ledger: &LedgerStore, account_id: AccountId) {
    let account = ledger.account(account_id).await.expect("account exists");
    let entries = ledger.entries(account_id).await.expect("account exists");
    let sum: Decimal = entries.iter().map(|e| e.amount).sum();
    assert_eq!(
        sum, account.balance,
        "conservation violated for account {}: entries sum to {}, balance is {}",
        account_id, sum, account.balance
    );
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_funded_account_seeds_balance() {
        let harness = Harness::new();
        let account = harness.funded_account(dec!(1000)).await;

        assert_eq!(account.balance, dec!(1000));
        assert_conservation(&harness.ledger, account.id).await;
    }

    #[tokio::test]
    async fn test_harness_services_share_one_ledger() {
        let harness = Harness::new();
        let account = harness.funded_account(dec!(1000)).await;

        harness
            .workflows
            .submit_withdrawal(account.id, dec!(400))
            .await
            .unwrap();

        // The hold placed through the workflow service is visible to the
        // shared ledger
        let account = harness.ledger.account(account.id).await.unwrap();
        assert_eq!(account.blocked, dec!(400));
    }
}
