//! IPO application lifecycle.
//!
//! An application blocks its full cost at submission. Allotment
//! consumes the hold (release + debit, one atomic batch) and credits
//! the shares into the position book at the effective price; rejection
//! releases the hold in full. Exactly one of the two happens, exactly
//! once.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use rust_decimal::Decimal;
use tracing::info;

use bursar_domain::{
    AccountId, Amount, ApplicationId, DomainError, EntryKind, IpoApplication, IpoId, IpoOffering,
    IpoStatus, Symbol,
};
use bursar_ledger::{LedgerError, LedgerOp, LedgerStore};

use crate::error::{EngineError, EngineResult};
use crate::positions::PositionBook;

/// IPO offering registry and application lifecycle service.
pub struct IpoDesk {
    ledger: Arc<LedgerStore>,
    positions: Arc<PositionBook>,
    offerings: RwLock<HashMap<IpoId, IpoOffering>>,
    applications: RwLock<HashMap<ApplicationId, IpoApplication>>,
}

impl IpoDesk {
    /// Create a new desk over the given ledger and position book.
    pub fn new(ledger: Arc<LedgerStore>, positions: Arc<PositionBook>) -> Self {
        Self {
            ledger,
            positions,
            offerings: RwLock::new(HashMap::new()),
            applications: RwLock::new(HashMap::new()),
        }
    }

    /// Register a new offering (admin-initiated).
    pub fn create_offering(
        &self,
        symbol: Symbol,
        price_per_share: Decimal,
        discount_price: Option<Decimal>,
        lot_size: u32,
        min_investment: Decimal,
    ) -> EngineResult<IpoOffering> {
        let offering =
            IpoOffering::new(symbol, price_per_share, discount_price, lot_size, min_investment)?;

        info!(ipo_id = %offering.id, symbol = %offering.symbol,
            price = %offering.effective_price(), "ipo offering created");

        let mut offerings = self.offerings.write().unwrap();
        offerings.insert(offering.id, offering.clone());
        Ok(offering)
    }

    /// Apply for lots, blocking the full cost.
    ///
    /// Cost = lots × effective price × lot size, where the effective
    /// price is the discounted price when one is configured.
    ///
    /// # Errors
    /// - `InvalidAmount` if `lots` is zero
    /// - `BelowMinimumInvestment` if the cost is under the offering's
    ///   minimum
    /// - `InsufficientFunds` if the spendable balance cannot cover the
    ///   cost (no application is created)
    pub async fn apply(
        &self,
        account_id: AccountId,
        ipo_id: IpoId,
        lots: u32,
    ) -> EngineResult<IpoApplication> {
        self.check_account_active(account_id).await?;
        if lots == 0 {
            return Err(
                DomainError::InvalidAmount("lot count must be positive".to_string()).into()
            );
        }

        let offering = self.offering(ipo_id)?;
        let amount = offering.cost_of(lots);
        if amount < offering.min_investment {
            return Err(EngineError::BelowMinimumInvestment {
                requested: amount,
                minimum: offering.min_investment,
            });
        }

        let application = IpoApplication::new(account_id, ipo_id, lots, amount);
        self.ledger
            .block(account_id, amount, EntryKind::IpoBlock, application.id)
            .await?;

        info!(application_id = %application.id, %account_id, %ipo_id, lots, %amount,
            "ipo application submitted");

        let mut applications = self.applications.write().unwrap();
        applications.insert(application.id, application.clone());
        Ok(application)
    }

    /// Allot the application: consume the hold and credit the shares.
    ///
    /// # Errors
    /// Returns `AlreadyDecided` (via `DomainError`) if the application
    /// is already terminal; the replay causes no state change.
    pub async fn allot(&self, application_id: ApplicationId) -> EngineResult<IpoApplication> {
        let application = self.decide(application_id, IpoStatus::Allotted)?;
        let offering = self.offering(application.ipo_id)?;

        let ops = [
            LedgerOp::Release { amount: application.blocked_amount, kind: EntryKind::IpoRelease },
            LedgerOp::Debit { amount: application.blocked_amount, kind: EntryKind::IpoDebit },
        ];
        if let Err(error) = self.ledger.apply(application.account_id, &ops, application.id).await {
            tracing::error!(application_id = %application.id, %error,
                "allotment effect failed after transition");
            return Err(error.into());
        }

        // Shares enter the position book at the price actually paid
        let shares = Decimal::from(application.lots) * Decimal::from(offering.lot_size);
        self.positions.record_allotment(
            application.account_id,
            offering.symbol.clone(),
            Amount::new(shares)?,
            Amount::new(offering.effective_price())?,
        );

        info!(application_id = %application.id, account_id = %application.account_id,
            %shares, amount = %application.blocked_amount, "ipo application allotted");
        Ok(application)
    }

    /// Reject the application: release the hold in full.
    pub async fn reject(&self, application_id: ApplicationId) -> EngineResult<IpoApplication> {
        let application = self.decide(application_id, IpoStatus::NotAllotted)?;

        if let Err(error) = self
            .ledger
            .release(
                application.account_id,
                application.blocked_amount,
                EntryKind::IpoRelease,
                application.id,
            )
            .await
        {
            tracing::error!(application_id = %application.id, %error,
                "rejection release failed after transition");
            return Err(error.into());
        }

        info!(application_id = %application.id, account_id = %application.account_id,
            amount = %application.blocked_amount, "ipo application rejected");
        Ok(application)
    }

    /// Reserve the terminal transition; this is the exactly-once guard.
    fn decide(
        &self,
        application_id: ApplicationId,
        status: IpoStatus,
    ) -> EngineResult<IpoApplication> {
        let mut applications = self.applications.write().unwrap();
        let application = applications
            .get_mut(&application_id)
            .ok_or(EngineError::not_found("application", application_id))?;
        application.decide(status)?;
        Ok(application.clone())
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    /// Look up an offering by id.
    pub fn offering(&self, ipo_id: IpoId) -> EngineResult<IpoOffering> {
        let offerings = self.offerings.read().unwrap();
        offerings
            .get(&ipo_id)
            .cloned()
            .ok_or(EngineError::not_found("offering", ipo_id))
    }

    /// All registered offerings.
    pub fn offerings(&self) -> Vec<IpoOffering> {
        let offerings = self.offerings.read().unwrap();
        offerings.values().cloned().collect()
    }

    /// Look up an application by id.
    pub fn application(&self, application_id: ApplicationId) -> EngineResult<IpoApplication> {
        let applications = self.applications.read().unwrap();
        applications
            .get(&application_id)
            .cloned()
            .ok_or(EngineError::not_found("application", application_id))
    }

    /// All applications of an account, newest first.
    pub fn find_by_account(&self, account_id: AccountId) -> Vec<IpoApplication> {
        let applications = self.applications.read().unwrap();
        let mut found: Vec<IpoApplication> = applications
            .values()
            .filter(|a| a.account_id == account_id)
            .cloned()
            .collect();
        found.sort_by_key(|a| std::cmp::Reverse(a.created_at));
        found
    }

    /// All applications still awaiting allotment.
    pub fn pending(&self) -> Vec<IpoApplication> {
        let applications = self.applications.read().unwrap();
        applications.values().filter(|a| a.is_pending()).cloned().collect()
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

    async fn setup(balance: Decimal) -> (Arc<LedgerStore>, Arc<PositionBook>, IpoDesk, AccountId) {
        let ledger = Arc::new(LedgerStore::new());
        let account = ledger.open_account().await;
        if balance > Decimal::ZERO {
            ledger
                .credit(account.id, balance, EntryKind::Deposit, Uuid::now_v7())
                .await
                .unwrap();
        }
        let positions = Arc::new(PositionBook::new(ledger.clone()));
        let desk = IpoDesk::new(ledger.clone(), positions.clone());
        (ledger, positions, desk, account.id)
    }

    fn newco_offering(desk: &IpoDesk) -> IpoOffering {
        desk.create_offering(Symbol::new("NEWCO").unwrap(), dec!(100), None, 50, dec!(1000))
            .unwrap()
    }

    #[tokio::test]
    async fn test_apply_blocks_full_cost() {
        let (ledger, _positions, desk, account_id) = setup(dec!(20000)).await;
        let offering = newco_offering(&desk);

        // 2 lots × 100 × 50 = 10,000
        let application = desk.apply(account_id, offering.id, 2).await.unwrap();
        assert_eq!(application.blocked_amount, dec!(10000));
        assert!(application.is_pending());

        let account = ledger.account(account_id).await.unwrap();
        assert_eq!(account.balance, dec!(20000)); // balance unchanged
        assert_eq!(account.blocked, dec!(10000));
        assert_eq!(account.spendable(), dec!(10000));
    }

    #[tokio::test]
    async fn test_allot_debits_and_credits_shares() {
        let (ledger, positions, desk, account_id) = setup(dec!(20000)).await;
        let offering = newco_offering(&desk);

        let application = desk.apply(account_id, offering.id, 2).await.unwrap();
        let decided = desk.allot(application.id).await.unwrap();
        assert_eq!(decided.status, IpoStatus::Allotted);

        let account = ledger.account(account_id).await.unwrap();
        assert_eq!(account.balance, dec!(10000)); // cost consumed
        assert_eq!(account.blocked, Decimal::ZERO);
        assert_eq!(account.spendable(), dec!(10000));

        // 2 lots × 50 shares at the effective price
        let position = positions.position(account_id, &offering.symbol).unwrap();
        assert_eq!(position.quantity, dec!(100));
        assert_eq!(position.avg_cost, dec!(100));
    }

    #[tokio::test]
    async fn test_reject_releases_with_zero_balance_change() {
        let (ledger, positions, desk, account_id) = setup(dec!(20000)).await;
        let offering = newco_offering(&desk);

        let application = desk.apply(account_id, offering.id, 2).await.unwrap();
        let decided = desk.reject(application.id).await.unwrap();
        assert_eq!(decided.status, IpoStatus::NotAllotted);

        let account = ledger.account(account_id).await.unwrap();
        assert_eq!(account.balance, dec!(20000));
        assert_eq!(account.blocked, Decimal::ZERO);
        assert!(positions.position(account_id, &offering.symbol).is_none());
    }

    #[tokio::test]
    async fn test_apply_below_minimum_investment() {
        let (ledger, _positions, desk, account_id) = setup(dec!(20000)).await;
        let offering = desk
            .create_offering(Symbol::new("NEWCO").unwrap(), dec!(10), None, 10, dec!(500))
            .unwrap();

        // 1 lot × 10 × 10 = 100 < 500
        let err = desk.apply(account_id, offering.id, 1).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::BelowMinimumInvestment { requested, minimum }
                if requested == dec!(100) && minimum == dec!(500)
        ));
        assert_eq!(ledger.account(account_id).await.unwrap().blocked, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_apply_uses_discount_price() {
        let (ledger, positions, desk, account_id) = setup(dec!(20000)).await;
        let offering = desk
            .create_offering(Symbol::new("NEWCO").unwrap(), dec!(100), Some(dec!(90)), 50, dec!(1000))
            .unwrap();

        // 2 lots × 90 × 50 = 9,000
        let application = desk.apply(account_id, offering.id, 2).await.unwrap();
        assert_eq!(application.blocked_amount, dec!(9000));

        desk.allot(application.id).await.unwrap();
        let position = positions.position(account_id, &offering.symbol).unwrap();
        assert_eq!(position.avg_cost, dec!(90));
        assert_eq!(ledger.account(account_id).await.unwrap().balance, dec!(11000));
    }

    #[tokio::test]
    async fn test_apply_insufficient_spendable_creates_nothing() {
        let (_ledger, _positions, desk, account_id) = setup(dec!(5000)).await;
        let offering = newco_offering(&desk);

        let err = desk.apply(account_id, offering.id, 2).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Ledger(LedgerError::InsufficientFunds { .. })
        ));
        assert!(desk.pending().is_empty());
    }

    #[tokio::test]
    async fn test_allotment_decision_is_exactly_once() {
        let (ledger, _positions, desk, account_id) = setup(dec!(20000)).await;
        let offering = newco_offering(&desk);

        let application = desk.apply(account_id, offering.id, 2).await.unwrap();
        desk.allot(application.id).await.unwrap();

        let err = desk.allot(application.id).await.unwrap_err();
        assert!(err.is_already_decided());
        let err = desk.reject(application.id).await.unwrap_err();
        assert!(err.is_already_decided());

        // Debited exactly once
        assert_eq!(ledger.account(account_id).await.unwrap().balance, dec!(10000));
    }

    #[tokio::test]
    async fn test_apply_to_unknown_offering_is_not_found() {
        let (_ledger, _positions, desk, account_id) = setup(dec!(20000)).await;
        let err = desk.apply(account_id, Uuid::now_v7(), 1).await.unwrap_err();
        assert!(matches!(err, EngineError::NotFound { entity: "offering", .. }));
    }

    #[tokio::test]
    async fn test_apply_zero_lots_is_invalid() {
        let (_ledger, _positions, desk, account_id) = setup(dec!(20000)).await;
        let offering = newco_offering(&desk);
        let err = desk.apply(account_id, offering.id, 0).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Domain(DomainError::InvalidAmount(_))
        ));
    }
}
