//! Deposit reconciliation
//!
//! Farming principal is denormalized state. The reconciler is its
//! only writer: it derives the cumulative funded amount from
//! committed deposit history and repairs the position record, setting
//! the accrual rate from the applicable plan. It reads the ledger and
//! writes position fields directly; it never emits a balance-affecting
//! entry, so a deposit can never be double counted as both a balance
//! credit and farming principal.

use crate::config::EngineConfig;
use crate::core::ledger::TransactionLedger;
use crate::storage::AccountStore;
use crate::types::{AccountId, Currency, EntryStatus, FarmingPosition, LedgerError, PlanCatalog};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::info;

/// Recomputes position principal from committed ledger history
pub struct DepositReconciler {
    accounts: Arc<AccountStore>,
    ledger: Arc<TransactionLedger>,
    plans: Arc<PlanCatalog>,
    base_daily_rate: Decimal,
}

impl DepositReconciler {
    pub fn new(
        accounts: Arc<AccountStore>,
        ledger: Arc<TransactionLedger>,
        plans: Arc<PlanCatalog>,
        config: &EngineConfig,
    ) -> Self {
        DepositReconciler {
            accounts,
            ledger,
            plans,
            base_daily_rate: config.base_daily_rate,
        }
    }

    /// Recompute a position's principal and rate from ledger history
    ///
    /// Sums committed principal-crediting entries (external deposits;
    /// yield entries are rewards and are explicitly excluded), writes
    /// the result as the position's principal, and derives
    /// `rate_per_second` from the position's plan, or the base rate
    /// when no plan is attached. The position activates when it has
    /// principal.
    ///
    /// Idempotent and side-effect-free on the ledger: running it
    /// twice without new committed deposits yields identical state.
    pub fn reconcile(&self, account_id: AccountId, track: Currency) -> Result<Decimal, LedgerError> {
        let principal = self.funded_principal(account_id, track);

        self.accounts.position_or_create(account_id, track);
        let position = self
            .accounts
            .update_position(account_id, track, |pos| {
                pos.principal = principal;
                pos.rate_per_second = self.rate_for(pos, principal);
                if principal > Decimal::ZERO {
                    pos.is_active = true;
                }
            })
            .map_err(|_| LedgerError::account_not_found(account_id))?;

        info!(
            account_id,
            track = %track,
            principal = %position.principal,
            rate_per_second = %position.rate_per_second,
            active = position.is_active,
            "position reconciled"
        );
        Ok(principal)
    }

    /// Cumulative funded amount per committed deposit history
    fn funded_principal(&self, account_id: AccountId, track: Currency) -> Decimal {
        self.ledger
            .committed_entries(account_id)
            .iter()
            .filter(|entry| entry.status == EntryStatus::Committed)
            .filter(|entry| entry.kind.credits_principal())
            .map(|entry| entry.amounts.get(track))
            .sum()
    }

    fn rate_for(&self, position: &FarmingPosition, principal: Decimal) -> Decimal {
        match position.plan_id.and_then(|plan_id| self.plans.get(plan_id)) {
            Some(plan) => plan.rate_per_second(principal),
            None => principal * self.base_daily_rate / Decimal::from(86_400),
        }
    }
}
