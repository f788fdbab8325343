//! Reward engine facade
//!
//! Wires the ledger core together and exposes the collaborator
//! boundary: deposit/purchase intake and balance/history/position
//! egress. External modules never touch the stores directly: intake
//! flows through `TransactionLedger::submit` and egress is read-only
//! projection.

use crate::config::EngineConfig;
use crate::core::auditor::{BalanceAuditor, DriftReport};
use crate::core::balance_manager::BalanceManager;
use crate::core::ledger::{HistoryCursor, HistoryFilter, HistoryPage, SubmitOutcome, TransactionLedger};
use crate::core::partition::PartitionManager;
use crate::core::reconciler::DepositReconciler;
use crate::core::scheduler::{AccrualScheduler, AccrualSummary};
use crate::storage::{AccountStore, EntryStore};
use crate::types::{
    AccountId, Amounts, Currency, EntryKind, EntrySubmission, LedgerError, PlanCatalog, PlanId,
    PositionStatus,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Result of a plan purchase
#[derive(Debug, Clone)]
pub struct PurchaseReceipt {
    /// The committed purchase debit entry
    pub outcome: SubmitOutcome,

    /// The position's principal after reconciliation
    pub principal: Decimal,
}

/// The assembled ledger core and its collaborator boundary
pub struct RewardEngine {
    config: EngineConfig,
    accounts: Arc<AccountStore>,
    balances: Arc<BalanceManager>,
    ledger: Arc<TransactionLedger>,
    scheduler: Arc<AccrualScheduler>,
    reconciler: DepositReconciler,
    partitions: Arc<PartitionManager>,
    auditor: BalanceAuditor,
    plans: Arc<PlanCatalog>,
}

impl RewardEngine {
    /// Assemble the engine and pre-create the partition horizon
    pub fn new(config: EngineConfig, plans: PlanCatalog) -> Self {
        let config = config.sanitized();
        let accounts = Arc::new(AccountStore::new());
        let entries = Arc::new(EntryStore::new());
        let plans = Arc::new(plans);
        let balances = Arc::new(BalanceManager::new(Arc::clone(&accounts), &config));
        let ledger = Arc::new(TransactionLedger::new(
            Arc::clone(&entries),
            Arc::clone(&balances),
            &config,
        ));
        let scheduler = Arc::new(AccrualScheduler::new(
            Arc::clone(&accounts),
            Arc::clone(&ledger),
            &config,
        ));
        let reconciler = DepositReconciler::new(
            Arc::clone(&accounts),
            Arc::clone(&ledger),
            Arc::clone(&plans),
            &config,
        );
        let partitions = Arc::new(PartitionManager::new(Arc::clone(&entries), &config));
        let auditor = BalanceAuditor::new(Arc::clone(&accounts), Arc::clone(&ledger));

        partitions.ensure_segments(config.partition_days_ahead);

        RewardEngine {
            config,
            accounts,
            balances,
            ledger,
            scheduler,
            reconciler,
            partitions,
            auditor,
            plans,
        }
    }

    /// Create the account record for a new participant
    ///
    /// Idempotent; accounts are never deleted.
    pub fn register_account(&self, account_id: AccountId) {
        self.accounts.get_or_create(account_id);
    }

    /// Record an externally reported deposit
    ///
    /// Safe to retry: resubmitting the same `(account, external_ref)`
    /// returns the original entry as a duplicate and credits nothing.
    /// A newly committed deposit triggers reconciliation of the
    /// track's farming position.
    pub async fn report_deposit(
        &self,
        account_id: AccountId,
        track: Currency,
        amount: Decimal,
        external_ref: &str,
    ) -> Result<SubmitOutcome, LedgerError> {
        self.accounts.get_or_create(account_id);

        let outcome = self
            .ledger
            .submit(
                EntrySubmission::new(
                    account_id,
                    EntryKind::DepositExternal,
                    Amounts::in_currency(track, amount),
                )
                .with_external_ref(external_ref)
                .with_metadata("track", track.to_string()),
            )
            .await?;

        if !outcome.duplicate {
            self.reconciler.reconcile(account_id, track)?;
        }
        Ok(outcome)
    }

    /// Purchase a boost plan
    ///
    /// Debits the exact plan price (never the account's current
    /// balance), attaches the plan to the track's position, and
    /// reconciles principal from deposit history. The plan's UNI
    /// bonus, if any, is credited as a separate adjustment entry.
    pub async fn request_purchase(
        &self,
        account_id: AccountId,
        plan_id: PlanId,
    ) -> Result<PurchaseReceipt, LedgerError> {
        let plan = self
            .plans
            .get(plan_id)
            .ok_or(LedgerError::UnknownPlan { plan_id })?
            .clone();

        let outcome = self
            .ledger
            .submit(
                EntrySubmission::new(
                    account_id,
                    EntryKind::PurchaseDebit,
                    Amounts::in_currency(plan.currency, plan.price),
                )
                .with_metadata("plan_id", plan.id.to_string()),
            )
            .await?;

        self.accounts.position_or_create(account_id, plan.currency);
        self.accounts
            .update_position(account_id, plan.currency, |pos| {
                pos.plan_id = Some(plan.id);
                pos.is_active = true;
            })
            .map_err(|_| LedgerError::account_not_found(account_id))?;
        let principal = self.reconciler.reconcile(account_id, plan.currency)?;

        if plan.bonus_uni > Decimal::ZERO {
            let bonus = self
                .ledger
                .submit(
                    EntrySubmission::new(
                        account_id,
                        EntryKind::AdjustmentManual,
                        Amounts::in_currency(Currency::Uni, plan.bonus_uni),
                    )
                    .with_metadata("plan_bonus", plan.id.to_string()),
                )
                .await;
            if let Err(error) = bonus {
                // The purchase itself stands; the bonus attempt is on
                // record as a failed entry for follow-up.
                warn!(account_id, plan_id, %error, "plan bonus credit failed");
            }
        }

        Ok(PurchaseReceipt { outcome, principal })
    }

    /// Current balances (cache-first, display only)
    pub fn get_balances(&self, account_id: AccountId) -> Result<Amounts, LedgerError> {
        self.balances.get_balances(account_id)
    }

    /// Paginated entry history, newest first
    pub fn get_history(
        &self,
        account_id: AccountId,
        filter: &HistoryFilter,
        cursor: Option<HistoryCursor>,
        limit: usize,
    ) -> HistoryPage {
        self.ledger.history(account_id, filter, cursor, limit)
    }

    /// Farming position projection for one track
    pub fn get_position_status(
        &self,
        account_id: AccountId,
        track: Currency,
    ) -> Option<PositionStatus> {
        self.accounts
            .position(account_id, track)
            .map(|position| PositionStatus::from(&position))
    }

    /// Run one accrual batch immediately
    pub async fn accrue_once(&self) -> AccrualSummary {
        self.scheduler.run_once().await
    }

    /// Sweep all accounts for balance drift
    pub fn audit(&self) -> Vec<DriftReport> {
        self.auditor.audit_all()
    }

    /// All account balances, for egress snapshots
    pub fn all_balances(&self) -> Vec<(AccountId, Amounts)> {
        let mut balances: Vec<(AccountId, Amounts)> = self
            .accounts
            .all_accounts()
            .into_iter()
            .map(|account| (account.id, account.balances))
            .collect();
        balances.sort_by_key(|(id, _)| *id);
        balances
    }

    /// Spawn the background loops; cancel the returned token to stop
    pub fn start_background(&self) -> CancellationToken {
        let shutdown = CancellationToken::new();
        {
            let scheduler = Arc::clone(&self.scheduler);
            let token = shutdown.clone();
            tokio::spawn(async move { scheduler.run(token).await });
        }
        {
            let partitions = Arc::clone(&self.partitions);
            let token = shutdown.clone();
            tokio::spawn(async move { partitions.run(token).await });
        }
        shutdown
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EntryStatus;
    use std::time::Duration;

    fn engine() -> RewardEngine {
        let config = EngineConfig {
            backoff_base: Duration::from_millis(1),
            ..EngineConfig::default()
        };
        RewardEngine::new(config, PlanCatalog::standard())
    }

    fn dec(value: &str) -> Decimal {
        value.parse().unwrap()
    }

    #[tokio::test]
    async fn test_deposit_credits_and_activates_position() {
        let engine = engine();

        let outcome = engine
            .report_deposit(1, Currency::Ton, dec("2.5"), "r1")
            .await
            .unwrap();

        assert!(!outcome.duplicate);
        assert_eq!(engine.get_balances(1).unwrap().ton, dec("2.5"));
        let status = engine.get_position_status(1, Currency::Ton).unwrap();
        assert!(status.is_active);
        assert_eq!(status.principal, dec("2.5"));
    }

    #[tokio::test]
    async fn test_duplicate_deposit_report_credits_once() {
        let engine = engine();

        engine
            .report_deposit(1, Currency::Ton, dec("2.5"), "r1")
            .await
            .unwrap();
        let second = engine
            .report_deposit(1, Currency::Ton, dec("2.5"), "r1")
            .await
            .unwrap();

        assert!(second.duplicate);
        assert_eq!(engine.get_balances(1).unwrap().ton, dec("2.5"));
        let page = engine.get_history(
            1,
            &HistoryFilter {
                status: Some(EntryStatus::Committed),
                kind: None,
            },
            None,
            10,
        );
        assert_eq!(page.entries.len(), 1);
    }

    #[tokio::test]
    async fn test_purchase_debits_exact_price_not_balance() {
        let engine = engine();

        // Balance 100.36 of which only 15 is deposited principal; the
        // rest arrived as rewards.
        engine
            .report_deposit(1, Currency::Ton, dec("15"), "r1")
            .await
            .unwrap();
        engine
            .ledger
            .submit(EntrySubmission::new(
                1,
                EntryKind::MissionReward,
                Amounts::in_currency(Currency::Ton, dec("85.36")),
            ))
            .await
            .unwrap();
        assert_eq!(engine.get_balances(1).unwrap().ton, dec("100.36"));

        let receipt = engine.request_purchase(1, 1).await.unwrap(); // Starter, price 1

        assert_eq!(engine.get_balances(1).unwrap().ton, dec("99.36"));
        assert_eq!(receipt.principal, dec("15"));
        let status = engine.get_position_status(1, Currency::Ton).unwrap();
        assert_eq!(status.principal, dec("15"));
        assert_eq!(status.plan_id, Some(1));
    }

    #[tokio::test]
    async fn test_purchase_bonus_credited_in_uni() {
        let engine = engine();
        engine
            .report_deposit(1, Currency::Ton, dec("10"), "r1")
            .await
            .unwrap();

        engine.request_purchase(1, 1).await.unwrap();

        // Starter bonus is 10 UNI
        assert_eq!(engine.get_balances(1).unwrap().uni, dec("10"));
        assert!(engine.audit().is_empty());
    }

    #[tokio::test]
    async fn test_purchase_with_insufficient_funds_changes_nothing() {
        let engine = engine();
        engine
            .report_deposit(1, Currency::Ton, dec("0.5"), "r1")
            .await
            .unwrap();

        let result = engine.request_purchase(1, 1).await;

        assert!(matches!(result, Err(LedgerError::InsufficientFunds { .. })));
        assert_eq!(engine.get_balances(1).unwrap().ton, dec("0.5"));
        let status = engine.get_position_status(1, Currency::Ton).unwrap();
        assert_eq!(status.plan_id, None);
        assert!(engine.audit().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_plan_rejected() {
        let engine = engine();
        engine.register_account(1);
        let result = engine.request_purchase(1, 99).await;
        assert_eq!(result.unwrap_err(), LedgerError::UnknownPlan { plan_id: 99 });
    }

    #[tokio::test]
    async fn test_invariant_holds_across_full_flow() {
        let engine = engine();

        engine
            .report_deposit(1, Currency::Ton, dec("50"), "r1")
            .await
            .unwrap();
        engine.request_purchase(1, 2).await.unwrap();
        let _ = engine.report_deposit(1, Currency::Ton, dec("50"), "r1").await; // duplicate
        let _ = engine.request_purchase(1, 5).await; // Elite costs 100, insufficient
        engine.accrue_once().await;

        assert!(engine.audit().is_empty());
    }

    #[tokio::test]
    async fn test_all_balances_sorted_by_account() {
        let engine = engine();
        engine
            .report_deposit(3, Currency::Uni, dec("1"), "a")
            .await
            .unwrap();
        engine
            .report_deposit(1, Currency::Uni, dec("2"), "b")
            .await
            .unwrap();

        let balances = engine.all_balances();
        assert_eq!(balances.len(), 2);
        assert_eq!(balances[0].0, 1);
        assert_eq!(balances[1].0, 3);
    }
}
