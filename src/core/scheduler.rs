//! Periodic farming yield accrual
//!
//! A single logical loop over every active farming position. Each
//! position's accrual is its own atomic unit: compute the elapsed
//! window, submit a `FarmingYield` entry through the ledger, and only
//! then advance the position's high-water mark. A failed emission
//! leaves `last_accrual_at` untouched so the window is retried on the
//! next run; one position's failure never aborts the batch.
//!
//! # Concurrency
//!
//! Positions are processed through a bounded `buffer_unordered` pool.
//! Runs are serialized by an async mutex, so two accrual attempts for
//! the same position can never interleave; cancelling a run between
//! per-position units leaves the remaining positions stale until the
//! next cycle, nothing more.

use crate::config::EngineConfig;
use crate::core::ledger::TransactionLedger;
use crate::storage::AccountStore;
use crate::types::{Amounts, EntryKind, EntrySubmission, FarmingPosition};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Per-run outcome tally
///
/// Besides the ledger entries themselves, this is the scheduler's
/// only externally visible output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccrualSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Outcome of one position's accrual attempt
enum AccrualOutcome {
    Succeeded,
    Failed,
    Skipped,
}

/// Fixed-interval batch accrual over active farming positions
pub struct AccrualScheduler {
    accounts: Arc<AccountStore>,
    ledger: Arc<TransactionLedger>,
    interval: Duration,
    workers: usize,
    run_guard: Mutex<()>,
}

impl AccrualScheduler {
    pub fn new(
        accounts: Arc<AccountStore>,
        ledger: Arc<TransactionLedger>,
        config: &EngineConfig,
    ) -> Self {
        AccrualScheduler {
            accounts,
            ledger,
            interval: config.accrual_interval,
            workers: config.accrual_workers.max(1),
            run_guard: Mutex::new(()),
        }
    }

    /// Run accrual for every active position once
    ///
    /// Runs are serialized: a second caller waits for the first to
    /// finish rather than interleaving with it.
    pub async fn run_once(&self) -> AccrualSummary {
        let _guard = self.run_guard.lock().await;

        let positions = self.accounts.active_positions();
        if positions.is_empty() {
            debug!("no active farming positions");
            return AccrualSummary::default();
        }
        debug!(positions = positions.len(), "accrual run starting");

        let outcomes: Vec<AccrualOutcome> = stream::iter(positions)
            .map(|position| self.accrue_position(position))
            .buffer_unordered(self.workers)
            .collect()
            .await;

        let summary = outcomes
            .iter()
            .fold(AccrualSummary::default(), |mut acc, outcome| {
                match outcome {
                    AccrualOutcome::Succeeded => acc.succeeded += 1,
                    AccrualOutcome::Failed => acc.failed += 1,
                    AccrualOutcome::Skipped => acc.skipped += 1,
                }
                acc
            });
        info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            skipped = summary.skipped,
            "accrual run finished"
        );
        summary
    }

    /// Accrue one position's elapsed yield
    ///
    /// The `last_accrual_at` advance is a separate store write, made
    /// only after the yield entry commits; losing the race between
    /// commit and advance can only delay yield, never double-pay it
    /// within a run, because runs are serialized.
    async fn accrue_position(&self, position: FarmingPosition) -> AccrualOutcome {
        let now = Utc::now();
        let amount = position.yield_between(now);
        if amount <= rust_decimal::Decimal::ZERO {
            return AccrualOutcome::Skipped;
        }

        let submission = EntrySubmission::new(
            position.account_id,
            EntryKind::FarmingYield,
            Amounts::in_currency(position.track, amount),
        )
        .with_metadata("track", position.track.to_string());

        match self.ledger.submit(submission).await {
            Ok(_) => {
                let advanced = self
                    .accounts
                    .update_position(position.account_id, position.track, |pos| {
                        pos.last_accrual_at = now;
                    });
                if let Err(error) = advanced {
                    warn!(
                        account_id = position.account_id,
                        track = %position.track,
                        %error,
                        "yield committed but position watermark not advanced"
                    );
                    return AccrualOutcome::Failed;
                }
                AccrualOutcome::Succeeded
            }
            Err(error) => {
                // Watermark untouched: the window is retried next run
                warn!(
                    account_id = position.account_id,
                    track = %position.track,
                    %error,
                    "yield emission failed"
                );
                AccrualOutcome::Failed
            }
        }
    }

    /// Interval loop until cancelled
    ///
    /// Cancellation is honored between runs; an in-flight run
    /// completes its current per-position units.
    pub async fn run(&self, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        info!(interval = ?self.interval, workers = self.workers, "accrual scheduler started");
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.run_once().await;
                }
                _ = shutdown.cancelled() => {
                    info!("accrual scheduler stopped");
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::balance_manager::BalanceManager;
    use crate::storage::EntryStore;
    use crate::types::Currency;
    use chrono::Duration as ChronoDuration;
    use rust_decimal::Decimal;

    struct Fixture {
        accounts: Arc<AccountStore>,
        ledger: Arc<TransactionLedger>,
        scheduler: AccrualScheduler,
    }

    fn fixture() -> Fixture {
        let config = EngineConfig {
            backoff_base: Duration::from_millis(1),
            accrual_workers: 4,
            ..EngineConfig::default()
        };
        let accounts = Arc::new(AccountStore::new());
        let entries = Arc::new(EntryStore::new());
        entries.create_segment(Utc::now().date_naive()).unwrap();
        let balances = Arc::new(BalanceManager::new(Arc::clone(&accounts), &config));
        let ledger = Arc::new(TransactionLedger::new(entries, balances, &config));
        let scheduler = AccrualScheduler::new(Arc::clone(&accounts), Arc::clone(&ledger), &config);
        Fixture {
            accounts,
            ledger,
            scheduler,
        }
    }

    /// Activate a position whose watermark is `seconds_ago` in the past
    fn seed_position(fixture: &Fixture, account_id: u64, rate: Decimal, seconds_ago: i64) {
        fixture.accounts.get_or_create(account_id);
        fixture.accounts.position_or_create(account_id, Currency::Ton);
        fixture
            .accounts
            .update_position(account_id, Currency::Ton, |pos| {
                pos.is_active = true;
                pos.rate_per_second = rate;
                pos.last_accrual_at = Utc::now() - ChronoDuration::seconds(seconds_ago);
            })
            .unwrap();
    }

    #[tokio::test]
    async fn test_yield_credited_for_elapsed_window() {
        let fixture = fixture();
        seed_position(&fixture, 1, Decimal::new(1, 2), 100); // 0.01/sec for ~100s

        let summary = fixture.scheduler.run_once().await;

        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 0);
        let balance = fixture.accounts.get(1).unwrap().balances.ton;
        // At least the 100 whole seconds, plus maybe one more boundary tick
        assert!(balance >= Decimal::ONE, "got {}", balance);
        assert_eq!(fixture.ledger.committed_sum(1).ton, balance);
    }

    #[tokio::test]
    async fn test_second_run_without_elapsed_time_accrues_nothing() {
        let fixture = fixture();
        seed_position(&fixture, 1, Decimal::new(1, 2), 100);

        fixture.scheduler.run_once().await;
        let balance_after_first = fixture.accounts.get(1).unwrap().balances.ton;

        let summary = fixture.scheduler.run_once().await;

        assert_eq!(summary.succeeded, 0);
        assert_eq!(summary.skipped, 1);
        assert_eq!(fixture.accounts.get(1).unwrap().balances.ton, balance_after_first);
    }

    #[tokio::test]
    async fn test_inactive_positions_ignored() {
        let fixture = fixture();
        seed_position(&fixture, 1, Decimal::ONE, 100);
        fixture
            .accounts
            .update_position(1, Currency::Ton, |pos| {
                pos.is_active = false;
            })
            .unwrap();

        let summary = fixture.scheduler.run_once().await;
        assert_eq!(summary, AccrualSummary::default());
    }

    #[tokio::test]
    async fn test_zero_rate_position_skipped() {
        let fixture = fixture();
        seed_position(&fixture, 1, Decimal::ZERO, 100);

        let summary = fixture.scheduler.run_once().await;

        assert_eq!(summary.skipped, 1);
        assert_eq!(fixture.accounts.get(1).unwrap().balances.ton, Decimal::ZERO);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_batch_processes_many_positions() {
        let fixture = fixture();
        for account_id in 1..=20 {
            seed_position(&fixture, account_id, Decimal::new(1, 2), 60);
        }

        let summary = fixture.scheduler.run_once().await;

        assert_eq!(summary.succeeded, 20);
        for account_id in 1..=20 {
            assert!(fixture.accounts.get(account_id).unwrap().balances.ton > Decimal::ZERO);
        }
    }

    #[tokio::test]
    async fn test_one_failure_does_not_abort_batch() {
        let fixture = fixture();
        seed_position(&fixture, 1, Decimal::new(1, 2), 100);
        // Position for an account that does not exist in the account
        // store: its yield submission fails at the mutation step.
        fixture.accounts.position_or_create(2, Currency::Ton);
        fixture
            .accounts
            .update_position(2, Currency::Ton, |pos| {
                pos.is_active = true;
                pos.rate_per_second = Decimal::ONE;
                pos.last_accrual_at = Utc::now() - ChronoDuration::seconds(100);
            })
            .unwrap();

        let summary = fixture.scheduler.run_once().await;

        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 1);
        // The failed position's watermark is unchanged, so the window
        // is retried next run.
        let stale = fixture.accounts.position(2, Currency::Ton).unwrap();
        assert!(Utc::now() - stale.last_accrual_at >= ChronoDuration::seconds(100));
    }

    #[tokio::test]
    async fn test_run_loop_honors_cancellation() {
        let fixture = fixture();
        let scheduler = Arc::new(fixture.scheduler);
        let shutdown = CancellationToken::new();

        let handle = {
            let scheduler = Arc::clone(&scheduler);
            let shutdown = shutdown.clone();
            tokio::spawn(async move { scheduler.run(shutdown).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("scheduler did not stop on cancellation")
            .unwrap();
    }
}
