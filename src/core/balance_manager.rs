//! Exclusive gateway for balance mutation
//!
//! Every balance change in the system flows through
//! [`BalanceManager::mutate`]; together with the transaction ledger it
//! forms the only sanctioned write path to account balances. The
//! manager owns a TTL-bounded read cache used for display reads only:
//! the mutation path always re-reads the authoritative store, and the
//! cache is invalidated eagerly on every successful mutation.
//!
//! # Retry behavior
//!
//! Compare-and-swap conflicts are retried with exponential backoff up
//! to a bounded attempt count; exhaustion surfaces as
//! [`LedgerError::Contention`], which is safe to resubmit.

use crate::config::EngineConfig;
use crate::storage::{AccountStore, CasError};
use crate::types::{AccountId, Amounts, Currency, LedgerError};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// A cached balance read with its fill time
#[derive(Debug, Clone, Copy)]
struct CachedBalances {
    amounts: Amounts,
    cached_at: Instant,
}

/// Sole mutation gateway for account balances
#[derive(Debug)]
pub struct BalanceManager {
    store: Arc<AccountStore>,
    cache: DashMap<AccountId, CachedBalances>,
    cache_ttl: Duration,
    max_attempts: u32,
    backoff_base: Duration,
}

impl BalanceManager {
    pub fn new(store: Arc<AccountStore>, config: &EngineConfig) -> Self {
        BalanceManager {
            store,
            cache: DashMap::new(),
            cache_ttl: config.balance_cache_ttl,
            max_attempts: config.max_cas_attempts,
            backoff_base: config.backoff_base,
        }
    }

    /// Read balances, cache-first
    ///
    /// Suitable for display and reporting only; a stale read here is
    /// acceptable because no mutation decision is ever based on it.
    pub fn get_balances(&self, account_id: AccountId) -> Result<Amounts, LedgerError> {
        if let Some(cached) = self.cache.get(&account_id) {
            if cached.cached_at.elapsed() < self.cache_ttl {
                return Ok(cached.amounts);
            }
        }
        let account = self
            .store
            .get(account_id)
            .ok_or_else(|| LedgerError::account_not_found(account_id))?;
        self.fill_cache(account_id, account.balances);
        Ok(account.balances)
    }

    /// Apply a signed balance delta
    ///
    /// Re-reads the authoritative store, validates that no balance
    /// would go negative, and applies the change via compare-and-swap,
    /// retrying conflicts with exponential backoff. Returns the
    /// post-mutation balances. Does **not** record history; the
    /// transaction ledger is responsible for that, and the two are
    /// invoked as one logical unit of work by `TransactionLedger::submit`.
    ///
    /// # Errors
    ///
    /// * [`LedgerError::InsufficientFunds`] if a delta would drive a
    ///   balance negative (no side effects)
    /// * [`LedgerError::Contention`] once retries are exhausted
    /// * [`LedgerError::AccountNotFound`] for unknown accounts
    pub async fn mutate(
        &self,
        account_id: AccountId,
        delta: Amounts,
        reason: &str,
    ) -> Result<Amounts, LedgerError> {
        for attempt in 0..self.max_attempts {
            let account = self
                .store
                .get(account_id)
                .ok_or_else(|| LedgerError::account_not_found(account_id))?;

            let new_balances = account
                .balances
                .checked_add(&delta)
                .ok_or_else(|| LedgerError::arithmetic_overflow(account_id, reason))?;

            if let Some(currency) = first_negative(&new_balances) {
                return Err(LedgerError::insufficient_funds(
                    account_id,
                    currency.to_string(),
                    account.balances.get(currency),
                    delta.get(currency).abs(),
                ));
            }

            match self
                .store
                .compare_and_swap(account_id, account.version, |acct| {
                    acct.balances = new_balances;
                }) {
                Ok(updated) => {
                    self.fill_cache(account_id, updated.balances);
                    debug!(
                        account_id,
                        reason,
                        uni = %updated.balances.uni,
                        ton = %updated.balances.ton,
                        "balance mutated"
                    );
                    return Ok(updated.balances);
                }
                Err(CasError::Conflict { .. }) => {
                    let delay = self.backoff_base * 2u32.saturating_pow(attempt);
                    debug!(account_id, attempt, ?delay, "CAS conflict, backing off");
                    tokio::time::sleep(delay).await;
                }
                Err(CasError::NotFound { .. }) => {
                    return Err(LedgerError::account_not_found(account_id));
                }
            }
        }

        warn!(account_id, attempts = self.max_attempts, reason, "mutation contention");
        Err(LedgerError::contention(account_id, self.max_attempts))
    }

    /// Drop any cached read for the account
    pub fn invalidate(&self, account_id: AccountId) {
        self.cache.remove(&account_id);
    }

    fn fill_cache(&self, account_id: AccountId, amounts: Amounts) {
        self.cache.insert(
            account_id,
            CachedBalances {
                amounts,
                cached_at: Instant::now(),
            },
        );
    }
}

/// First currency whose balance component is negative, if any
fn first_negative(amounts: &Amounts) -> Option<Currency> {
    Currency::ALL
        .into_iter()
        .find(|currency| amounts.get(*currency).is_sign_negative() && !amounts.get(*currency).is_zero())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn manager() -> (Arc<AccountStore>, BalanceManager) {
        let store = Arc::new(AccountStore::new());
        let config = EngineConfig {
            backoff_base: Duration::from_millis(1),
            ..EngineConfig::default()
        };
        let manager = BalanceManager::new(Arc::clone(&store), &config);
        (store, manager)
    }

    fn credit(currency: Currency, value: i64, scale: u32) -> Amounts {
        Amounts::in_currency(currency, Decimal::new(value, scale))
    }

    #[tokio::test]
    async fn test_mutate_credits_balance() {
        let (store, manager) = manager();
        store.get_or_create(1);

        let balances = manager
            .mutate(1, credit(Currency::Ton, 25, 1), "deposit")
            .await
            .unwrap();

        assert_eq!(balances.ton, Decimal::new(25, 1));
        assert_eq!(store.get(1).unwrap().balances.ton, Decimal::new(25, 1));
    }

    #[tokio::test]
    async fn test_mutate_unknown_account() {
        let (_store, manager) = manager();
        let result = manager.mutate(404, credit(Currency::Uni, 1, 0), "deposit").await;
        assert_eq!(result, Err(LedgerError::account_not_found(404)));
    }

    #[tokio::test]
    async fn test_debit_below_zero_has_no_side_effects() {
        let (store, manager) = manager();
        store.get_or_create(1);
        manager
            .mutate(1, credit(Currency::Ton, 5, 1), "deposit")
            .await
            .unwrap();
        let version_before = store.get(1).unwrap().version;

        let result = manager
            .mutate(1, credit(Currency::Ton, -10, 1), "purchase")
            .await;

        assert!(matches!(result, Err(LedgerError::InsufficientFunds { .. })));
        let account = store.get(1).unwrap();
        assert_eq!(account.balances.ton, Decimal::new(5, 1));
        assert_eq!(account.version, version_before);
    }

    #[tokio::test]
    async fn test_mixed_delta_rejected_when_one_side_underflows() {
        let (store, manager) = manager();
        store.get_or_create(1);
        manager
            .mutate(1, credit(Currency::Uni, 100, 0), "deposit")
            .await
            .unwrap();

        // UNI credit is fine, TON debit is not; the whole delta must be rejected
        let delta = Amounts {
            uni: Decimal::ONE,
            ton: Decimal::NEGATIVE_ONE,
        };
        let result = manager.mutate(1, delta, "adjustment").await;
        assert!(matches!(result, Err(LedgerError::InsufficientFunds { .. })));
        assert_eq!(store.get(1).unwrap().balances.uni, Decimal::from(100));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_mutations_lose_no_updates() {
        let (store, manager) = manager();
        store.get_or_create(1);
        let manager = Arc::new(manager);

        let mut handles = vec![];
        for _ in 0..40 {
            let manager = Arc::clone(&manager);
            handles.push(tokio::spawn(async move {
                manager
                    .mutate(1, credit(Currency::Uni, 1, 0), "deposit")
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(store.get(1).unwrap().balances.uni, Decimal::from(40));
    }

    #[tokio::test]
    async fn test_cached_read_and_eager_invalidation() {
        let (store, manager) = manager();
        store.get_or_create(1);
        manager
            .mutate(1, credit(Currency::Uni, 10, 0), "deposit")
            .await
            .unwrap();

        // Write behind the gateway's back; the cache still serves the old value
        let account = store.get(1).unwrap();
        store
            .compare_and_swap(1, account.version, |acct| {
                acct.balances.uni = Decimal::from(999);
            })
            .unwrap();
        assert_eq!(manager.get_balances(1).unwrap().uni, Decimal::from(10));

        // A mutation through the gateway refreshes the cache
        manager
            .mutate(1, credit(Currency::Uni, 1, 0), "deposit")
            .await
            .unwrap();
        assert_eq!(manager.get_balances(1).unwrap().uni, Decimal::from(1000));
    }

    #[tokio::test]
    async fn test_expired_cache_rereads_store() {
        let store = Arc::new(AccountStore::new());
        let config = EngineConfig {
            balance_cache_ttl: Duration::from_millis(10),
            backoff_base: Duration::from_millis(1),
            ..EngineConfig::default()
        };
        let manager = BalanceManager::new(Arc::clone(&store), &config);
        store.get_or_create(1);

        manager
            .mutate(1, credit(Currency::Ton, 1, 0), "deposit")
            .await
            .unwrap();
        let account = store.get(1).unwrap();
        store
            .compare_and_swap(1, account.version, |acct| {
                acct.balances.ton = Decimal::from(7);
            })
            .unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(manager.get_balances(1).unwrap().ton, Decimal::from(7));
    }
}
