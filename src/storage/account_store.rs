//! Versioned account and position storage
//!
//! This module provides the `AccountStore`, the durable record layer
//! for participant accounts and their farming positions. It is a
//! storage abstraction only: no business rules live here.
//!
//! # Concurrency
//!
//! Records live in `DashMap`s for fine-grained per-entry locking. All
//! account writes go through [`AccountStore::compare_and_swap`], keyed
//! on a monotonically increasing version, so a writer that raced
//! another gets a [`CasError::Conflict`] and must re-read and retry.
//! Operations on different accounts never block each other.

use crate::types::{Account, AccountId, Currency, FarmingPosition};
use chrono::Utc;
use dashmap::DashMap;
use thiserror::Error;

/// Storage-level failures surfaced to the mutation gateway
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CasError {
    /// The record does not exist
    #[error("Account {account_id} not found")]
    NotFound { account_id: AccountId },

    /// The caller's version is stale; re-read and retry
    #[error("Version conflict on account {account_id}: expected {expected}, actual {actual}")]
    Conflict {
        account_id: AccountId,
        expected: u64,
        actual: u64,
    },
}

/// Durable key-value record store for accounts and farming positions
#[derive(Debug, Default)]
pub struct AccountStore {
    accounts: DashMap<AccountId, Account>,
    positions: DashMap<(AccountId, Currency), FarmingPosition>,
}

impl AccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch an account snapshot
    ///
    /// The returned value is a clone taken under the entry lock;
    /// concurrent writers may advance the record immediately after.
    pub fn get(&self, account_id: AccountId) -> Option<Account> {
        self.accounts.get(&account_id).map(|entry| entry.clone())
    }

    /// Fetch an account, creating an empty one if absent
    ///
    /// Creation is idempotent under concurrency: racing creators all
    /// observe the same record.
    pub fn get_or_create(&self, account_id: AccountId) -> Account {
        self.accounts
            .entry(account_id)
            .or_insert_with(|| Account::new(account_id))
            .clone()
    }

    /// Apply a mutation if the caller's version is still current
    ///
    /// The closure runs while the entry lock is held, then the store
    /// bumps `version` and advances `updated_at`. On a version
    /// mismatch nothing is applied and the caller must re-read.
    ///
    /// # Errors
    ///
    /// * [`CasError::NotFound`] if the account does not exist
    /// * [`CasError::Conflict`] if `expected_version` is stale
    pub fn compare_and_swap<F>(
        &self,
        account_id: AccountId,
        expected_version: u64,
        mutate: F,
    ) -> Result<Account, CasError>
    where
        F: FnOnce(&mut Account),
    {
        let mut entry = self
            .accounts
            .get_mut(&account_id)
            .ok_or(CasError::NotFound { account_id })?;

        if entry.version != expected_version {
            return Err(CasError::Conflict {
                account_id,
                expected: expected_version,
                actual: entry.version,
            });
        }

        mutate(entry.value_mut());
        entry.version += 1;
        entry.updated_at = Utc::now();
        Ok(entry.clone())
    }

    /// Number of stored accounts
    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }

    /// Snapshot of all accounts, in arbitrary order
    pub fn all_accounts(&self) -> Vec<Account> {
        self.accounts.iter().map(|entry| entry.clone()).collect()
    }

    /// Fetch a farming position snapshot
    pub fn position(&self, account_id: AccountId, track: Currency) -> Option<FarmingPosition> {
        self.positions
            .get(&(account_id, track))
            .map(|entry| entry.clone())
    }

    /// Fetch a position, creating an inactive empty one if absent
    pub fn position_or_create(&self, account_id: AccountId, track: Currency) -> FarmingPosition {
        self.positions
            .entry((account_id, track))
            .or_insert_with(|| FarmingPosition::new(account_id, track))
            .clone()
    }

    /// Update a position under its entry lock
    ///
    /// Positions are denormalized state repaired wholesale by the
    /// reconciler; they carry no version counter of their own.
    pub fn update_position<F>(
        &self,
        account_id: AccountId,
        track: Currency,
        mutate: F,
    ) -> Result<FarmingPosition, CasError>
    where
        F: FnOnce(&mut FarmingPosition),
    {
        let mut entry = self
            .positions
            .get_mut(&(account_id, track))
            .ok_or(CasError::NotFound { account_id })?;
        mutate(entry.value_mut());
        Ok(entry.clone())
    }

    /// Snapshot of every active position, in arbitrary order
    pub fn active_positions(&self) -> Vec<FarmingPosition> {
        self.positions
            .iter()
            .filter(|entry| entry.is_active)
            .map(|entry| entry.clone())
            .collect()
    }
}
