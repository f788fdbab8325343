//! Append-only, idempotent transaction ledger
//!
//! [`TransactionLedger::submit`] is the single entry point for every
//! balance-affecting event. It records the event first, applies the
//! balance change for kinds the closed effect table says have one,
//! and finalizes the entry as committed or failed. Failed entries
//! persist as an audit trail of the attempt, but only committed
//! entries count toward the balance invariant.
//!
//! Idempotency: when a submission carries an external reference, the
//! `(account, external_ref)` pair is claimed atomically in the entry
//! store; a resubmission returns the pre-existing entry flagged as a
//! duplicate, which callers treat as success-equivalent.

use crate::config::EngineConfig;
use crate::core::balance_manager::BalanceManager;
use crate::storage::{AppendOutcome, EntryStore, EntryStoreError};
use crate::types::{
    AccountId, Amounts, BalanceEffect, EntryId, EntryKind, EntryStatus, EntrySubmission,
    LedgerEntry, LedgerError,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Result of a successful (or duplicate) submission
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitOutcome {
    pub entry: LedgerEntry,

    /// True when the external ref was already recorded; the returned
    /// entry is the pre-existing one and no new work was done
    pub duplicate: bool,
}

/// Filter for history reads
#[derive(Debug, Clone, Default)]
pub struct HistoryFilter {
    pub kind: Option<EntryKind>,
    pub status: Option<EntryStatus>,
}

/// Restartable position within a history scan
///
/// Identifies the last entry the previous page returned; the next
/// page resumes strictly after it in descending order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistoryCursor {
    pub created_at: DateTime<Utc>,
    pub id: EntryId,
}

/// One page of history, newest first
#[derive(Debug, Clone)]
pub struct HistoryPage {
    pub entries: Vec<LedgerEntry>,

    /// Present when more entries remain
    pub next_cursor: Option<HistoryCursor>,
}

/// The append-only log of balance-affecting events
#[derive(Debug)]
pub struct TransactionLedger {
    entries: Arc<EntryStore>,
    balances: Arc<BalanceManager>,
    storage_timeout: Duration,
}

impl TransactionLedger {
    pub fn new(
        entries: Arc<EntryStore>,
        balances: Arc<BalanceManager>,
        config: &EngineConfig,
    ) -> Self {
        TransactionLedger {
            entries,
            balances,
            storage_timeout: config.storage_timeout,
        }
    }

    /// Record an event and apply its balance effect as one logical
    /// unit of work
    ///
    /// Sequence: insert `pending`, mutate balances if the kind table
    /// says so, finalize `committed`. Any mutation failure (including
    /// `InsufficientFunds` on a purchase) finalizes the entry as
    /// `failed` and surfaces the typed error; a ledger entry is never
    /// committed without its balance change, nor vice versa.
    pub async fn submit(&self, submission: EntrySubmission) -> Result<SubmitOutcome, LedgerError> {
        self.validate(&submission)?;

        let entry = LedgerEntry {
            id: self.entries.allocate_id(),
            account_id: submission.account_id,
            kind: submission.kind,
            amounts: submission.amounts,
            external_ref: submission.external_ref,
            status: EntryStatus::Pending,
            metadata: submission.metadata,
            created_at: Utc::now(),
        };
        let entry_id = entry.id;
        let account_id = entry.account_id;
        let kind = entry.kind;
        let amounts = entry.amounts;

        match self.entries.append(entry).map_err(store_error)? {
            AppendOutcome::Duplicate(existing_id) => {
                let existing = self
                    .entries
                    .get(existing_id)
                    .ok_or_else(|| LedgerError::storage_unavailable("duplicate index points at missing entry"))?;
                info!(account_id, entry_id = existing_id, %kind, "duplicate external ref, returning existing entry");
                return Ok(SubmitOutcome {
                    entry: existing,
                    duplicate: true,
                });
            }
            AppendOutcome::Inserted => {}
        }

        let delta = match kind.effect() {
            BalanceEffect::Credit | BalanceEffect::Signed => amounts,
            BalanceEffect::Debit => amounts.negate(),
            BalanceEffect::None => {
                // No balance effect: the record is the whole unit of work
                let committed = self
                    .entries
                    .finalize(entry_id, EntryStatus::Committed)
                    .map_err(store_error)?;
                return Ok(SubmitOutcome {
                    entry: committed,
                    duplicate: false,
                });
            }
        };

        let reason = kind.to_string();
        let mutation = tokio::time::timeout(
            self.storage_timeout,
            self.balances.mutate(account_id, delta, &reason),
        )
        .await
        .unwrap_or_else(|_elapsed| {
            Err(LedgerError::storage_unavailable("balance mutation timed out"))
        });

        match mutation {
            Ok(_) => {
                let committed = self
                    .entries
                    .finalize(entry_id, EntryStatus::Committed)
                    .map_err(store_error)?;
                info!(account_id, entry_id, %kind, "entry committed");
                Ok(SubmitOutcome {
                    entry: committed,
                    duplicate: false,
                })
            }
            Err(error) => {
                // The failed entry stays on record as an audit trail
                // of the attempt; it never counts toward balances.
                if let Err(finalize_error) = self.entries.finalize(entry_id, EntryStatus::Failed) {
                    warn!(entry_id, %finalize_error, "could not mark entry failed");
                }
                warn!(account_id, entry_id, %kind, %error, "entry failed");
                Err(error)
            }
        }
    }

    /// Paginated history for an account, `created_at` descending
    ///
    /// Pass the previous page's `next_cursor` to resume the scan.
    pub fn history(
        &self,
        account_id: AccountId,
        filter: &HistoryFilter,
        cursor: Option<HistoryCursor>,
        limit: usize,
    ) -> HistoryPage {
        let mut entries = self.entries.entries_for_account(account_id);
        entries.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));

        let entries: Vec<LedgerEntry> = entries
            .into_iter()
            .filter(|entry| {
                cursor.is_none_or(|c| (entry.created_at, entry.id) < (c.created_at, c.id))
            })
            .filter(|entry| filter.kind.is_none_or(|kind| entry.kind == kind))
            .filter(|entry| filter.status.is_none_or(|status| entry.status == status))
            .collect();

        let has_more = entries.len() > limit;
        let page: Vec<LedgerEntry> = entries.into_iter().take(limit).collect();
        let next_cursor = if has_more {
            page.last().map(|entry| HistoryCursor {
                created_at: entry.created_at,
                id: entry.id,
            })
        } else {
            None
        };

        HistoryPage {
            entries: page,
            next_cursor,
        }
    }

    /// All committed entries for an account, in insertion order
    pub fn committed_entries(&self, account_id: AccountId) -> Vec<LedgerEntry> {
        self.entries
            .entries_for_account(account_id)
            .into_iter()
            .filter(|entry| entry.status == EntryStatus::Committed)
            .collect()
    }

    /// Signed sum of all committed entries for an account
    ///
    /// This is the authoritative ledger-side total the balance
    /// invariant is defined against.
    pub fn committed_sum(&self, account_id: AccountId) -> Amounts {
        self.entries
            .entries_for_account(account_id)
            .iter()
            .filter(|entry| entry.status == EntryStatus::Committed)
            .fold(Amounts::ZERO, |acc, entry| {
                let signed = entry.signed_amounts();
                Amounts {
                    uni: acc.uni + signed.uni,
                    ton: acc.ton + signed.ton,
                }
            })
    }

    fn validate(&self, submission: &EntrySubmission) -> Result<(), LedgerError> {
        match submission.kind.effect() {
            BalanceEffect::Credit | BalanceEffect::Debit => {
                if submission.amounts.any_negative() {
                    return Err(LedgerError::validation(
                        submission.account_id,
                        format!("{} amounts must be non-negative", submission.kind),
                    ));
                }
                if submission.amounts.is_zero() {
                    return Err(LedgerError::validation(
                        submission.account_id,
                        format!("{} requires a non-zero amount", submission.kind),
                    ));
                }
            }
            BalanceEffect::Signed => {
                if submission.amounts.is_zero() {
                    return Err(LedgerError::validation(
                        submission.account_id,
                        "adjustment requires a non-zero amount",
                    ));
                }
            }
            BalanceEffect::None => {}
        }
        Ok(())
    }
}

fn store_error(error: EntryStoreError) -> LedgerError {
    LedgerError::storage_unavailable(error.to_string())
}
