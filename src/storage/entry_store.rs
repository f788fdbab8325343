//! Append-only ledger entry storage with date partitions
//!
//! Entries are stored in daily date-range segments so the log scales
//! to high volume; segments are created ahead of time by the
//! partition manager. The store also owns the unique
//! `(account, external_ref)` index backing deposit idempotency, and
//! an operation log recording every segment-maintenance attempt.
//!
//! # Duplicate handling
//!
//! Appending an entry whose `(account, external_ref)` pair is already
//! claimed returns the existing entry's ID instead of inserting; the
//! claim and the insert happen under one index entry lock, so two
//! racing submitters can never both insert.

use crate::types::{AccountId, EntryId, EntryStatus, LedgerEntry};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, RwLock};
use thiserror::Error;

/// Failures raised by the entry store
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EntryStoreError {
    /// No segment covers the entry's creation date
    #[error("No ledger segment covers {date}")]
    NoSegment { date: NaiveDate },

    /// The entry does not exist
    #[error("Ledger entry {entry_id} not found")]
    EntryNotFound { entry_id: EntryId },

    /// Status may only move forward out of `Pending`
    #[error("Ledger entry {entry_id} already finalized")]
    AlreadyFinalized { entry_id: EntryId },
}

/// Result of appending an entry
#[derive(Debug, Clone, PartialEq)]
pub enum AppendOutcome {
    /// The entry was inserted
    Inserted,
    /// The external ref was already claimed by this entry
    Duplicate(EntryId),
}

/// A date-bounded physical segment of the ledger
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub name: String,
    /// Inclusive start date
    pub start: NaiveDate,
    /// Exclusive end date
    pub end: NaiveDate,
}

/// Outcome recorded for a partition maintenance operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionOpStatus {
    Success,
    Skipped,
    Error,
}

/// Audit record for one partition maintenance attempt
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionLogRecord {
    pub operation: String,
    pub segment_name: String,
    pub status: PartitionOpStatus,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Append-only, partitioned ledger entry store
#[derive(Debug, Default)]
pub struct EntryStore {
    entries: DashMap<EntryId, LedgerEntry>,
    by_account: DashMap<AccountId, Vec<EntryId>>,
    external_refs: DashMap<(AccountId, String), EntryId>,
    segments: RwLock<BTreeMap<NaiveDate, Segment>>,
    partition_log: Mutex<Vec<PartitionLogRecord>>,
    next_id: AtomicU64,
}

impl EntryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next entry ID
    ///
    /// IDs are unique and increasing but not necessarily dense: an ID
    /// allocated for a submission that turns out to be a duplicate is
    /// simply discarded.
    pub fn allocate_id(&self) -> EntryId {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Append an entry, enforcing external-ref uniqueness
    ///
    /// # Errors
    ///
    /// [`EntryStoreError::NoSegment`] if no segment covers the
    /// entry's creation date; nothing is written in that case.
    pub fn append(&self, entry: LedgerEntry) -> Result<AppendOutcome, EntryStoreError> {
        let date = entry.created_at.date_naive();
        if !self.covers(date) {
            return Err(EntryStoreError::NoSegment { date });
        }

        match &entry.external_ref {
            Some(external_ref) => {
                let key = (entry.account_id, external_ref.clone());
                // Hold the index entry lock across the insert so a
                // racing submitter observes a fully written entry.
                match self.external_refs.entry(key) {
                    Entry::Occupied(existing) => Ok(AppendOutcome::Duplicate(*existing.get())),
                    Entry::Vacant(slot) => {
                        let id = entry.id;
                        self.insert_unchecked(entry);
                        slot.insert(id);
                        Ok(AppendOutcome::Inserted)
                    }
                }
            }
            None => {
                self.insert_unchecked(entry);
                Ok(AppendOutcome::Inserted)
            }
        }
    }

    fn insert_unchecked(&self, entry: LedgerEntry) {
        self.by_account
            .entry(entry.account_id)
            .or_default()
            .push(entry.id);
        self.entries.insert(entry.id, entry);
    }

    /// Fetch an entry snapshot
    pub fn get(&self, entry_id: EntryId) -> Option<LedgerEntry> {
        self.entries.get(&entry_id).map(|entry| entry.clone())
    }

    /// Finalize a pending entry
    ///
    /// The status transition is the only permitted update to a stored
    /// entry, and only out of `Pending`. Failing an entry releases its
    /// external-ref claim, so the same reference can be resubmitted;
    /// the committed claim stays held forever.
    pub fn finalize(
        &self,
        entry_id: EntryId,
        status: EntryStatus,
    ) -> Result<LedgerEntry, EntryStoreError> {
        let snapshot = {
            let mut entry = self
                .entries
                .get_mut(&entry_id)
                .ok_or(EntryStoreError::EntryNotFound { entry_id })?;
            if entry.status != EntryStatus::Pending {
                return Err(EntryStoreError::AlreadyFinalized { entry_id });
            }
            entry.status = status;
            entry.clone()
        };

        // Entry guard dropped above: append locks the ref index before
        // the entry map, so holding both here in the reverse order
        // could deadlock.
        if status == EntryStatus::Failed {
            if let Some(external_ref) = &snapshot.external_ref {
                self.external_refs.remove_if(
                    &(snapshot.account_id, external_ref.clone()),
                    |_, claimed| *claimed == entry_id,
                );
            }
        }
        Ok(snapshot)
    }

    /// All entries for an account, in insertion order
    pub fn entries_for_account(&self, account_id: AccountId) -> Vec<LedgerEntry> {
        let Some(ids) = self.by_account.get(&account_id) else {
            return Vec::new();
        };
        ids.iter()
            .filter_map(|id| self.entries.get(id).map(|entry| entry.clone()))
            .collect()
    }

    /// Whether a segment covers the given date
    pub fn covers(&self, date: NaiveDate) -> bool {
        let segments = self.segments.read().expect("segment map lock poisoned");
        segments
            .range(..=date)
            .next_back()
            .is_some_and(|(_, segment)| date >= segment.start && date < segment.end)
    }

    /// Create the one-day segment starting at `date` if absent
    ///
    /// Idempotent: an existing segment is reported as skipped, never
    /// recreated. Every attempt is recorded in the operation log.
    pub fn create_segment(&self, date: NaiveDate) -> Result<Segment, EntryStoreError> {
        let name = format!("ledger_entries_{}", date.format("%Y_%m_%d"));
        let created = {
            let mut segments = self.segments.write().expect("segment map lock poisoned");
            if segments.contains_key(&date) {
                None
            } else {
                let segment = Segment {
                    name: name.clone(),
                    start: date,
                    end: date + Duration::days(1),
                };
                segments.insert(date, segment.clone());
                Some(segment)
            }
        };

        match created {
            Some(segment) => {
                self.log_partition_op("create_segment", &name, PartitionOpStatus::Success, None);
                Ok(segment)
            }
            None => {
                self.log_partition_op(
                    "create_segment",
                    &name,
                    PartitionOpStatus::Skipped,
                    Some("segment already exists"),
                );
                let segments = self.segments.read().expect("segment map lock poisoned");
                Ok(segments[&date].clone())
            }
        }
    }

    /// Whether the segment starting at `date` already exists
    pub fn segment_exists(&self, date: NaiveDate) -> bool {
        self.segments
            .read()
            .expect("segment map lock poisoned")
            .contains_key(&date)
    }

    /// Append a record to the partition operation log
    pub fn log_partition_op(
        &self,
        operation: &str,
        segment_name: &str,
        status: PartitionOpStatus,
        error: Option<&str>,
    ) {
        let record = PartitionLogRecord {
            operation: operation.to_string(),
            segment_name: segment_name.to_string(),
            status,
            error: error.map(str::to_string),
            created_at: Utc::now(),
        };
        self.partition_log
            .lock()
            .expect("partition log lock poisoned")
            .push(record);
    }

    /// Snapshot of the partition operation log
    pub fn partition_log(&self) -> Vec<PartitionLogRecord> {
        self.partition_log
            .lock()
            .expect("partition log lock poisoned")
            .clone()
    }

    /// Names of all existing segments, ordered by start date
    pub fn segment_names(&self) -> Vec<String> {
        self.segments
            .read()
            .expect("segment map lock poisoned")
            .values()
            .map(|segment| segment.name.clone())
            .collect()
    }
}
