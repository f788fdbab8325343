//! Storage module
//!
//! Concurrent in-memory record stores behind narrow write contracts:
//! - `account_store`: versioned accounts and farming positions,
//!   mutated only through compare-and-swap
//! - `entry_store`: append-only, date-partitioned ledger entries with
//!   the external-ref uniqueness index

pub mod account_store;
pub mod entry_store;

pub use account_store::{AccountStore, CasError};
pub use entry_store::{
    AppendOutcome, EntryStore, EntryStoreError, PartitionLogRecord, PartitionOpStatus, Segment,
};
