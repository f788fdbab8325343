//! Types module
//!
//! Contains core data structures used throughout the engine:
//! - `account`: participant accounts, currencies, and amount pairs
//! - `entry`: ledger entries, the closed kind table, and submissions
//! - `position`: farming positions and their status projection
//! - `plan`: the static boost plan catalog
//! - `error`: the engine error taxonomy

pub mod account;
pub mod entry;
pub mod error;
pub mod plan;
pub mod position;

pub use account::{Account, AccountId, Amounts, Currency};
pub use entry::{
    BalanceEffect, EntryId, EntryKind, EntryMetadata, EntryStatus, EntrySubmission, LedgerEntry,
};
pub use error::LedgerError;
pub use plan::{Plan, PlanCatalog, PlanId};
pub use position::{FarmingPosition, PositionStatus};
