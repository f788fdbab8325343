//! Reward Ledger Engine Library
//! # Overview
//!
//! This library provides a concurrent balance ledger and accrual engine
//! for a two-currency reward economy (UNI and TON).
//!
//! # Architecture
//!
//! The system is organized into several key components:
//!
//! - [`types`] - Core data types (Account, LedgerEntry, Plan, etc.)
//! - [`config`] - Engine tunables with production defaults
//! - [`cli`] - CLI argument parsing
//! - [`storage`] - In-memory stores:
//!   - [`storage::account_store`] - Versioned account records and farming positions
//!   - [`storage::entry_store`] - Ledger entries, reference dedup, daily segments
//! - [`core`] - Business logic components:
//!   - [`core::balance_manager`] - Cached reads and compare-and-swap balance mutation
//!   - [`core::ledger`] - Entry submission, finalization, and history
//!   - [`core::scheduler`] - Periodic farming yield accrual
//!   - [`core::reconciler`] - Principal recomputation from deposit history
//!   - [`core::partition`] - Forward-looking ledger segment maintenance
//!   - [`core::auditor`] - Balance-vs-ledger drift detection
//!   - [`core::engine`] - The assembled facade
//! - [`io`] - CSV intake and balance snapshot output
//!
//! # Entry Kinds
//!
//! Every balance movement is a ledger entry of a closed set of kinds:
//!
//! - **DepositExternal**: Externally confirmed deposit (credits balance
//!   and counts toward farming principal; deduplicated by reference)
//! - **PurchaseDebit**: Boost plan purchase at the exact plan price
//! - **FarmingYield** / **ReferralYield**: Accrued rewards
//! - **MissionReward**: One-off mission payout
//! - **AdjustmentManual**: Signed operator correction
//! - **Void**: Recorded but balance-neutral
//!
//! # Invariant
//!
//! For every account and currency, the stored balance equals the signed
//! sum of committed ledger entries. Everything in this crate exists to
//! keep that statement true under concurrency.

// Module declarations
pub mod cli;
pub mod config;
pub mod core;
pub mod io;
pub mod storage;
pub mod types;

pub use config::EngineConfig;
pub use core::{
    AccrualScheduler, AccrualSummary, BalanceAuditor, BalanceManager, DepositReconciler,
    PartitionManager, RewardEngine, TransactionLedger,
};
pub use io::write_balances_csv;
pub use types::{
    Account, AccountId, Amounts, Currency, EntryKind, EntryStatus, EntrySubmission, LedgerEntry,
    LedgerError, Plan, PlanCatalog,
};
