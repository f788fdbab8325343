//! Engine core: balance authority, ledger, and background maintenance

pub mod auditor;
pub mod balance_manager;
pub mod engine;
pub mod ledger;
pub mod partition;
pub mod reconciler;
pub mod scheduler;

pub use auditor::{BalanceAuditor, DriftReport};
pub use balance_manager::BalanceManager;
pub use engine::{PurchaseReceipt, RewardEngine};
pub use ledger::{HistoryCursor, HistoryFilter, HistoryPage, SubmitOutcome, TransactionLedger};
pub use partition::{EnsureReport, PartitionManager};
pub use reconciler::DepositReconciler;
pub use scheduler::{AccrualScheduler, AccrualSummary};
