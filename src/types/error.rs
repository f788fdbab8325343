//! Error types for the reward ledger engine
//!
//! All failures surface as typed `LedgerError` values; nothing in the
//! core is fatal to the process. Every variant is either retryable
//! (`Contention`, `StorageUnavailable`), terminal for the one request
//! (`Validation`, `InsufficientFunds`, `NotFound`), or an audit alarm
//! that demands an explicit compensating entry (`ReconciliationDrift`).

use super::account::AccountId;
use rust_decimal::Decimal;
use thiserror::Error;

/// Main error type for the ledger core
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    /// Malformed submission, rejected before any write
    #[error("Validation failed for account {account_id}: {message}")]
    Validation {
        account_id: AccountId,
        message: String,
    },

    /// A debit would drive a balance negative; no side effects applied
    #[error(
        "Insufficient funds for account {account_id}: {currency} balance {available}, requested {requested}"
    )]
    InsufficientFunds {
        account_id: AccountId,
        currency: String,
        available: Decimal,
        requested: Decimal,
    },

    /// Compare-and-swap retries exhausted; safe to resubmit
    #[error("Contention on account {account_id}: gave up after {attempts} attempts")]
    Contention { account_id: AccountId, attempts: u32 },

    /// Storage I/O failed or timed out
    ///
    /// A timed-out mutation is treated as this failure, never as an
    /// ambiguous success.
    #[error("Storage unavailable: {message}")]
    StorageUnavailable { message: String },

    /// Account or position does not exist
    #[error("Account {account_id} not found")]
    AccountNotFound { account_id: AccountId },

    /// Referenced plan does not exist in the catalog
    #[error("Unknown plan {plan_id}")]
    UnknownPlan { plan_id: u32 },

    /// Audit found a balance diverging from the sum of committed entries
    ///
    /// Must be raised loudly and never silently auto-corrected.
    #[error(
        "Reconciliation drift on account {account_id} ({currency}): balance {balance} != ledger sum {ledger_sum}"
    )]
    ReconciliationDrift {
        account_id: AccountId,
        currency: String,
        balance: Decimal,
        ledger_sum: Decimal,
    },

    /// Balance arithmetic would overflow; the mutation is rejected
    #[error("Arithmetic overflow in {operation} for account {account_id}")]
    ArithmeticOverflow {
        account_id: AccountId,
        operation: String,
    },
}

impl LedgerError {
    pub fn validation(account_id: AccountId, message: impl Into<String>) -> Self {
        LedgerError::Validation {
            account_id,
            message: message.into(),
        }
    }

    pub fn insufficient_funds(
        account_id: AccountId,
        currency: impl Into<String>,
        available: Decimal,
        requested: Decimal,
    ) -> Self {
        LedgerError::InsufficientFunds {
            account_id,
            currency: currency.into(),
            available,
            requested,
        }
    }

    pub fn contention(account_id: AccountId, attempts: u32) -> Self {
        LedgerError::Contention {
            account_id,
            attempts,
        }
    }

    pub fn storage_unavailable(message: impl Into<String>) -> Self {
        LedgerError::StorageUnavailable {
            message: message.into(),
        }
    }

    pub fn account_not_found(account_id: AccountId) -> Self {
        LedgerError::AccountNotFound { account_id }
    }

    pub fn arithmetic_overflow(account_id: AccountId, operation: impl Into<String>) -> Self {
        LedgerError::ArithmeticOverflow {
            account_id,
            operation: operation.into(),
        }
    }

    /// True when resubmitting the same request may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LedgerError::Contention { .. } | LedgerError::StorageUnavailable { .. }
        )
    }
}

impl From<std::io::Error> for LedgerError {
    fn from(error: std::io::Error) -> Self {
        LedgerError::StorageUnavailable {
            message: error.to_string(),
        }
    }
}

impl From<csv::Error> for LedgerError {
    fn from(error: csv::Error) -> Self {
        LedgerError::StorageUnavailable {
            message: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::validation(
        LedgerError::validation(3, "negative amount"),
        "Validation failed for account 3: negative amount"
    )]
    #[case::insufficient(
        LedgerError::insufficient_funds(1, "ton", Decimal::new(5, 1), Decimal::ONE),
        "Insufficient funds for account 1: ton balance 0.5, requested 1"
    )]
    #[case::contention(
        LedgerError::contention(9, 5),
        "Contention on account 9: gave up after 5 attempts"
    )]
    #[case::not_found(
        LedgerError::account_not_found(42),
        "Account 42 not found"
    )]
    #[case::unknown_plan(
        LedgerError::UnknownPlan { plan_id: 6 },
        "Unknown plan 6"
    )]
    fn test_error_display(#[case] error: LedgerError, #[case] expected: &str) {
        assert_eq!(error.to_string(), expected);
    }

    #[rstest]
    #[case::contention(LedgerError::contention(1, 5), true)]
    #[case::storage(LedgerError::storage_unavailable("timeout"), true)]
    #[case::validation(LedgerError::validation(1, "bad"), false)]
    #[case::insufficient(
        LedgerError::insufficient_funds(1, "ton", Decimal::ZERO, Decimal::ONE),
        false
    )]
    fn test_retryability(#[case] error: LedgerError, #[case] retryable: bool) {
        assert_eq!(error.is_retryable(), retryable);
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::TimedOut, "deadline exceeded");
        let error: LedgerError = io_error.into();
        assert!(matches!(error, LedgerError::StorageUnavailable { .. }));
        assert_eq!(error.to_string(), "Storage unavailable: deadline exceeded");
    }
}
