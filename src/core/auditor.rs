//! Balance drift audit
//!
//! Periodically verifies the core invariant: for every account and
//! currency, the stored balance equals the signed sum of committed
//! ledger entries. Drift is the single most important defect class in
//! this system; it is reported loudly and never auto-corrected. A
//! repair requires an explicit `AdjustmentManual` entry decided by an
//! operator.

use crate::core::ledger::TransactionLedger;
use crate::storage::AccountStore;
use crate::types::{AccountId, Currency, LedgerError};
use std::sync::Arc;
use tracing::error;

/// One detected divergence between a balance and its ledger total
#[derive(Debug, Clone, PartialEq)]
pub struct DriftReport {
    pub account_id: AccountId,
    pub currency: Currency,
    pub balance: rust_decimal::Decimal,
    pub ledger_sum: rust_decimal::Decimal,
}

/// Read-only invariant checker
pub struct BalanceAuditor {
    accounts: Arc<AccountStore>,
    ledger: Arc<TransactionLedger>,
}

impl BalanceAuditor {
    pub fn new(accounts: Arc<AccountStore>, ledger: Arc<TransactionLedger>) -> Self {
        BalanceAuditor { accounts, ledger }
    }

    /// Check one account against its committed ledger total
    ///
    /// # Errors
    ///
    /// [`LedgerError::ReconciliationDrift`] for the first diverging
    /// currency found.
    pub fn audit_account(&self, account_id: AccountId) -> Result<(), LedgerError> {
        let account = self
            .accounts
            .get(account_id)
            .ok_or_else(|| LedgerError::account_not_found(account_id))?;
        let ledger_sum = self.ledger.committed_sum(account_id);

        for currency in Currency::ALL {
            let balance = account.balances.get(currency);
            let expected = ledger_sum.get(currency);
            if balance != expected {
                error!(
                    account_id,
                    currency = %currency,
                    %balance,
                    ledger_sum = %expected,
                    "reconciliation drift detected"
                );
                return Err(LedgerError::ReconciliationDrift {
                    account_id,
                    currency: currency.to_string(),
                    balance,
                    ledger_sum: expected,
                });
            }
        }
        Ok(())
    }

    /// Sweep every account, collecting all divergences
    ///
    /// An empty result means the invariant holds system-wide.
    pub fn audit_all(&self) -> Vec<DriftReport> {
        let mut drifts = Vec::new();
        for account in self.accounts.all_accounts() {
            let ledger_sum = self.ledger.committed_sum(account.id);
            for currency in Currency::ALL {
                let balance = account.balances.get(currency);
                let expected = ledger_sum.get(currency);
                if balance != expected {
                    error!(
                        account_id = account.id,
                        currency = %currency,
                        %balance,
                        ledger_sum = %expected,
                        "reconciliation drift detected"
                    );
                    drifts.push(DriftReport {
                        account_id: account.id,
                        currency,
                        balance,
                        ledger_sum: expected,
                    });
                }
            }
        }
        drifts
    }
}
