//! Ledger entry types
//!
//! This module defines the append-only ledger entry record, the closed
//! set of entry kinds, and the explicit kind-to-balance-effect table
//! that decides whether an entry triggers a balance mutation.
//!
//! The effect table is deliberately exhaustive: there is no "does this
//! kind look like income" heuristic anywhere. Adding a kind without
//! deciding its effect is a compile error.

use super::account::{AccountId, Amounts};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Ledger entry identifier, unique across all partitions
pub type EntryId = u64;

/// The closed set of balance-affecting event kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// Externally reported deposit (carries an external reference)
    DepositExternal,
    /// Boost plan purchase, always for the exact plan price
    PurchaseDebit,
    /// Scheduled farming yield
    FarmingYield,
    /// Referral program yield
    ReferralYield,
    /// One-off mission reward
    MissionReward,
    /// Operator adjustment, signed in either direction
    AdjustmentManual,
    /// Audit marker with no balance effect
    Void,
}

/// How an entry kind affects account balances
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceEffect {
    /// Amounts are credited as given (amounts must be non-negative)
    Credit,
    /// Amounts are debited as given (amounts must be non-negative)
    Debit,
    /// Amounts are applied with their own sign
    Signed,
    /// No balance mutation
    None,
}

impl EntryKind {
    /// The balance effect of this kind
    ///
    /// This table is the single source of truth for which entries
    /// invoke the balance manager.
    pub fn effect(&self) -> BalanceEffect {
        match self {
            EntryKind::DepositExternal => BalanceEffect::Credit,
            EntryKind::PurchaseDebit => BalanceEffect::Debit,
            EntryKind::FarmingYield => BalanceEffect::Credit,
            EntryKind::ReferralYield => BalanceEffect::Credit,
            EntryKind::MissionReward => BalanceEffect::Credit,
            EntryKind::AdjustmentManual => BalanceEffect::Signed,
            EntryKind::Void => BalanceEffect::None,
        }
    }

    /// Whether committed entries of this kind contribute to a
    /// position's farming principal
    ///
    /// Only external deposits do; yield kinds are rewards, not
    /// principal, and must never be folded back into a position.
    pub fn credits_principal(&self) -> bool {
        matches!(self, EntryKind::DepositExternal)
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntryKind::DepositExternal => "deposit_external",
            EntryKind::PurchaseDebit => "purchase_debit",
            EntryKind::FarmingYield => "farming_yield",
            EntryKind::ReferralYield => "referral_yield",
            EntryKind::MissionReward => "mission_reward",
            EntryKind::AdjustmentManual => "adjustment_manual",
            EntryKind::Void => "void",
        };
        write!(f, "{}", name)
    }
}

/// Lifecycle status of a ledger entry
///
/// `status` is the only mutable field of an entry, and it only moves
/// forward: `Pending` to exactly one of `Committed` or `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    /// Inserted, balance mutation not yet applied
    Pending,
    /// Balance mutation applied; counts toward the balance invariant
    Committed,
    /// Mutation rejected or errored; kept as an audit trail only
    Failed,
}

/// Free-form entry annotations (position IDs, plan IDs, operator notes)
pub type EntryMetadata = BTreeMap<String, String>;

/// An immutable, append-only record of a balance-affecting event
///
/// Created by the transaction ledger only. After insertion, every
/// field except `status` is frozen; entries are never deleted (they
/// may move across date partitions).
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerEntry {
    pub id: EntryId,
    pub account_id: AccountId,
    pub kind: EntryKind,

    /// Per-currency magnitudes; signed only for `AdjustmentManual`
    pub amounts: Amounts,

    /// External transaction identifier, when the event originated
    /// outside the system
    ///
    /// `(account_id, external_ref)` is unique when present; this is
    /// the idempotency guarantee against duplicate deposit reports.
    pub external_ref: Option<String>,

    pub status: EntryStatus,
    pub metadata: EntryMetadata,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// The signed balance delta this entry represents when committed
    ///
    /// Derived purely from the kind table: credits are positive,
    /// debits negative, signed kinds pass through, no-effect kinds
    /// contribute zero.
    pub fn signed_amounts(&self) -> Amounts {
        match self.kind.effect() {
            BalanceEffect::Credit => self.amounts,
            BalanceEffect::Debit => self.amounts.negate(),
            BalanceEffect::Signed => self.amounts,
            BalanceEffect::None => Amounts::ZERO,
        }
    }
}

/// A submission handed to the transaction ledger
///
/// The ledger validates the submission against the kind table before
/// any write happens.
#[derive(Debug, Clone)]
pub struct EntrySubmission {
    pub account_id: AccountId,
    pub kind: EntryKind,
    pub amounts: Amounts,
    pub external_ref: Option<String>,
    pub metadata: EntryMetadata,
}

impl EntrySubmission {
    pub fn new(account_id: AccountId, kind: EntryKind, amounts: Amounts) -> Self {
        EntrySubmission {
            account_id,
            kind,
            amounts,
            external_ref: None,
            metadata: EntryMetadata::new(),
        }
    }

    /// Attach an external reference for idempotent resubmission
    pub fn with_external_ref(mut self, external_ref: impl Into<String>) -> Self {
        self.external_ref = Some(external_ref.into());
        self
    }

    /// Attach a metadata key-value pair
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}
