//! Account-related types for the reward ledger engine
//!
//! This module defines the Account structure holding a participant's
//! dual-currency balances, plus the version field used for optimistic
//! concurrency control in the account store.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Participant identifier
pub type AccountId = u64;

/// The two currencies of the reward economy
///
/// Every balance-affecting amount is denominated in exactly one of
/// these. Farming positions are tracked per currency, so `Currency`
/// doubles as the position track identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Currency {
    /// In-app reward token
    Uni,
    /// Externally deposited token
    Ton,
}

impl Currency {
    /// All currencies, in a fixed order (useful for audits and iteration)
    pub const ALL: [Currency; 2] = [Currency::Uni, Currency::Ton];
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Currency::Uni => write!(f, "uni"),
            Currency::Ton => write!(f, "ton"),
        }
    }
}

/// A pair of per-currency amounts
///
/// Used both for absolute balances and for signed deltas. Helper
/// methods keep currency-indexed access in one place instead of
/// scattering `match` arms across the codebase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Amounts {
    pub uni: Decimal,
    pub ton: Decimal,
}

impl Amounts {
    pub const ZERO: Amounts = Amounts {
        uni: Decimal::ZERO,
        ton: Decimal::ZERO,
    };

    /// Build an amount pair holding `value` in `currency` and zero in the other
    pub fn in_currency(currency: Currency, value: Decimal) -> Self {
        match currency {
            Currency::Uni => Amounts {
                uni: value,
                ton: Decimal::ZERO,
            },
            Currency::Ton => Amounts {
                uni: Decimal::ZERO,
                ton: value,
            },
        }
    }

    /// Amount held in the given currency
    pub fn get(&self, currency: Currency) -> Decimal {
        match currency {
            Currency::Uni => self.uni,
            Currency::Ton => self.ton,
        }
    }

    /// True if both components are zero
    pub fn is_zero(&self) -> bool {
        self.uni.is_zero() && self.ton.is_zero()
    }

    /// True if either component is negative
    pub fn any_negative(&self) -> bool {
        self.uni.is_sign_negative() && !self.uni.is_zero()
            || self.ton.is_sign_negative() && !self.ton.is_zero()
    }

    /// Component-wise negation
    pub fn negate(&self) -> Amounts {
        Amounts {
            uni: -self.uni,
            ton: -self.ton,
        }
    }

    /// Component-wise checked addition
    ///
    /// Returns `None` if either component overflows.
    pub fn checked_add(&self, other: &Amounts) -> Option<Amounts> {
        Some(Amounts {
            uni: self.uni.checked_add(other.uni)?,
            ton: self.ton.checked_add(other.ton)?,
        })
    }
}

/// Participant account state
///
/// One record per participant. Balances are non-negative fixed-point
/// decimals; `updated_at` strictly advances and `version` increments
/// on every successful mutation. Accounts are created on first
/// registration and never deleted.
#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    /// The participant ID
    pub id: AccountId,

    /// Current balances, one per currency
    ///
    /// Invariant: equal to the signed sum of all committed ledger
    /// entries for this account. Only the balance manager may change
    /// these.
    pub balances: Amounts,

    /// Timestamp of the last successful mutation
    pub updated_at: DateTime<Utc>,

    /// Monotonically increasing version for compare-and-swap writes
    ///
    /// Incremented by the store on every successful write; writers
    /// presenting a stale version get a conflict and must retry.
    pub version: u64,
}

impl Account {
    /// Create a new account with zero balances at version 0
    pub fn new(id: AccountId) -> Self {
        Account {
            id,
            balances: Amounts::ZERO,
            updated_at: Utc::now(),
            version: 0,
        }
    }
}
