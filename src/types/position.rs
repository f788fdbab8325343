//! Farming position types
//!
//! A farming position is the per-account, per-currency record of
//! accruing principal. Positions are denormalized state: the
//! authoritative source of principal is committed deposit history,
//! and the deposit reconciler is the only component allowed to
//! recompute it.

use super::account::{AccountId, Currency};
use super::plan::PlanId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// A per-account, per-currency accruing principal
///
/// Invariants:
/// - `rate_per_second >= 0`
/// - yield between two points in time equals
///   `(now - last_accrual_at).seconds * rate_per_second`, never
///   negative and never recomputed retroactively once emitted.
///
/// Positions are deactivated, never deleted, when the underlying plan
/// expires or the participant exits.
#[derive(Debug, Clone, PartialEq)]
pub struct FarmingPosition {
    pub account_id: AccountId,

    /// The currency track this position accrues in
    pub track: Currency,

    /// Cumulative deposited amount, derived from committed deposit
    /// entries by the reconciler
    pub principal: Decimal,

    /// Absolute yield per elapsed second
    pub rate_per_second: Decimal,

    /// High-water mark of emitted yield
    ///
    /// Advanced only after the yield entry for the elapsed window has
    /// been committed; a failed emission leaves it unchanged so the
    /// window is retried on the next scheduler pass.
    pub last_accrual_at: DateTime<Utc>,

    pub is_active: bool,

    /// The boost plan backing this position, if any
    pub plan_id: Option<PlanId>,
}

impl FarmingPosition {
    /// Create an inactive position with no principal
    pub fn new(account_id: AccountId, track: Currency) -> Self {
        FarmingPosition {
            account_id,
            track,
            principal: Decimal::ZERO,
            rate_per_second: Decimal::ZERO,
            last_accrual_at: Utc::now(),
            is_active: false,
            plan_id: None,
        }
    }

    /// Yield accrued between `last_accrual_at` and `now`
    ///
    /// Returns zero when no whole second has elapsed or when the
    /// clock appears to have moved backwards; accrual is never
    /// negative.
    pub fn yield_between(&self, now: DateTime<Utc>) -> Decimal {
        let elapsed_secs = (now - self.last_accrual_at).num_seconds();
        if elapsed_secs <= 0 {
            return Decimal::ZERO;
        }
        Decimal::from(elapsed_secs) * self.rate_per_second
    }
}

/// Read-only projection of a position for collaborator egress
#[derive(Debug, Clone, PartialEq)]
pub struct PositionStatus {
    pub track: Currency,
    pub principal: Decimal,
    pub rate_per_second: Decimal,
    pub last_accrual_at: DateTime<Utc>,
    pub is_active: bool,
    pub plan_id: Option<PlanId>,
}

impl From<&FarmingPosition> for PositionStatus {
    fn from(position: &FarmingPosition) -> Self {
        PositionStatus {
            track: position.track,
            principal: position.principal,
            rate_per_second: position.rate_per_second,
            last_accrual_at: position.last_accrual_at,
            is_active: position.is_active,
            plan_id: position.plan_id,
        }
    }
}
