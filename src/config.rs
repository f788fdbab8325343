//! Engine configuration
//!
//! All tunables in one place, with production defaults matching the
//! documented contracts: 5-minute balance cache TTL, 5-minute accrual
//! cadence, bounded CAS retries with exponential backoff, and a
//! 7-day partition horizon.

use rust_decimal::Decimal;
use std::time::Duration;

/// Tunable parameters for the ledger core
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How long a cached balance read stays valid for display
    pub balance_cache_ttl: Duration,

    /// Maximum compare-and-swap attempts before reporting contention
    pub max_cas_attempts: u32,

    /// Base delay for exponential backoff between CAS retries
    ///
    /// Attempt `n` waits `backoff_base * 2^n`.
    pub backoff_base: Duration,

    /// Upper bound on any single storage-facing operation
    pub storage_timeout: Duration,

    /// Interval between accrual scheduler runs
    pub accrual_interval: Duration,

    /// Concurrent position workers per accrual run
    pub accrual_workers: usize,

    /// Daily yield fraction for positions without a boost plan
    pub base_daily_rate: Decimal,

    /// How many days of ledger segments to keep pre-created
    pub partition_days_ahead: u32,

    /// Interval between partition maintenance runs
    pub partition_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            balance_cache_ttl: Duration::from_secs(5 * 60),
            max_cas_attempts: 5,
            backoff_base: Duration::from_millis(20),
            storage_timeout: Duration::from_secs(5),
            accrual_interval: Duration::from_secs(5 * 60),
            accrual_workers: num_cpus::get(),
            base_daily_rate: Decimal::new(1, 2), // 1% per day
            partition_days_ahead: 7,
            partition_interval: Duration::from_secs(24 * 60 * 60),
        }
    }
}

impl EngineConfig {
    /// Clamp degenerate values back to safe defaults
    ///
    /// Zero workers or zero retry attempts would wedge the engine, so
    /// they fall back rather than error.
    pub fn sanitized(mut self) -> Self {
        let defaults = EngineConfig::default();
        if self.accrual_workers == 0 {
            self.accrual_workers = defaults.accrual_workers;
        }
        if self.max_cas_attempts == 0 {
            self.max_cas_attempts = defaults.max_cas_attempts;
        }
        self
    }
}
