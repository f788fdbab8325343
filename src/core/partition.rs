//! Forward-looking ledger segment maintenance
//!
//! Keeps a horizon of daily date-range segments pre-created so entry
//! inserts never race segment creation under load. Pure
//! infrastructure: no business invariants live here. Each segment is
//! handled independently; one failure never blocks the rest, and
//! every attempt lands in the partition operation log.

use crate::config::EngineConfig;
use crate::storage::EntryStore;
use chrono::{Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Outcome tally of one maintenance pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnsureReport {
    pub created: usize,
    pub skipped: usize,
    pub errors: usize,
}

/// Maintains the forward window of daily ledger segments
pub struct PartitionManager {
    entries: Arc<EntryStore>,
    days_ahead: u32,
    interval: Duration,
}

impl PartitionManager {
    pub fn new(entries: Arc<EntryStore>, config: &EngineConfig) -> Self {
        PartitionManager {
            entries,
            days_ahead: config.partition_days_ahead,
            interval: config.partition_interval,
        }
    }

    /// Create any missing segments for `[today, today + days_ahead]`
    ///
    /// Idempotent: existing segments are counted as skipped. Every
    /// attempt is recorded in the operation log regardless of outcome.
    pub fn ensure_segments(&self, days_ahead: u32) -> EnsureReport {
        let today = Utc::now().date_naive();
        let mut report = EnsureReport::default();

        for offset in 0..=days_ahead {
            let date = today + ChronoDuration::days(i64::from(offset));
            if self.entries.segment_exists(date) {
                // create_segment would also skip, but short-circuiting
                // here keeps the skip out of the write lock
                self.entries.log_partition_op(
                    "create_segment",
                    &format!("ledger_entries_{}", date.format("%Y_%m_%d")),
                    crate::storage::PartitionOpStatus::Skipped,
                    Some("segment already exists"),
                );
                report.skipped += 1;
                continue;
            }
            match self.entries.create_segment(date) {
                Ok(segment) => {
                    info!(segment = %segment.name, "ledger segment created");
                    report.created += 1;
                }
                Err(create_error) => {
                    error!(%date, %create_error, "segment creation failed");
                    self.entries.log_partition_op(
                        "create_segment",
                        &format!("ledger_entries_{}", date.format("%Y_%m_%d")),
                        crate::storage::PartitionOpStatus::Error,
                        Some(&create_error.to_string()),
                    );
                    report.errors += 1;
                }
            }
        }

        report
    }

    /// Daily maintenance loop until cancelled
    pub async fn run(&self, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        info!(days_ahead = self.days_ahead, "partition manager started");
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.ensure_segments(self.days_ahead);
                }
                _ = shutdown.cancelled() => {
                    info!("partition manager stopped");
                    return;
                }
            }
        }
    }
}
