use crate::config::EngineConfig;
use clap::Parser;
use std::path::PathBuf;

/// Replay reward operations and report final balances
#[derive(Parser, Debug)]
#[command(name = "reward-ledger-engine")]
#[command(about = "Replay reward operations and report final balances", long_about = None)]
pub struct CliArgs {
    /// Input CSV file path containing operation records
    #[arg(value_name = "INPUT", help = "Path to the input CSV file")]
    pub input_file: PathBuf,

    /// Number of operations read per batch
    #[arg(
        long = "batch-size",
        value_name = "SIZE",
        default_value_t = 1000,
        help = "Number of operations read per batch"
    )]
    pub batch_size: usize,

    /// Accrual passes to run after the replay finishes
    #[arg(
        long = "accrual-ticks",
        value_name = "COUNT",
        default_value_t = 1,
        help = "Accrual passes to run after the replay finishes"
    )]
    pub accrual_ticks: u32,

    /// Number of concurrent position workers per accrual pass
    #[arg(
        long = "workers",
        value_name = "COUNT",
        help = "Concurrent position workers per accrual pass (default: CPU cores)"
    )]
    pub workers: Option<usize>,

    /// Days of ledger segments to pre-create
    #[arg(
        long = "days-ahead",
        value_name = "DAYS",
        help = "Days of ledger segments to pre-create (default: 7)"
    )]
    pub days_ahead: Option<u32>,
}

impl CliArgs {
    /// Create an EngineConfig from CLI arguments
    ///
    /// Uses production defaults for anything not overridden on the
    /// command line. Degenerate values (zero workers) fall back to
    /// defaults via sanitization rather than erroring.
    ///
    /// # Returns
    ///
    /// An `EngineConfig` with values from CLI arguments or defaults.
    pub fn to_engine_config(&self) -> EngineConfig {
        let mut config = EngineConfig::default();
        if let Some(workers) = self.workers {
            config.accrual_workers = workers;
        }
        if let Some(days_ahead) = self.days_ahead {
            config.partition_days_ahead = days_ahead;
        }
        config.sanitized()
    }
}
