//! Reward Ledger Engine CLI
//!
//! Command-line interface for replaying reward operations from CSV files.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- operations.csv > balances.csv
//! cargo run -- --batch-size 500 --accrual-ticks 3 operations.csv > balances.csv
//! cargo run -- --workers 8 --days-ahead 2 operations.csv > balances.csv
//! ```
//!
//! The program reads operation records from the input CSV file, applies
//! them through the reward engine (deposits are deduplicated by their
//! external reference, purchases debit the exact plan price), runs the
//! requested number of accrual passes, and writes the final balance
//! snapshot to stdout. Logs go to stderr so stdout stays clean CSV.
//!
//! # Exit Codes
//!
//! - 0: Success
//! - 1: Error (file not found, output failure, balance drift detected)

use reward_ledger_engine::cli;
use reward_ledger_engine::core::RewardEngine;
use reward_ledger_engine::io::{write_balances_csv, AsyncReader, OperationRecord};
use reward_ledger_engine::types::PlanCatalog;
use std::process;
use tokio_util::compat::TokioAsyncReadCompatExt;
use tracing::{error, warn};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = cli::parse_args();
    let engine = RewardEngine::new(args.to_engine_config(), PlanCatalog::standard());

    let file = match tokio::fs::File::open(&args.input_file).await {
        Ok(file) => file,
        Err(open_error) => {
            eprintln!("Error: cannot open {}: {}", args.input_file.display(), open_error);
            process::exit(1);
        }
    };
    let mut reader = AsyncReader::new(file.compat());

    loop {
        let batch = reader.read_batch(args.batch_size).await;
        if batch.is_empty() {
            break;
        }
        for operation in batch {
            apply(&engine, operation).await;
        }
    }

    for _ in 0..args.accrual_ticks {
        engine.accrue_once().await;
    }

    let drifts = engine.audit();
    if !drifts.is_empty() {
        for drift in &drifts {
            error!(
                account_id = drift.account_id,
                currency = %drift.currency,
                balance = %drift.balance,
                ledger_sum = %drift.ledger_sum,
                "balance drift detected"
            );
        }
        process::exit(1);
    }

    let mut output = std::io::stdout();
    if let Err(write_error) = write_balances_csv(&engine.all_balances(), &mut output) {
        eprintln!("Error: {}", write_error);
        process::exit(1);
    }
}

/// Apply one operation, logging failures without aborting the replay
async fn apply(engine: &RewardEngine, operation: OperationRecord) {
    match operation {
        OperationRecord::Deposit {
            account,
            currency,
            amount,
            external_ref,
        } => {
            if let Err(deposit_error) = engine
                .report_deposit(account, currency, amount, &external_ref)
                .await
            {
                // A failed attempt releases its idempotency claim, so
                // resubmitting a transient failure is safe.
                if deposit_error.is_retryable() {
                    warn!(account, %deposit_error, "deposit failed transiently, retrying");
                    if let Err(retry_error) = engine
                        .report_deposit(account, currency, amount, &external_ref)
                        .await
                    {
                        warn!(account, %retry_error, "deposit rejected");
                    }
                } else {
                    warn!(account, %deposit_error, "deposit rejected");
                }
            }
        }
        OperationRecord::Purchase { account, plan } => {
            if let Err(purchase_error) = engine.request_purchase(account, plan).await {
                warn!(account, plan, %purchase_error, "purchase rejected");
            }
        }
    }
}
