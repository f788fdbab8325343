//! CSV format handling for operation records and balance output
//!
//! This module centralizes all CSV format concerns, providing:
//! - CsvRecord structure for deserialization
//! - Conversion from CSV records to domain operations
//! - Balance snapshot serialization
//!
//! All functions are pure (no I/O) for easy testing.

use crate::types::{AccountId, Amounts, Currency, PlanId};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Write;
use std::str::FromStr;

/// CSV record structure for deserialization
///
/// Matches the input CSV format with columns: op, account, currency,
/// amount, ref, plan. The currency/amount/ref fields are optional
/// because purchase operations carry a plan instead of an amount.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct CsvRecord {
    pub op: String,
    pub account: AccountId,
    pub currency: Option<String>,
    pub amount: Option<String>,
    #[serde(rename = "ref")]
    pub external_ref: Option<String>,
    pub plan: Option<PlanId>,
}

/// A validated intake operation
#[derive(Debug, Clone, PartialEq)]
pub enum OperationRecord {
    /// Externally confirmed deposit, keyed by its provider reference
    Deposit {
        account: AccountId,
        currency: Currency,
        amount: Decimal,
        external_ref: String,
    },
    /// Boost plan purchase
    Purchase { account: AccountId, plan: PlanId },
}

/// Convert a CsvRecord to an OperationRecord
///
/// This function:
/// - Parses the operation name into an OperationRecord variant
/// - Parses the currency and amount fields (for deposits)
/// - Validates that deposits carry currency, amount, and ref
/// - Validates that purchases carry a plan
///
/// # Arguments
///
/// * `csv_record` - The deserialized CSV record
///
/// # Returns
///
/// Result containing either:
/// - Ok(OperationRecord) - Successfully converted record
/// - Err(String) - Error message describing the conversion failure
pub fn convert_csv_record(csv_record: CsvRecord) -> Result<OperationRecord, String> {
    match csv_record.op.to_lowercase().as_str() {
        "deposit" => {
            let currency = match csv_record.currency.as_deref().map(str::trim) {
                Some("uni") | Some("UNI") | Some("Uni") => Currency::Uni,
                Some("ton") | Some("TON") | Some("Ton") => Currency::Ton,
                Some(other) if !other.is_empty() => {
                    return Err(format!(
                        "Invalid currency '{}' for account {}",
                        other, csv_record.account
                    ))
                }
                _ => {
                    return Err(format!(
                        "Deposit for account {} requires a currency",
                        csv_record.account
                    ))
                }
            };
            let amount = match csv_record.amount.as_deref().map(str::trim) {
                Some(amount_str) if !amount_str.is_empty() => Decimal::from_str(amount_str)
                    .map_err(|_| {
                        format!(
                            "Invalid amount '{}' for account {}",
                            amount_str, csv_record.account
                        )
                    })?,
                _ => {
                    return Err(format!(
                        "Deposit for account {} requires an amount",
                        csv_record.account
                    ))
                }
            };
            let external_ref = match csv_record.external_ref.as_deref().map(str::trim) {
                Some(reference) if !reference.is_empty() => reference.to_string(),
                _ => {
                    return Err(format!(
                        "Deposit for account {} requires an external ref",
                        csv_record.account
                    ))
                }
            };
            Ok(OperationRecord::Deposit {
                account: csv_record.account,
                currency,
                amount,
                external_ref,
            })
        }
        "purchase" => {
            let plan = csv_record.plan.ok_or_else(|| {
                format!(
                    "Purchase for account {} requires a plan",
                    csv_record.account
                )
            })?;
            Ok(OperationRecord::Purchase {
                account: csv_record.account,
                plan,
            })
        }
        other => Err(format!(
            "Invalid operation: '{}' for account {}",
            other, csv_record.account
        )),
    }
}

/// Write balance snapshots to CSV format
///
/// Writes balances in CSV format with columns: account, uni, ton.
/// Rows are sorted by account ID for deterministic output.
///
/// # Arguments
///
/// * `balances` - Slice of (account, balances) pairs to write
/// * `output` - Mutable reference to a writer for outputting CSV
///
/// # Returns
///
/// * `Ok(())` if writing succeeded
/// * `Err(String)` if a write error occurred
pub fn write_balances_csv(
    balances: &[(AccountId, Amounts)],
    output: &mut dyn Write,
) -> Result<(), String> {
    use csv::Writer;

    let mut writer = Writer::from_writer(output);

    writer
        .write_record(["account", "uni", "ton"])
        .map_err(|e| format!("Failed to write CSV header: {}", e))?;

    let mut sorted = balances.to_vec();
    sorted.sort_by_key(|(account, _)| *account);

    for (account, amounts) in sorted {
        writer
            .write_record(&[
                account.to_string(),
                format!("{:.6}", amounts.uni),
                format!("{:.6}", amounts.ton),
            ])
            .map_err(|e| format!("Failed to write balance record: {}", e))?;
    }

    writer
        .flush()
        .map_err(|e| format!("Failed to flush output: {}", e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal::Decimal;

    fn record(
        op: &str,
        currency: Option<&str>,
        amount: Option<&str>,
        external_ref: Option<&str>,
        plan: Option<PlanId>,
    ) -> CsvRecord {
        CsvRecord {
            op: op.to_string(),
            account: 1,
            currency: currency.map(|s| s.to_string()),
            amount: amount.map(|s| s.to_string()),
            external_ref: external_ref.map(|s| s.to_string()),
            plan,
        }
    }

    #[rstest]
    #[case("ton", Currency::Ton)]
    #[case("TON", Currency::Ton)] // case insensitive
    #[case("uni", Currency::Uni)]
    fn test_convert_deposit_valid(#[case] currency: &str, #[case] expected: Currency) {
        let result =
            convert_csv_record(record("deposit", Some(currency), Some("2.5"), Some("r1"), None));

        assert_eq!(
            result,
            Ok(OperationRecord::Deposit {
                account: 1,
                currency: expected,
                amount: Decimal::new(25, 1),
                external_ref: "r1".to_string(),
            })
        );
    }

    #[test]
    fn test_convert_purchase_valid() {
        let result = convert_csv_record(record("purchase", None, None, None, Some(3)));
        assert_eq!(
            result,
            Ok(OperationRecord::Purchase {
                account: 1,
                plan: 3
            })
        );
    }

    #[rstest]
    #[case::invalid_op(record("refund", None, None, None, None), "Invalid operation")]
    #[case::bad_currency(
        record("deposit", Some("eur"), Some("1"), Some("r1"), None),
        "Invalid currency"
    )]
    #[case::missing_currency(
        record("deposit", None, Some("1"), Some("r1"), None),
        "requires a currency"
    )]
    #[case::missing_amount(record("deposit", Some("ton"), None, Some("r1"), None), "requires an amount")]
    #[case::empty_amount(
        record("deposit", Some("ton"), Some("  "), Some("r1"), None),
        "requires an amount"
    )]
    #[case::bad_amount(
        record("deposit", Some("ton"), Some("abc"), Some("r1"), None),
        "Invalid amount"
    )]
    #[case::missing_ref(
        record("deposit", Some("ton"), Some("1"), None, None),
        "requires an external ref"
    )]
    #[case::purchase_without_plan(record("purchase", None, None, None, None), "requires a plan")]
    fn test_convert_errors(#[case] csv_record: CsvRecord, #[case] expected_error: &str) {
        let result = convert_csv_record(csv_record);
        assert!(result.is_err());
        assert!(result.unwrap_err().contains(expected_error));
    }

    #[rstest]
    #[case("  2.5  ", Decimal::new(25, 1))] // whitespace trimming
    #[case("0.123456", Decimal::new(123456, 6))] // six decimal places
    fn test_amount_parsing(#[case] amount_str: &str, #[case] expected: Decimal) {
        let result = convert_csv_record(record(
            "deposit",
            Some("ton"),
            Some(amount_str),
            Some("r1"),
            None,
        ));
        match result.unwrap() {
            OperationRecord::Deposit { amount, .. } => assert_eq!(amount, expected),
            other => panic!("unexpected record: {:?}", other),
        }
    }

    #[rstest]
    #[case::empty(vec![], "account,uni,ton\n")]
    #[case::single(
        vec![(1, Amounts { uni: Decimal::new(1000000, 6), ton: Decimal::ZERO })],
        "account,uni,ton\n1,1.000000,0.000000\n"
    )]
    #[case::sorted_by_account(
        vec![
            (3, Amounts::ZERO),
            (1, Amounts { uni: Decimal::ONE, ton: Decimal::new(25, 1) }),
        ],
        "account,uni,ton\n1,1.000000,2.500000\n3,0.000000,0.000000\n"
    )]
    fn test_write_balances_csv(
        #[case] balances: Vec<(AccountId, Amounts)>,
        #[case] expected_output: &str,
    ) {
        let mut output = Vec::new();
        let result = write_balances_csv(&balances, &mut output);
        assert!(result.is_ok());
        assert_eq!(String::from_utf8(output).unwrap(), expected_output);
    }
}
