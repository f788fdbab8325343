//! Asynchronous CSV reader with batch interface
//!
//! Provides a streaming interface over operation records from a CSV
//! file. Supports batch reading for efficient async processing.
//!
//! # Design
//!
//! The AsyncReader uses:
//! - csv-async for streaming CSV parsing
//! - tokio for async runtime and concurrency primitives
//! - Batch reading for efficient processing

use crate::io::csv_format::{convert_csv_record, CsvRecord, OperationRecord};
use csv_async::AsyncReaderBuilder;
use futures::io::AsyncRead;
use futures::stream::StreamExt;
use tracing::warn;

/// Asynchronous CSV reader
///
/// Provides batch reading interface over operation records.
/// Maintains streaming behavior with constant memory usage.
pub struct AsyncReader<R: AsyncRead + Unpin> {
    csv_reader: csv_async::AsyncDeserializer<R>,
}

impl<R: AsyncRead + Unpin + Send + 'static> AsyncReader<R> {
    /// Create a new AsyncReader from an async reader
    ///
    /// # Arguments
    ///
    /// * `reader` - Async reader providing CSV data
    ///
    /// # Returns
    ///
    /// A new AsyncReader instance
    pub fn new(reader: R) -> Self {
        let csv_reader = AsyncReaderBuilder::new()
            .flexible(true)
            .trim(csv_async::Trim::All)
            .create_deserializer(reader);

        Self { csv_reader }
    }

    /// Read a batch of operation records
    ///
    /// This method reads up to `batch_size` records from the CSV file,
    /// converting them to OperationRecords. Invalid records are logged
    /// and skipped.
    ///
    /// # Arguments
    ///
    /// * `batch_size` - Maximum number of records to read
    ///
    /// # Returns
    ///
    /// A vector of successfully converted operation records.
    /// Returns an empty vector when the end of the file is reached.
    pub async fn read_batch(&mut self, batch_size: usize) -> Vec<OperationRecord> {
        let mut batch = Vec::with_capacity(batch_size);
        let mut records = self.csv_reader.deserialize::<CsvRecord>();

        while batch.len() < batch_size {
            match records.next().await {
                Some(Ok(csv_record)) => match convert_csv_record(csv_record) {
                    Ok(operation) => batch.push(operation),
                    Err(e) => warn!("record conversion error: {}", e),
                },
                Some(Err(e)) => warn!("csv parse error: {}", e),
                None => break,
            }
        }

        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Currency;
    use futures::io::Cursor;
    use rust_decimal::Decimal;

    #[tokio::test]
    async fn test_read_batch() {
        let csv_content = "op,account,currency,amount,ref,plan\n\
            deposit,1,ton,2.5,r1,\n\
            deposit,2,uni,10,r2,\n\
            purchase,1,,,,3\n";
        let reader = Cursor::new(csv_content.as_bytes());
        let mut async_reader = AsyncReader::new(reader);

        let batch = async_reader.read_batch(2).await;
        assert_eq!(batch.len(), 2);
        assert_eq!(
            batch[0],
            OperationRecord::Deposit {
                account: 1,
                currency: Currency::Ton,
                amount: Decimal::new(25, 1),
                external_ref: "r1".to_string(),
            }
        );

        let batch = async_reader.read_batch(2).await;
        assert_eq!(
            batch,
            vec![OperationRecord::Purchase {
                account: 1,
                plan: 3
            }]
        );
    }

    #[tokio::test]
    async fn test_empty_csv() {
        let csv_content = "op,account,currency,amount,ref,plan\n";
        let reader = Cursor::new(csv_content.as_bytes());
        let mut async_reader = AsyncReader::new(reader);

        let batch = async_reader.read_batch(10).await;
        assert!(batch.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_record_skipped() {
        let csv_content = "op,account,currency,amount,ref,plan\n\
            refund,1,ton,2.5,r1,\n\
            deposit,1,ton,2.5,r1,\n";
        let reader = Cursor::new(csv_content.as_bytes());
        let mut async_reader = AsyncReader::new(reader);

        let batch = async_reader.read_batch(10).await;
        assert_eq!(batch.len(), 1);
        assert!(matches!(batch[0], OperationRecord::Deposit { .. }));
    }

    #[tokio::test]
    async fn test_batch_size_larger_than_records() {
        let csv_content = "op,account,currency,amount,ref,plan\ndeposit,1,ton,1,r1,\n";
        let reader = Cursor::new(csv_content.as_bytes());
        let mut async_reader = AsyncReader::new(reader);

        let batch = async_reader.read_batch(100).await;
        assert_eq!(batch.len(), 1);
    }

    #[tokio::test]
    async fn test_whitespace_handling() {
        let csv_content = "op,account,currency,amount,ref,plan\n  deposit , 1 , ton , 1.0 , r1 ,\n";
        let reader = Cursor::new(csv_content.as_bytes());
        let mut async_reader = AsyncReader::new(reader);

        let batch = async_reader.read_batch(10).await;
        assert_eq!(batch.len(), 1);
    }
}
