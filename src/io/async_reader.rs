//! Asynchronous CSV reader with batch interface
//!
//! Reads replay intents from any `futures::io::AsyncRead` in batches, for the
//! async replay strategy.
//!
//! # Architecture
//!
//! ```text
//! CSV Reader → AsyncReader → Batches of Intents
//!                  ↓
//!           csv_format module
//!           (CsvRecord, convert_csv_record)
//! ```

use csv_async::AsyncReaderBuilder;
use futures::io::AsyncRead;
use futures::stream::StreamExt;
use tracing::warn;

use crate::io::csv_format::{convert_csv_record, CsvRecord};
use crate::types::Intent;

/// Asynchronous CSV reader
pub struct AsyncReader<R: AsyncRead + Unpin> {
    csv_reader: csv_async::AsyncDeserializer<R>,
}

impl<R: AsyncRead + Unpin + Send + 'static> AsyncReader<R> {
    pub fn new(reader: R) -> Self {
        let csv_reader = AsyncReaderBuilder::new()
            .flexible(true)
            .trim(csv_async::Trim::All)
            .create_deserializer(reader);

        Self { csv_reader }
    }

    /// Read up to `batch_size` intents
    ///
    /// Rows that fail to parse are logged and skipped.
    ///
    /// # Returns
    ///
    /// The converted intents; an empty vector once the input is exhausted.
    pub async fn read_batch(&mut self, batch_size: usize) -> Vec<Intent> {
        let mut batch = Vec::with_capacity(batch_size);
        let mut records = self.csv_reader.deserialize::<CsvRecord>();

        while batch.len() < batch_size {
            match records.next().await {
                Some(Ok(csv_record)) => match convert_csv_record(csv_record) {
                    Ok(intent) => batch.push(intent),
                    Err(e) => warn!(error = %e, "skipping intent row"),
                },
                Some(Err(e)) => warn!(error = %e, "skipping unreadable CSV row"),
                None => break,
            }
        }

        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::io::Cursor;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_async_reader_read_batch() {
        let csv_content = "type,rental,user,amount\n\
                           approve,1,,\n\
                           withdraw,,5,10\n\
                           complete,2,,\n";
        let reader = Cursor::new(csv_content.as_bytes());
        let mut async_reader = AsyncReader::new(reader);

        let batch = async_reader.read_batch(2).await;
        assert_eq!(
            batch,
            vec![
                Intent::Approve { rental: 1 },
                Intent::Withdraw {
                    user: 5,
                    amount: dec!(10)
                }
            ]
        );

        let batch = async_reader.read_batch(2).await;
        assert_eq!(batch, vec![Intent::Complete { rental: 2 }]);

        assert!(async_reader.read_batch(2).await.is_empty());
    }

    #[tokio::test]
    async fn test_async_reader_skips_invalid_rows() {
        let csv_content = "type,rental,user,amount\n\
                           teleport,1,,\n\
                           withdraw,,5,\n\
                           hold,3,,\n";
        let reader = Cursor::new(csv_content.as_bytes());
        let mut async_reader = AsyncReader::new(reader);

        let batch = async_reader.read_batch(10).await;

        assert_eq!(batch, vec![Intent::Hold { rental: 3 }]);
    }
}
