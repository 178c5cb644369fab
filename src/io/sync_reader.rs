//! Synchronous CSV reader with iterator interface
//!
//! Provides a streaming iterator over replay intents from a CSV file.
//! Delegates CSV format concerns to the csv_format module.
//!
//! # Iterator Interface
//!
//! SyncReader implements the Iterator trait, yielding `Result<Intent, RentalError>`
//! for each CSV row:
//!
//! ```no_run
//! use rental_settlement_engine::io::sync_reader::SyncReader;
//! use std::path::Path;
//!
//! let reader = SyncReader::new(Path::new("intents.csv")).unwrap();
//! for result in reader {
//!     match result {
//!         Ok(intent) => println!("Replaying {}", intent.kind()),
//!         Err(e) => eprintln!("Error: {}", e),
//!     }
//! }
//! ```
//!
//! # Error Handling
//!
//! - Fatal errors (file not found) are returned from `new()`
//! - Individual row errors are yielded as `Err` items, tagged with the line number

use std::fs::File;
use std::path::Path;

use csv::{ReaderBuilder, Trim};

use crate::io::csv_format::{convert_csv_record, CsvRecord};
use crate::types::{Intent, RentalError};

/// Synchronous CSV reader
///
/// Reads one row at a time; memory use does not grow with the file.
#[derive(Debug)]
pub struct SyncReader {
    reader: csv::Reader<File>,
    line_num: u64,
}

impl SyncReader {
    /// Open an intent file
    ///
    /// The reader trims every field and accepts rows with fewer fields than
    /// the header.
    ///
    /// # Returns
    ///
    /// * `Ok(SyncReader)` - If the file was opened
    /// * `Err(RentalError::Io)` - If the file could not be opened
    pub fn new(path: &Path) -> Result<Self, RentalError> {
        let file = File::open(path).map_err(|e| RentalError::Io {
            message: format!("Failed to open file '{}': {}", path.display(), e),
        })?;

        let reader = ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(true)
            .buffer_capacity(8 * 1024)
            .from_reader(file);

        Ok(Self {
            reader,
            line_num: 1,
        })
    }
}

impl Iterator for SyncReader {
    type Item = Result<Intent, RentalError>;

    /// Read and convert the next row
    ///
    /// # Returns
    ///
    /// * `Some(Ok(Intent))` - Successfully parsed row
    /// * `Some(Err(RentalError::Parse))` - Parse or conversion error with line number
    /// * `None` - End of file reached
    fn next(&mut self) -> Option<Self::Item> {
        let mut deserializer = self.reader.deserialize::<CsvRecord>();
        let row = deserializer.next()?;
        self.line_num += 1;
        let line = self.line_num;

        Some(match row {
            Ok(csv_record) => convert_csv_record(csv_record).map_err(|e| match e {
                RentalError::Parse { message, .. } => RentalError::Parse {
                    line: Some(line),
                    message,
                },
                other => other,
            }),
            Err(e) => Err(RentalError::Parse {
                line: Some(line),
                message: e.to_string(),
            }),
        })
    }
}
