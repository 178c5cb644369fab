//! I/O module
//!
//! Handles CSV intent parsing and wallet output.
//!
//! # Components
//!
//! - `csv_format` - Row format (intent conversion, wallet serialization)
//! - `sync_reader` - Synchronous reader with iterator interface
//! - `async_reader` - Asynchronous reader with batch interface

pub mod async_reader;
pub mod csv_format;
pub mod sync_reader;

pub use async_reader::AsyncReader;
pub use csv_format::{convert_csv_record, parse_datetime, write_wallets_csv, CsvRecord};
pub use sync_reader::SyncReader;
