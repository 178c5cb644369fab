//! Synchronous replay strategy
//!
//! Single-threaded implementation of the ProcessingStrategy trait. It
//! coordinates the SyncReader (CSV input) and the IntentProcessor (engine).
//!
//! # Design
//!
//! The strategy only orchestrates, delegating:
//! - CSV parsing to `SyncReader` (iterator interface)
//! - Intent application to `IntentProcessor`
//! - CSV output to `csv_format::write_wallets_csv`
//!
//! # Completion Timers
//!
//! No async runtime exists on this path, so a rental reaching `returned` is
//! completed as soon as it is returned, whatever the configured delay.

use crate::core::{EngineConfig, IntentProcessor};
use crate::io::csv_format::write_wallets_csv;
use crate::io::sync_reader::SyncReader;
use crate::strategy::ProcessingStrategy;
use crate::types::RentalError;
use std::io::Write;
use std::path::Path;
use tracing::{info, warn};

/// Synchronous replay strategy
///
/// # Examples
///
/// ```no_run
/// use rental_settlement_engine::core::EngineConfig;
/// use rental_settlement_engine::strategy::{ProcessingStrategy, SyncProcessingStrategy};
/// use std::path::Path;
/// use std::io;
///
/// let strategy = SyncProcessingStrategy::new(EngineConfig::default());
/// let mut output = io::stdout();
///
/// strategy.process(Path::new("intents.csv"), &mut output)
///     .expect("Replay failed");
/// ```
#[derive(Debug, Clone)]
pub struct SyncProcessingStrategy {
    engine_config: EngineConfig,
}

impl SyncProcessingStrategy {
    pub fn new(engine_config: EngineConfig) -> Self {
        Self { engine_config }
    }
}

impl ProcessingStrategy for SyncProcessingStrategy {
    /// Replay intents one at a time, in file order
    ///
    /// Fatal errors (file not found, output errors) are returned immediately.
    /// Refused intents and malformed rows are logged and skipped.
    fn process(&self, input_path: &Path, output: &mut dyn Write) -> Result<(), RentalError> {
        let processor = IntentProcessor::new(self.engine_config.clone());
        let reader = SyncReader::new(input_path)?;

        let mut applied = 0usize;
        let mut failed = 0usize;
        for result in reader {
            match result {
                Ok(intent) => {
                    let kind = intent.kind();
                    let rental = intent.rental_ref();
                    match processor.process(intent) {
                        Ok(()) => applied += 1,
                        Err(e) => {
                            failed += 1;
                            warn!(kind, rental = ?rental, error = %e, "intent failed");
                        }
                    }
                }
                Err(e) => {
                    failed += 1;
                    warn!(error = %e, "skipping intent row");
                }
            }
        }
        info!(applied, failed, "replay finished");

        write_wallets_csv(&processor.wallets(), output)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;
    use tempfile::NamedTempFile;

    /// Helper function to create a temporary CSV file for testing
    fn create_temp_csv(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("Failed to create temp file");
        file.write_all(content.as_bytes())
            .expect("Failed to write to temp file");
        file.flush().expect("Failed to flush temp file");
        file
    }

    fn strategy() -> SyncProcessingStrategy {
        SyncProcessingStrategy::new(EngineConfig::new(
            crate::core::DEFAULT_COMMISSION_RATE,
            Duration::ZERO,
        ))
    }

    const FULL_RENTAL: &str = "type,rental,item,user,start,end,amount,deposit,status\n\
                               item,,1,10,,,50,,\n\
                               user,,,20,,,,,\n\
                               request,1,1,20,2024-06-01,2024-06-03,100,25,\n\
                               approve,1,,,,,,,\n\
                               delivery,1,,,,,,,delivered_to_buyer\n\
                               delivery,1,,,,,,,returned_to_seller\n";

    #[test]
    fn test_sync_strategy_settles_full_rental() {
        let file = create_temp_csv(FULL_RENTAL);
        let mut output = Vec::new();

        strategy().process(file.path(), &mut output).unwrap();

        let output_str = String::from_utf8(output).unwrap();
        let lines: Vec<&str> = output_str.lines().collect();
        assert_eq!(lines[0], "user,pending,withdrawable,total,earnings,withdrawn");
        assert_eq!(lines[1], "10,0.00,95.00,95.00,95.00,0.00");
        assert_eq!(lines[2], "20,0.00,25.00,25.00,0.00,0.00");
    }

    #[test]
    fn test_sync_strategy_completes_without_runtime() {
        let file = create_temp_csv(FULL_RENTAL);
        let strategy = SyncProcessingStrategy::new(EngineConfig::default());
        let mut output = Vec::new();

        strategy.process(file.path(), &mut output).unwrap();

        let output_str = String::from_utf8(output).unwrap();
        assert!(output_str.contains("10,0.00,95.00,95.00,95.00,0.00"));
    }

    #[test]
    fn test_sync_strategy_handles_missing_file() {
        let mut output = Vec::new();

        let result = strategy().process(Path::new("nonexistent.csv"), &mut output);

        assert!(matches!(result, Err(RentalError::Io { .. })));
    }

    #[test]
    fn test_sync_strategy_continues_on_refused_intent() {
        let csv_content = "type,rental,item,user,start,end,amount\n\
                           item,,1,10,,,50\n\
                           user,,,20,,,\n\
                           withdraw,,,10,,,5\n\
                           bogus,,,,,,\n\
                           request,1,1,20,2024-06-01,2024-06-03,100\n\
                           approve,1,,,,,\n";
        let file = create_temp_csv(csv_content);
        let mut output = Vec::new();

        strategy().process(file.path(), &mut output).unwrap();

        let output_str = String::from_utf8(output).unwrap();
        assert!(output_str.contains("10,95.00,0.00,95.00,0.00,0.00"));
    }

    #[test]
    fn test_sync_strategy_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SyncProcessingStrategy>();
    }
}
