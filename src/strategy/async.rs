//! Asynchronous batch replay strategy
//!
//! Multi-threaded implementation of the ProcessingStrategy trait. Intents
//! are read in batches; within a batch they are partitioned by item and the
//! partitions run in parallel.
//!
//! # Architecture
//!
//! ```text
//! AsyncProcessingStrategy
//!     ├── BatchConfig (batch_size, max_concurrent_batches)
//!     ├── AsyncReader (batch CSV reading)
//!     ├── BatchProcessor (item partitioning + tokio tasks)
//!     └── IntentProcessor → SettlementEngine (shared, lock-protected)
//! ```
//!
//! # Ordering
//!
//! - Batches run one after the other, so intents on one item keep file
//!   order across the whole file.
//! - Inside a batch, `withdraw` intents run after every item partition.
//! - Completion timers run on the same runtime; wallets are written once
//!   every timer has fired or been cancelled.

use crate::core::{BatchProcessor, EngineConfig, IntentProcessor};
use crate::io::async_reader::AsyncReader;
use crate::io::csv_format::write_wallets_csv;
use crate::strategy::ProcessingStrategy;
use crate::types::RentalError;
use std::io::Write;
use std::path::Path;
use tracing::{info, warn};

/// Configuration for batch processing
#[derive(Clone, Debug, PartialEq)]
pub struct BatchConfig {
    /// Number of intents per batch
    pub batch_size: usize,
    /// Number of runtime worker threads
    pub max_concurrent_batches: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            max_concurrent_batches: num_cpus::get(),
        }
    }
}

impl BatchConfig {
    /// Create a BatchConfig; zero values fall back to the defaults
    pub fn new(batch_size: usize, max_concurrent_batches: usize) -> Self {
        let default = Self::default();

        let batch_size = if batch_size == 0 {
            warn!(
                batch_size,
                default = default.batch_size,
                "invalid batch_size, using default"
            );
            default.batch_size
        } else {
            batch_size
        };

        let max_concurrent_batches = if max_concurrent_batches == 0 {
            warn!(
                max_concurrent_batches,
                default = default.max_concurrent_batches,
                "invalid max_concurrent_batches, using default"
            );
            default.max_concurrent_batches
        } else {
            max_concurrent_batches
        };

        Self {
            batch_size,
            max_concurrent_batches,
        }
    }
}

/// Asynchronous batch replay strategy
#[derive(Debug, Clone)]
pub struct AsyncProcessingStrategy {
    config: BatchConfig,
    engine_config: EngineConfig,
}

impl AsyncProcessingStrategy {
    pub fn new(config: BatchConfig, engine_config: EngineConfig) -> Self {
        Self {
            config,
            engine_config,
        }
    }
}

impl ProcessingStrategy for AsyncProcessingStrategy {
    /// Replay intents batch by batch on a multi-threaded tokio runtime
    ///
    /// Fatal errors (file not found, runtime or output errors) are returned
    /// immediately. Refused intents and malformed rows are logged and skipped.
    fn process(&self, input_path: &Path, output: &mut dyn Write) -> Result<(), RentalError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(self.config.max_concurrent_batches)
            .enable_all()
            .build()
            .map_err(|e| RentalError::Io {
                message: format!("Failed to create tokio runtime: {}", e),
            })?;

        runtime.block_on(async {
            let intents = IntentProcessor::new(self.engine_config.clone());
            let processor = BatchProcessor::new(intents.clone());

            let file = tokio::fs::File::open(input_path)
                .await
                .map_err(|e| RentalError::Io {
                    message: format!("Failed to open file '{}': {}", input_path.display(), e),
                })?;
            let compat_file = tokio_util::compat::TokioAsyncReadCompatExt::compat(file);
            let mut reader = AsyncReader::new(compat_file);

            let mut applied = 0usize;
            let mut failed = 0usize;
            loop {
                let batch = reader.read_batch(self.config.batch_size).await;
                if batch.is_empty() {
                    break;
                }

                let results = processor.process_batch(batch).await;
                let refused = results.iter().filter(|r| r.result.is_err()).count();
                failed += refused;
                applied += results.len() - refused;
            }

            let pending = intents.engine().pending_completions();
            if pending > 0 {
                info!(pending, "waiting for scheduled completions");
            }
            intents.engine().wait_for_completions().await;
            info!(applied, failed, "replay finished");

            write_wallets_csv(&intents.wallets(), output)
        })
    }
}
