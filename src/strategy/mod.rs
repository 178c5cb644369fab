//! Replay strategy module
//!
//! This module defines the Strategy pattern for complete replay pipelines:
//! reading intents from CSV, driving them through a settlement engine and
//! writing the final wallets. Strategies (synchronous, asynchronous batch)
//! are selected at runtime.

use crate::cli::StrategyType;
use crate::core::EngineConfig;
use crate::types::RentalError;
use std::io::Write;
use std::path::Path;

pub mod r#async;
pub mod sync;

pub use self::r#async::{AsyncProcessingStrategy, BatchConfig};
pub use sync::SyncProcessingStrategy;

/// Replay strategy trait
///
/// Each strategy reads intents from a CSV file, applies them to a fresh
/// engine and writes the resulting wallets to `output`.
pub trait ProcessingStrategy: Send + Sync {
    /// Replay intents from `input_path` and write wallets to `output`
    ///
    /// # Returns
    ///
    /// * `Ok(())` if the replay ran to the end
    /// * `Err(RentalError)` if a fatal error occurred (file not found, I/O error)
    ///
    /// Intents the engine refuses and malformed rows are logged and skipped;
    /// they never fail the replay.
    fn process(&self, input_path: &Path, output: &mut dyn Write) -> Result<(), RentalError>;
}

/// Create a replay strategy
///
/// # Arguments
///
/// * `strategy_type` - Sync or Async
/// * `config` - Batch configuration (ignored for sync)
/// * `engine_config` - Commission rate and completion delay for the engine
pub fn create_strategy(
    strategy_type: StrategyType,
    config: Option<BatchConfig>,
    engine_config: EngineConfig,
) -> Box<dyn ProcessingStrategy> {
    match strategy_type {
        StrategyType::Sync => Box::new(SyncProcessingStrategy::new(engine_config)),
        StrategyType::Async => {
            let config = config.unwrap_or_default();
            Box::new(AsyncProcessingStrategy::new(config, engine_config))
        }
    }
}
