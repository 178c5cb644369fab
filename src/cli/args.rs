use crate::core::{EngineConfig, DEFAULT_COMMISSION_RATE};
use crate::strategy::BatchConfig;
use clap::{Parser, ValueEnum};
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::time::Duration;

/// Replay rental intents and settle wallets
#[derive(Parser, Debug)]
#[command(name = "rental-settlement-engine")]
#[command(about = "Replay rental booking intents and print the settled wallets", long_about = None)]
pub struct CliArgs {
    /// Input CSV file path containing intent records
    #[arg(value_name = "INPUT", help = "Path to the input CSV file")]
    pub input_file: PathBuf,

    /// Replay strategy
    #[arg(
        long = "strategy",
        value_name = "STRATEGY",
        default_value = "async",
        help = "Replay strategy: 'sync' for synchronous or 'async' for batched, item-parallel replay"
    )]
    pub strategy: StrategyType,

    /// Number of intents per batch (async mode only)
    #[arg(
        long = "batch-size",
        value_name = "SIZE",
        help = "Number of intents per batch (default: 1000)"
    )]
    pub batch_size: Option<usize>,

    /// Number of worker threads (async mode only)
    #[arg(
        long = "max-concurrent",
        value_name = "COUNT",
        help = "Number of worker threads (default: CPU cores)"
    )]
    pub max_concurrent_batches: Option<usize>,

    /// Platform commission rate
    #[arg(
        long = "commission-rate",
        value_name = "RATE",
        help = "Platform commission as a fraction in [0, 1) (default: 0.05)"
    )]
    pub commission_rate: Option<Decimal>,

    /// Delay between return and completion
    #[arg(
        long = "completion-delay-secs",
        value_name = "SECONDS",
        default_value_t = 0,
        help = "Seconds between return and automatic completion (async mode; sync completes at once)"
    )]
    pub completion_delay_secs: u64,
}

/// Available replay strategies
#[derive(Clone, Debug, PartialEq, ValueEnum)]
pub enum StrategyType {
    Sync,
    Async,
}

impl CliArgs {
    /// Create a BatchConfig from CLI arguments
    pub fn to_batch_config(&self) -> BatchConfig {
        if self.batch_size.is_some() || self.max_concurrent_batches.is_some() {
            let default = BatchConfig::default();
            BatchConfig::new(
                self.batch_size.unwrap_or(default.batch_size),
                self.max_concurrent_batches
                    .unwrap_or(default.max_concurrent_batches),
            )
        } else {
            BatchConfig::default()
        }
    }

    /// Create the engine configuration; an out-of-range rate falls back to
    /// the default
    pub fn to_engine_config(&self) -> EngineConfig {
        EngineConfig::new(
            self.commission_rate.unwrap_or(DEFAULT_COMMISSION_RATE),
            Duration::from_secs(self.completion_delay_secs),
        )
    }
}
