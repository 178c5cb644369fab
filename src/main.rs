//! Rental Settlement Engine CLI
//!
//! Replays rental intents from a CSV file and prints the settled wallets.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- intents.csv > wallets.csv
//! cargo run -- --strategy sync intents.csv > wallets.csv
//! cargo run -- --strategy async --batch-size 2000 --max-concurrent 8 intents.csv > wallets.csv
//! cargo run -- --commission-rate 0.1 --completion-delay-secs 2 intents.csv > wallets.csv
//! ```
//!
//! Logs go to stderr; set `RUST_LOG` to change the level.
//!
//! # Exit Codes
//!
//! - 0: Success
//! - 1: Error (missing arguments, file not found, file not readable, etc.)

use rental_settlement_engine::cli;
use rental_settlement_engine::strategy;
use std::process;
use tracing::error;
use tracing_subscriber::EnvFilter;

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,rental_settlement_engine=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args = cli::parse_args();

    let strategy = {
        let config = if matches!(args.strategy, cli::StrategyType::Async) {
            Some(args.to_batch_config())
        } else {
            None
        };
        strategy::create_strategy(args.strategy.clone(), config, args.to_engine_config())
    };

    let mut output = std::io::stdout();
    if let Err(e) = strategy.process(&args.input_file, &mut output) {
        error!(error = %e, "replay failed");
        process::exit(1);
    }
}
