//! End-to-end integration tests
//!
//! These tests validate the complete replay pipeline using predefined CSV
//! fixtures. Each test:
//! 1. Reads input.csv from a fixture directory
//! 2. Replays every intent through a fresh engine
//! 3. Writes the wallets as CSV
//! 4. Compares the output with expected.csv
//!
//! Fixtures live in tests/fixtures/ and cover:
//! - The full delivery lifecycle with a deposit and a withdrawal
//! - Damage deductions and retained deposits
//! - Overlapping requests rejected by an approval
//! - Cancellation of a granted rental
//! - Extensions settled at completion
//! - Refused operations and malformed rows
//! - Labels used before the request that introduces them
//! - Several items replayed in parallel
//! - Commission rounding
//!
//! Each fixture runs with both the synchronous and the asynchronous strategy.
//! Completions happen as soon as a rental is returned.

#[cfg(test)]
mod tests {
    use rental_settlement_engine::cli::StrategyType;
    use rental_settlement_engine::core::{EngineConfig, DEFAULT_COMMISSION_RATE};
    use rental_settlement_engine::strategy::{create_strategy, BatchConfig};
    use rstest::rstest;
    use std::fs;
    use std::io::Write;
    use std::path::Path;
    use std::time::Duration;
    use tempfile::NamedTempFile;

    /// Replay tests/fixtures/{fixture_name}/input.csv and compare the
    /// wallets with expected.csv
    fn run_test_fixture(fixture_name: &str, strategy_type: StrategyType, batch: Option<BatchConfig>) {
        let fixture_dir = format!("tests/fixtures/{}", fixture_name);
        let input_path = format!("{}/input.csv", fixture_dir);
        let expected_path = format!("{}/expected.csv", fixture_dir);

        assert!(
            Path::new(&input_path).exists(),
            "Input file not found: {}",
            input_path
        );
        assert!(
            Path::new(&expected_path).exists(),
            "Expected file not found: {}",
            expected_path
        );

        let engine_config = EngineConfig::new(DEFAULT_COMMISSION_RATE, Duration::ZERO);
        let strategy = create_strategy(strategy_type.clone(), batch, engine_config);

        let mut temp_output = NamedTempFile::new().expect("Failed to create temp file");
        strategy
            .process(Path::new(&input_path), &mut temp_output)
            .unwrap_or_else(|e| panic!("Failed to replay intents: {}", e));
        temp_output.flush().expect("Failed to flush temp file");

        let actual_output = fs::read_to_string(temp_output.path())
            .unwrap_or_else(|e| panic!("Failed to read temp output file: {}", e));
        let expected_output = fs::read_to_string(&expected_path)
            .unwrap_or_else(|e| panic!("Failed to read expected file {}: {}", expected_path, e));

        assert_eq!(
            actual_output, expected_output,
            "\n\nOutput mismatch for fixture: {} (strategy: {:?})\n\nActual output:\n{}\n\nExpected output:\n{}\n",
            fixture_name, strategy_type, actual_output, expected_output
        );
    }

    #[rstest]
    #[case("happy_path")]
    #[case("damage_settlement")]
    #[case("overlapping_requests")]
    #[case("cancellation")]
    #[case("extension")]
    #[case("invalid_operations")]
    #[case("multiple_items")]
    #[case("precision")]
    #[case("malformed_data")]
    #[case("label_order")]
    fn test_fixtures(
        #[case] fixture: &str,
        #[values(StrategyType::Sync, StrategyType::Async)] strategy: StrategyType,
    ) {
        run_test_fixture(fixture, strategy, None);
    }

    /// Batches smaller than a rental's lifecycle must not change the outcome
    #[rstest]
    #[case("happy_path")]
    #[case("cancellation")]
    #[case("multiple_items")]
    #[case("label_order")]
    fn test_fixtures_with_small_batches(#[case] fixture: &str) {
        run_test_fixture(fixture, StrategyType::Async, Some(BatchConfig::new(3, 2)));
    }
}
