use gumdrop::Options;
use std::io::{self, BufRead};

use flock::metrics::RunMetrics;
use flock::runner::Runner;
use flock::workload::WorkloadHandle;
use flock::RunnerConfiguration;

/// Not all functions are used by all tests, so we enable allow(dead_code) to avoid
/// compiler warnings during testing.

/// The following options are configured by default, if not set to a custom value:
///  --run-time 10
///  --no-print-metrics
pub fn build_configuration(custom: Vec<&str>) -> RunnerConfiguration {
    // Start with an empty configuration.
    let mut configuration: Vec<&str> = vec![];

    // Merge in all custom options first.
    configuration.extend_from_slice(&custom);

    // Never let a broken test hang, cancel after 10 seconds if not otherwise configured.
    if !configuration.contains(&"--run-time") {
        configuration.extend_from_slice(&["--run-time", "10"]);
    }

    // Keep test output readable.
    if !configuration.contains(&"--no-print-metrics") {
        configuration.push("--no-print-metrics");
    }

    // Parse these options to generate a RunnerConfiguration.
    RunnerConfiguration::parse_args_default(&configuration)
        .expect("failed to parse options and generate a configuration")
}

/// Run the workload, returning the RunMetrics.
#[allow(dead_code)]
pub async fn run_workload(
    configuration: RunnerConfiguration,
    workload: &WorkloadHandle,
) -> RunMetrics {
    Runner::initialize_with_config(configuration)
        .unwrap()
        .execute(workload)
        .await
        .unwrap()
}

/// Helper to count the number of lines in a test artifact.
#[allow(dead_code)]
pub fn file_length(file_name: &str) -> usize {
    if let Ok(file) = std::fs::File::open(std::path::Path::new(file_name)) {
        io::BufReader::new(file).lines().count()
    } else {
        0
    }
}

/// Helper to delete test artifacts, if existing.
#[allow(dead_code)]
pub fn cleanup_files(files: Vec<&str>) {
    for file in files {
        if std::path::Path::new(file).exists() {
            std::fs::remove_file(file).expect("failed to remove file");
        }
    }
}
