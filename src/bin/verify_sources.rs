//! Registry verification tool
//!
//! Checks every data source's templates offline and, with `--live`, runs
//! one analysis query per source against the configured CartoDB endpoint.
//!
//! Usage: verify_sources [config.toml] [--live] [--json]
//!
//! With `--json`, stdout carries exactly one JSON document and all log
//! output goes to stderr.

use std::process::ExitCode;

use forest_change_service::config::ServiceConfig;
use forest_change_service::ingest::{CartoDbClient, ExportEndpoint};
use forest_change_service::logging::{self, ConsoleStream, LogSource};
use forest_change_service::sources::DATA_SOURCES;
use forest_change_service::verify::{self, VerificationStatus};

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let live = args.iter().any(|a| a == "--live");
    let json = args.iter().any(|a| a == "--json");
    let config_path = args.iter().find(|a| !a.starts_with("--"));

    let config = match config_path {
        Some(path) => match ServiceConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("✗ {}", e);
                return ExitCode::FAILURE;
            }
        },
        None => ServiceConfig::from_env(),
    };

    let level = match config.logging.min_level() {
        Ok(level) => level,
        Err(e) => {
            eprintln!("✗ {}", e);
            return ExitCode::FAILURE;
        }
    };
    let console = if json { ConsoleStream::Stderr } else { ConsoleStream::Split };
    logging::init_logger(level, config.logging.file.as_deref(), config.logging.timestamps, console);

    if !json {
        println!("🔍 Verifying template registry...");
    }
    let report = verify::verify_registry(DATA_SOURCES);
    let mut ok = report.summary.failed == 0 && report.registry_problems.is_empty();

    let live_results = if live {
        let client = match CartoDbClient::new(&config.store) {
            Ok(client) => client,
            Err(e) => {
                logging::error(LogSource::Store, None, &e.to_string());
                return ExitCode::FAILURE;
            }
        };
        let exports = match ExportEndpoint::new(client.endpoint()) {
            Ok(exports) => exports,
            Err(e) => {
                logging::error(LogSource::Store, None, &e.to_string());
                return ExitCode::FAILURE;
            }
        };
        let results = verify::verify_live_sources(&client, &exports, DATA_SOURCES);
        ok &= results.iter().all(|r| r.status != VerificationStatus::Failed);
        Some(results)
    } else {
        None
    };

    if json {
        match verify::report_json(&report, live_results.as_deref()) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                eprintln!("✗ Could not serialize report: {}", e);
                return ExitCode::FAILURE;
            }
        }
    } else {
        verify::print_summary(&report);
        if let Some(results) = &live_results {
            verify::print_live_results(results);
        }
    }

    if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE }
}
