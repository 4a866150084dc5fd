//! getfile-conformance: a conformance test client for GETFILE servers
//!
//! Sends a fixed, ordered catalog of raw requests to a server under test,
//! one fresh TCP connection per case, and checks that each response starts
//! with the expected status line:
//! - `GETFILE OK` for a well-formed request of an existing file
//! - `GETFILE FILE_NOT_FOUND` for a well-formed request of a missing file
//! - `GETFILE INVALID` for anything that breaks the request grammar
//!
//! Exits with a non-zero status when any case fails.

mod catalog;
mod config;
mod engine;
mod protocol;
mod report;

use chrono::Local;
use config::Config;
use engine::Executor;
use report::Report;
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // A broken catalog is a defect in the suite, so it is fatal
    let catalog = config.catalog()?;

    if config.list {
        for (index, case) in catalog.iter().enumerate() {
            println!(
                "{:>2}. {} -> {}",
                index + 1,
                case.description(),
                case.expected()
            );
        }
        println!("\nTotal: {} cases", catalog.len());
        return Ok(ExitCode::SUCCESS);
    }

    info!(
        target_addr = %config.target,
        cases = catalog.len(),
        workers = config.workers,
        timeout_ms = config.timeout.as_millis() as u64,
        "Starting conformance run"
    );

    let executor = Executor::new(config.target.clone(), config.timeout)
        .with_read_limit(config.read_limit)
        .with_concurrency(config.workers);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.workers.max(1))
        .enable_all()
        .build()?;

    let started_at = Local::now();
    let results = runtime.block_on(executor.run(&catalog));

    let report = Report::new(executor.target(), started_at, &results);
    print!("{}", report.render());

    let summary = report.summary();
    info!(
        passed = summary.passed,
        failed = summary.failed(),
        total = summary.total,
        "Conformance run complete"
    );

    Ok(if summary.all_passed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
