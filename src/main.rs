//! routedoc - Command-line tool for generating API documentation from application routes.
//!
//! Reads a route manifest, extracts documentation for every route, merges it with any edits
//! made to the previous output and writes the result as editable YAML snapshots.
//!
//! # Usage
//!
//! ```bash
//! routedoc [OPTIONS] <ROUTES_FILE>
//! ```
//!
//! # Examples
//!
//! Generate snapshots, reading handler doc comments from the project sources:
//! ```bash
//! routedoc routes.yaml -p ./my-api-project
//! ```
//!
//! Also emit the ordered documentation as JSON:
//! ```bash
//! routedoc routes.yaml -p ./my-api-project -e docs.json -f json
//! ```
//!
//! Throw away hand edits and regenerate from scratch:
//! ```bash
//! routedoc routes.yaml --force -v
//! ```

use anyhow::Result;
use clap::Parser;
use log::info;
use routedoc::cli;
use routedoc::generator::RunStatus;

fn main() -> Result<()> {
    // Parse once for the verbose flag so the logger is up before validation logs anything
    let args_for_verbose = cli::CliArgs::parse();

    let log_level = if args_for_verbose.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    info!("routedoc starting...");

    let args = cli::parse_args_from_parsed(args_for_verbose)?;
    let report = cli::run(args)?;

    match report.status {
        RunStatus::Completed => info!("Documentation generated successfully"),
        RunStatus::CompletedWithWarnings => info!(
            "Documentation generated with {} warnings",
            report.warnings.len()
        ),
    }

    Ok(())
}
