use crate::config::Config;
use crate::generator::{DocGenerator, RunReport, RunStatus};
use crate::route::{ManifestRouteSource, RouteSource};
use crate::serializer::{serialize_json, serialize_yaml, write_to_file, DocumentView};
use anyhow::Result;
use clap::{Parser, ValueEnum};
use log::{debug, info, warn};
use std::path::PathBuf;

/// routedoc - Generate API documentation from application routes, keeping hand edits
#[derive(Parser, Debug)]
#[command(name = "routedoc")]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to the YAML route manifest
    #[arg(value_name = "ROUTES_FILE")]
    pub routes_file: PathBuf,

    /// Configuration file (defaults to ./routedoc.yaml when present)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Rust project whose handler doc comments should be read
    #[arg(short = 'p', long = "project", value_name = "DIR")]
    pub project: Option<PathBuf>,

    /// Directory for the snapshot trees (overrides `output_dir` from the config)
    #[arg(short = 'o', long = "output-dir", value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Discard any changes made to the snapshot files
    #[arg(long = "force")]
    pub force: bool,

    /// Write the ordered documentation to this file
    #[arg(short = 'e', long = "emit", value_name = "FILE")]
    pub emit: Option<PathBuf>,

    /// Format of the emitted documentation (yaml or json)
    #[arg(short = 'f', long = "format", value_enum, default_value = "yaml")]
    pub output_format: OutputFormat,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// YAML format
    Yaml,
    /// JSON format
    Json,
}

/// Validate and log already-parsed arguments
pub fn parse_args_from_parsed(args: CliArgs) -> Result<CliArgs> {
    debug!("Parsed arguments: {:?}", args);

    if !args.routes_file.is_file() {
        anyhow::bail!("Route manifest does not exist: {}", args.routes_file.display());
    }

    if let Some(ref project) = args.project {
        if !project.is_dir() {
            anyhow::bail!("Project path is not a directory: {}", project.display());
        }
    }

    info!("Route manifest: {}", args.routes_file.display());
    if let Some(ref project) = args.project {
        info!("Project path: {}", project.display());
    } else {
        info!("Project path: none, doc comments are not read");
    }
    if let Some(ref emit) = args.emit {
        info!("Emitting {:?} to {}", args.output_format, emit.display());
    }

    Ok(args)
}

/// Run the main workflow
pub fn run(args: CliArgs) -> Result<RunReport> {
    // Step 1: Load configuration
    let mut config = Config::load(args.config.as_deref())?;
    if let Some(ref output_dir) = args.output_dir {
        config.output_dir = output_dir.clone();
    }
    info!("Output directory: {}", config.output_dir.display());
    let title = config.title.clone();

    // Step 2: Read routes
    let routes = ManifestRouteSource::new(args.routes_file.clone()).routes()?;
    info!("Found {} routes", routes.len());
    if routes.is_empty() {
        warn!("No routes found in {}", args.routes_file.display());
    }

    // Step 3: Resolve strategies, fatal on any configuration error
    let generator = DocGenerator::for_project(config, args.project.as_deref())?;

    // Step 4: Extract, reconcile, persist and order
    if args.force {
        info!("--force given, previous edits will be overwritten");
    }
    let output = generator.run(&routes, args.force)?;

    // Step 5: Emit the ordered documentation
    if let Some(ref emit) = args.emit {
        let view = DocumentView::new(&title, &output.groups);
        let content = match args.output_format {
            OutputFormat::Yaml => serialize_yaml(&view)?,
            OutputFormat::Json => serialize_json(&view)?,
        };
        write_to_file(&content, emit)?;
        info!("Wrote documentation to {}", emit.display());
    }

    // Step 6: Display summary
    let report = output.report;
    info!("Summary:");
    info!("  - Endpoints documented: {}", report.processed);
    info!("  - Routes skipped: {}", report.skipped);
    info!("  - Routes failed: {}", report.failed);
    info!("  - Endpoints with preserved edits: {}", report.preserved);
    info!("  - Groups: {}", output.groups.len());
    if report.status == RunStatus::CompletedWithWarnings {
        for warning in &report.warnings {
            warn!("{}", warning);
        }
    }

    Ok(report)
}
