//! routedoc - API documentation generated from application routes, with hand edits kept
//! across regenerations.
//!
//! Every run extracts documentation for each route through a configurable pipeline of
//! adapters, merges the result with the edits a user made to the previous output, persists
//! it as one YAML file per group and hands an ordered view to renderers.
//!
//! # Architecture
//!
//! 1. [`route`] - Route records and where they come from (a YAML manifest)
//! 2. [`scanner`] and [`parser`] - Find and parse handler sources, index their doc comments
//! 3. [`strategy`] - Per-stage adapter pipeline with `only`/`except` filters and overrides
//! 4. [`assembler`] - Runs every stage for every route, in parallel
//! 5. [`reconcile`] - Three-way merge against the previous cache and latest snapshots
//! 6. [`snapshot`] - Reads and rewrites the snapshot trees
//! 7. [`ordering`] - Final order of groups, subgroups and endpoints
//! 8. [`generator`] - Ties one run together and reports on it
//!
//! # Example Usage
//!
//! ```no_run
//! use routedoc::config::Config;
//! use routedoc::generator::DocGenerator;
//! use routedoc::route::{ManifestRouteSource, RouteSource};
//! use std::path::{Path, PathBuf};
//!
//! let config = Config::load(None).unwrap();
//! let routes = ManifestRouteSource::new(PathBuf::from("routes.yaml")).routes().unwrap();
//!
//! let generator = DocGenerator::for_project(config, Some(Path::new("./my-project"))).unwrap();
//! let output = generator.run(&routes, false).unwrap();
//! for group in &output.groups {
//!     println!("{}: {} endpoints", group.name, group.endpoints.len());
//! }
//! ```
//!
//! # Command-Line Interface
//!
//! For command-line usage, see the [`cli`] module which provides a complete CLI application.

pub mod assembler;
pub mod cli;
pub mod config;
pub mod error;
pub mod generator;
pub mod model;
pub mod ordering;
pub mod parser;
pub mod reconcile;
pub mod route;
pub mod scanner;
pub mod serializer;
pub mod snapshot;
pub mod strategy;
