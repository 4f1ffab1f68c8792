//! CLI command implementations
//!
//! Commands are thin: they load files, hand the request to the library and
//! print one JSON response line.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::StoreConfig;
use crate::filter::{FeatureSchema, FilterCompiler, NativeOverride, Predicate};
use crate::geo::compute_precision;
use crate::geo::geometry::parse_bbox;
use crate::observability::{LogSink, Logger};

use super::args::Command;
use super::errors::{CliError, CliResult};
use super::io::{read_request, write_response};

/// Request read by `compile`
#[derive(Debug, Deserialize)]
pub struct CompileRequest {
    pub filter: Predicate,
    #[serde(default)]
    pub native: Option<NativeOverride>,
}

/// Parse arguments and run the command
///
/// Stdout carries only the response line; logs go to stderr.
pub fn run() -> CliResult<()> {
    Logger::set_sink(LogSink::Stderr);
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Compile { schema } => compile(&schema),
        Command::Precision {
            bbox,
            max_bins,
            config,
        } => precision(&bbox, max_bins, config.as_deref()),
    }
}

/// Compile the filter on stdin against a layer schema
pub fn compile(schema_path: &Path) -> CliResult<()> {
    let schema = load_schema(schema_path)?;
    let request = read_request()?;
    write_response(compile_request(&schema, request)?)
}

/// Compile one request document
pub fn compile_request(schema: &FeatureSchema, request: Value) -> CliResult<Value> {
    let request: CompileRequest = serde_json::from_value(request)?;
    let compiled = FilterCompiler::new(schema).compile(&request.filter, request.native.as_ref())?;
    Ok(serde_json::to_value(compiled)?)
}

/// Resolve the grid precision for an envelope
pub fn precision(bbox: &str, max_bins: Option<u64>, config_path: Option<&Path>) -> CliResult<()> {
    let max_bins = match max_bins {
        Some(n) => n,
        None => load_config(config_path)?.grid_size,
    };
    write_response(resolve_precision(bbox, max_bins)?)
}

pub fn resolve_precision(bbox: &str, max_bins: u64) -> CliResult<Value> {
    if max_bins == 0 {
        return Err(CliError::invalid_input("max-bins must be positive"));
    }
    let envelope = parse_bbox(bbox)?;
    Ok(json!({ "precision": compute_precision(&envelope, max_bins) }))
}

fn load_schema(path: &Path) -> CliResult<FeatureSchema> {
    let text = fs::read_to_string(path).map_err(|e| {
        CliError::config_error(format!("Cannot read schema '{}': {}", path.display(), e))
    })?;
    serde_json::from_str(&text)
        .map_err(|e| CliError::config_error(format!("Invalid schema '{}': {}", path.display(), e)))
}

fn load_config(path: Option<&Path>) -> CliResult<StoreConfig> {
    match path {
        Some(path) => Ok(StoreConfig::load(path)?),
        None => Ok(StoreConfig::default()),
    }
}
