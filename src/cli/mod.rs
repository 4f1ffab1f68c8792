//! CLI module for esgeo
//!
//! Provides command-line access to:
//! - compile: predicate and schema to native query
//! - precision: geohash grid precision for an envelope

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{compile, compile_request, precision, resolve_precision, run, run_command};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{read_request, write_error, write_response};
