//! CLI argument definitions using clap
//!
//! Commands:
//! - esgeo compile --schema <path>
//! - esgeo precision --bbox <minx,miny,maxx,maxy> [--max-bins <n>] [--config <path>]

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// esgeo - predicate compilation for geospatial search layers
#[derive(Parser, Debug)]
#[command(name = "esgeo")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compile a filter read from stdin into a native query
    Compile {
        /// Path to the layer schema (JSON)
        #[arg(long)]
        schema: PathBuf,
    },

    /// Resolve the geohash grid precision for an envelope
    Precision {
        /// Envelope as minx,miny,maxx,maxy
        #[arg(long, allow_hyphen_values = true)]
        bbox: String,

        /// Cell budget; the configured grid size when omitted
        #[arg(long)]
        max_bins: Option<u64>,

        /// Path to the store configuration file
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
