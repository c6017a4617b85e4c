//! CLI argument definitions using clap
//!
//! Commands:
//! - aeroquery run --config <path> [--pipeline <path>]
//! - aeroquery explain [--pipeline <path>]

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// aeroquery - run query pipelines against a JSON collection
#[derive(Parser, Debug)]
#[command(name = "aeroquery")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Load the collection, run a pipeline and print its result
    Run {
        /// Path to configuration file
        #[arg(long, default_value = "./aeroquery.json")]
        config: PathBuf,

        /// JSON array of stages; read from stdin when absent
        #[arg(long)]
        pipeline: Option<PathBuf>,
    },

    /// Print a pipeline's stages without running it
    Explain {
        /// JSON array of stages; read from stdin when absent
        #[arg(long)]
        pipeline: Option<PathBuf>,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
