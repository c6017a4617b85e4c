//! CLI command implementations
//!
//! `run` opens the collection (spawning its worker and loading the dataset),
//! replays the pipeline once and prints the result. `explain` only parses
//! and prints the stages.

use std::path::Path;

use serde_json::json;
use tokio::runtime::Runtime;

use crate::config::CollectionConfig;
use crate::observability::{log_event, set_min_severity, Event};
use crate::query::{describe_stages, DataCollection, Stage};

use super::args::Command;
use super::errors::{CliError, CliResult};
use super::io::{read_pipeline, write_json};

pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Run { config, pipeline } => run_pipeline(&config, pipeline.as_deref()),
        Command::Explain { pipeline } => explain(pipeline.as_deref()),
    }
}

/// Loads the collection and runs one pipeline against it
pub fn run_pipeline(config_path: &Path, pipeline: Option<&Path>) -> CliResult<()> {
    let config = CollectionConfig::load(config_path)?;
    set_min_severity(config.log_level);
    log_event(Event::ConfigLoaded, &[("path", &config_path.display().to_string())]);

    let stages = read_pipeline(pipeline)?;
    let runtime = Runtime::new().map_err(|e| CliError::io_error(format!("cannot start runtime: {}", e)))?;
    let result = runtime.block_on(execute(config, stages))?;
    write_json(&result)
}

async fn execute(config: CollectionConfig, stages: Vec<Stage>) -> CliResult<serde_json::Value> {
    let collection = DataCollection::open(config).await?;
    let data = collection.pipeline(stages).result().await?;
    let metrics = collection.metrics().snapshot();
    Ok(json!({
        "records": collection.len(),
        "result": data,
        "requests": metrics.requests_sent,
    }))
}

/// Prints the stage list without touching the dataset
pub fn explain(pipeline: Option<&Path>) -> CliResult<()> {
    let stages = read_pipeline(pipeline)?;
    let plan = if stages.is_empty() {
        vec!["1. all()".to_string()]
    } else {
        describe_stages(&stages)
    };
    write_json(&json!({ "stages": plan }))
}
