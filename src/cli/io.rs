//! JSON I/O for the CLI
//!
//! - Input: one JSON array of stages, from a file or stdin
//! - Output: one JSON document on stdout
//! - UTF-8 only

use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;

use serde::Serialize;

use crate::query::Stage;

use super::errors::{CliError, CliResult};

/// Reads a pipeline description from `path`, or stdin when `None`
pub fn read_pipeline(path: Option<&Path>) -> CliResult<Vec<Stage>> {
    let text = match path {
        Some(path) => fs::read_to_string(path).map_err(|e| {
            CliError::pipeline_error(format!("cannot read {}: {}", path.display(), e))
        })?,
        None => {
            let mut text = String::new();
            io::stdin().lock().read_to_string(&mut text)?;
            text
        }
    };
    parse_pipeline(&text)
}

pub fn parse_pipeline(text: &str) -> CliResult<Vec<Stage>> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(text).map_err(|e| CliError::pipeline_error(format!("invalid pipeline: {}", e)))
}

/// Writes `value` as pretty JSON followed by a newline
pub fn write_json<T: Serialize>(value: &T) -> CliResult<()> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value)
        .map_err(|e| CliError::io_error(format!("cannot encode result: {}", e)))?;
    writeln!(stdout)?;
    stdout.flush()?;
    Ok(())
}
