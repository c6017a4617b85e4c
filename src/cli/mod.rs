//! CLI module for aeroquery
//!
//! - run: load a collection and execute one pipeline
//! - explain: print a pipeline without executing it

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{explain, run, run_command, run_pipeline};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{parse_pipeline, read_pipeline, write_json};
