//! CLI module for docquery
//!
//! Provides command-line interface for:
//! - compile: Compile a predicate sequence and print the cursor
//! - pipeline: Compile a predicate sequence and print the pipeline form
//! - check-config: Validate a configuration file

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{check_config, compile, pipeline, run, run_command};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{read_input, write_error, write_response};
