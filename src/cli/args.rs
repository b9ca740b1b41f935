//! CLI argument definitions using clap
//!
//! Commands:
//! - docquery compile --collection <name>   (predicates on stdin)
//! - docquery pipeline --collection <name>  (predicates on stdin)
//! - docquery check-config --config <path>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// docquery - compile predicate sequences into document store queries
#[derive(Parser, Debug)]
#[command(name = "docquery")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compile a predicate sequence read from stdin and print the cursor
    Compile {
        /// Collection the cursor targets
        #[arg(long, default_value = "items")]
        collection: String,
    },

    /// Compile a predicate sequence read from stdin and print the pipeline
    Pipeline {
        /// Collection the pipeline targets
        #[arg(long, default_value = "items")]
        collection: String,
    },

    /// Validate a configuration file
    CheckConfig {
        /// Path to configuration file
        #[arg(long, default_value = "./docquery.json")]
        config: PathBuf,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
