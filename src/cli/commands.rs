//! CLI command implementations
//!
//! Commands compile offline; none of them connects to a storage engine.

use std::path::Path;

use serde_json::{json, Value};

use crate::config::StoreConfig;
use crate::query::{Compiler, Cursor, Predicate};

use super::args::Command;
use super::errors::CliResult;
use super::io::{read_input, write_error, write_response};

/// Main CLI entry point. Failures are reported as an error envelope on
/// stdout and returned.
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    match run_command(cli.command) {
        Ok(()) => Ok(()),
        Err(e) => {
            write_error(e.code_str(), e.message())?;
            Err(e)
        }
    }
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Compile { collection } => {
            let input = read_input()?;
            write_response(compile(&collection, &input)?)
        }
        Command::Pipeline { collection } => {
            let input = read_input()?;
            write_response(pipeline(&collection, &input)?)
        }
        Command::CheckConfig { config } => write_response(check_config(&config)?),
    }
}

fn compile_input(collection: &str, input: &Value) -> CliResult<Cursor> {
    let predicates = Predicate::parse_sequence(input)?;
    Ok(Compiler::compile(collection, &predicates)?)
}

/// Compile a predicate sequence into the cursor's inspection form
pub fn compile(collection: &str, input: &Value) -> CliResult<Value> {
    Ok(compile_input(collection, input)?.to_value())
}

/// Compile a predicate sequence into an aggregation pipeline
pub fn pipeline(collection: &str, input: &Value) -> CliResult<Value> {
    let stages = compile_input(collection, input)?.pipeline();
    Ok(json!({ "collection": collection, "pipeline": stages }))
}

/// Load and validate a configuration file, then apply its log level
pub fn check_config(path: &Path) -> CliResult<Value> {
    let config = StoreConfig::load(path)?;
    config.apply_logging()?;
    Ok(json!({
        "valid": true,
        "url": config.url,
        "database": config.database,
        "log_level": config.log_level,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_compile_coalesces_ne() {
        let cursor = compile(
            "users",
            &json!([
                {"type": "ne", "key": "s", "val": 1},
                {"type": "ne", "key": "s", "val": 2},
                {"type": "limit", "limitAmount": 3}
            ]),
        )
        .unwrap();

        assert_eq!(cursor["collection"], "users");
        assert_eq!(cursor["filter"], json!({"s": {"$nin": [1, 2]}}));
        assert_eq!(cursor["limit"], 3);
    }

    #[test]
    fn test_pipeline_command() {
        let out = pipeline("users", &json!({"pts": [{"type": "sort", "sortKey": "a"}]})).unwrap();
        assert_eq!(
            out["pipeline"],
            json!([{"$match": {}}, {"$sort": {"a": 1}}])
        );
    }

    #[test]
    fn test_malformed_predicate_code() {
        let err = compile("users", &json!([{"type": "nope"}])).unwrap_err();
        assert_eq!(err.code_str(), "DOCQ_MALFORMED_PREDICATE");
    }

    #[test]
    fn test_check_config() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(br#"{"database": "shop"}"#).unwrap();

        let out = check_config(file.path()).unwrap();
        assert_eq!(out["database"], "shop");
        assert_eq!(out["url"], "memory://default");

        let mut bad = NamedTempFile::new().unwrap();
        bad.write_all(br#"{"log_level": "loud"}"#).unwrap();
        assert_eq!(
            check_config(bad.path()).unwrap_err().code_str(),
            "DOCQ_CLI_CONFIG_ERROR"
        );
    }
}
