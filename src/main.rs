//! docquery CLI entry point
//!
//! Parses arguments and dispatches via `cli::run`. Errors are reported on
//! stderr with a non-zero exit code.

use docquery::cli;

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
