//! esgeo CLI entry point
//!
//! Parses arguments and dispatches through `cli::run`. Failures are
//! reported as an error line on stdout plus a message on stderr, with a
//! non-zero exit.

use esgeo::cli;

fn main() {
    if let Err(e) = cli::run() {
        let _ = cli::write_error(e.code_str(), e.message());
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
