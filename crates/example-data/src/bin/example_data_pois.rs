//! Writes a generated POI snapshot for a named registry seed.
//!
//! This binary delegates to `example_data::snapshot_cli` so the behaviour is
//! testable without spawning a process.

use std::env;
use std::io::{self, Write};
use std::process::ExitCode;

use example_data::snapshot_cli::{
    CliError, ParseOutcome, parse_args, success_message, write_snapshot,
};

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if let Err(write_err) = writeln!(io::stderr().lock(), "{err}") {
                drop(write_err);
            }
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), CliError> {
    match parse_args(env::args().skip(1))? {
        ParseOutcome::Help => {
            print_usage(io::stdout().lock());
            Ok(())
        }
        ParseOutcome::Options(options) => {
            let snapshot = write_snapshot(&options)?;
            let message = success_message(&snapshot, options.output_path());
            if let Err(err) = writeln!(io::stdout().lock(), "{message}") {
                drop(err);
            }
            Ok(())
        }
    }
}

fn print_usage(mut out: impl Write) {
    let usage = concat!(
        "Usage: example-data-pois --registry <path> --seed-name <name> --output <path>\n",
        "\n",
        "Options:\n",
        "  --registry <path>    Path to the seed registry JSON file\n",
        "  --seed-name <name>   Registry seed to generate POIs from\n",
        "  --output <path>      File to write the POI JSON array to\n",
        "  -h, --help           Print this help output\n",
    );
    if let Err(err) = out.write_all(usage.as_bytes()) {
        drop(err);
    }
}
