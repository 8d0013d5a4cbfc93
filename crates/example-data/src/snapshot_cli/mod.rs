//! CLI support for writing generated POI snapshots.
//!
//! The binary delegates to these functions so they can be exercised in tests
//! without spawning a subprocess.

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs::Dir};

use crate::atomic_io::write_atomic;
use crate::error::RegistryError;
use crate::generator::generate_example_pois;
use crate::registry::SeedRegistry;

mod error;

pub use error::CliError;

/// Parsed options for the snapshot CLI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    registry_path: Utf8PathBuf,
    seed_name: String,
    output_path: Utf8PathBuf,
}

impl Options {
    /// Returns the registry path to read.
    #[must_use]
    pub fn registry_path(&self) -> &Utf8Path {
        &self.registry_path
    }

    /// Returns the seed to generate from.
    #[must_use]
    pub fn seed_name(&self) -> &str {
        &self.seed_name
    }

    /// Returns the path the snapshot is written to.
    #[must_use]
    pub fn output_path(&self) -> &Utf8Path {
        &self.output_path
    }
}

/// Outcome of parsing CLI arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    /// Show help output and exit successfully.
    Help,
    /// Continue with the parsed options.
    Options(Options),
}

/// Result of writing a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// Seed the POIs were generated from.
    pub seed_name: String,
    /// Number of POIs written.
    pub poi_count: usize,
}

/// Parses CLI arguments.
///
/// # Errors
///
/// Returns [`CliError`] when required flags are missing or unknown flags are
/// supplied.
///
/// # Example
///
/// ```
/// use example_data::snapshot_cli::{ParseOutcome, parse_args};
///
/// let args = ["--registry", "seeds.json", "--seed-name", "city", "--output", "pois.json"]
///     .map(str::to_owned);
///
/// let outcome = parse_args(args.into_iter()).expect("parse args");
/// assert!(matches!(outcome, ParseOutcome::Options(_)));
/// ```
pub fn parse_args<I>(mut args: I) -> Result<ParseOutcome, CliError>
where
    I: Iterator<Item = String>,
{
    let mut registry_path: Option<Utf8PathBuf> = None;
    let mut seed_name: Option<String> = None;
    let mut output_path: Option<Utf8PathBuf> = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => return Ok(ParseOutcome::Help),
            "--registry" => {
                registry_path = Some(Utf8PathBuf::from(next_value(&mut args, "--registry")?));
            }
            "--seed-name" => seed_name = Some(next_value(&mut args, "--seed-name")?),
            "--output" => {
                output_path = Some(Utf8PathBuf::from(next_value(&mut args, "--output")?));
            }
            _ => return Err(CliError::UnknownArgument { value: arg }),
        }
    }

    Ok(ParseOutcome::Options(Options {
        registry_path: registry_path.ok_or(CliError::MissingRegistryPath)?,
        seed_name: seed_name.ok_or(CliError::MissingSeedName)?,
        output_path: output_path.ok_or(CliError::MissingOutputPath)?,
    }))
}

/// Generates the named seed's POIs and writes them as a JSON array.
///
/// # Errors
///
/// Returns [`CliError`] when the registry cannot be read, the seed is
/// unknown, generation fails or the output cannot be written.
pub fn write_snapshot(options: &Options) -> Result<Snapshot, CliError> {
    let (registry_dir, registry_file) = open_parent(&options.registry_path, |message| {
        RegistryError::IoError {
            path: options.registry_path.clone(),
            message,
        }
    })?;
    let registry = SeedRegistry::from_file(&registry_dir, registry_file)?;
    let seed_def = registry.find_seed(&options.seed_name)?;
    let pois = generate_example_pois(&registry, seed_def)?;
    let mut body = serde_json::to_vec_pretty(&pois).map_err(|err| CliError::Serialise {
        message: err.to_string(),
    })?;
    body.push(b'\n');

    let (output_dir, output_file) = open_parent(&options.output_path, |message| {
        RegistryError::WriteError {
            path: options.output_path.clone(),
            message,
        }
    })?;
    write_atomic(&output_dir, output_file, &body)?;

    Ok(Snapshot {
        seed_name: seed_def.name().to_owned(),
        poi_count: pois.len(),
    })
}

/// Formats the success message emitted by the CLI.
///
/// ```
/// use camino::Utf8Path;
/// use example_data::snapshot_cli::{Snapshot, success_message};
///
/// let snapshot = Snapshot { seed_name: "city".to_owned(), poi_count: 150 };
/// let message = success_message(&snapshot, Utf8Path::new("pois.json"));
///
/// assert_eq!(message, "Wrote 150 POIs from seed \"city\" to pois.json");
/// ```
#[must_use]
pub fn success_message(snapshot: &Snapshot, output_path: &Utf8Path) -> String {
    format!(
        "Wrote {} POIs from seed \"{}\" to {output_path}",
        snapshot.poi_count, snapshot.seed_name
    )
}

fn open_parent<'a>(
    path: &'a Utf8Path,
    error: impl Fn(String) -> RegistryError,
) -> Result<(Dir, &'a Utf8Path), RegistryError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    };
    let file_name = path
        .file_name()
        .map(Utf8Path::new)
        .ok_or_else(|| error("path must name a file".to_owned()))?;
    let dir = Dir::open_ambient_dir(parent, ambient_authority())
        .map_err(|err| error(err.to_string()))?;
    Ok((dir, file_name))
}

fn next_value<I>(args: &mut I, flag: &'static str) -> Result<String, CliError>
where
    I: Iterator<Item = String>,
{
    args.next().ok_or(CliError::MissingValue { flag })
}

#[cfg(test)]
mod tests;
