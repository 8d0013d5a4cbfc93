//! Unit tests for the snapshot CLI helpers.

use std::sync::atomic::{AtomicUsize, Ordering};

use camino::Utf8PathBuf;
use cap_std::{ambient_authority, fs::Dir};
use rstest::{fixture, rstest};

use super::*;
use crate::ExamplePoiSeed;

const REGISTRY_JSON: &str = r#"{
    "version": 1,
    "area": {"latitude": 3.848, "longitude": 11.5021, "radiusKm": 5.0},
    "categories": [{"name": "restaurant"}, {"name": "hotel"}],
    "seeds": [{"name": "city", "seed": 2026, "poiCount": 6}]
}"#;

/// Scratch directory under `target/` removed on drop.
struct Workspace {
    root: Utf8PathBuf,
}

impl Workspace {
    fn path(&self, name: &str) -> Utf8PathBuf {
        self.root.join(name)
    }

    fn dir(&self) -> Dir {
        Dir::open_ambient_dir(&self.root, ambient_authority()).expect("open workspace")
    }

    fn options(&self, seed_name: &str) -> Options {
        Options {
            registry_path: self.path("seeds.json"),
            seed_name: seed_name.to_owned(),
            output_path: self.path("pois.json"),
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if let Ok(target) = Dir::open_ambient_dir("target", ambient_authority()) {
            let relative = self
                .root
                .strip_prefix("target")
                .unwrap_or(self.root.as_path());
            drop(target.remove_dir_all(relative));
        }
    }
}

#[fixture]
fn workspace() -> Workspace {
    static COUNTER: AtomicUsize = AtomicUsize::new(0);
    let counter = COUNTER.fetch_add(1, Ordering::Relaxed);
    let root = Utf8PathBuf::from("target")
        .join("example-data-tests")
        .join(format!("snapshot-{}-{counter}", std::process::id()));
    Dir::open_ambient_dir(".", ambient_authority())
        .expect("open cwd")
        .create_dir_all(&root)
        .expect("create workspace");
    let workspace = Workspace { root };
    workspace
        .dir()
        .write("seeds.json", REGISTRY_JSON)
        .expect("write registry");
    workspace
}

fn args(values: &[&str]) -> impl Iterator<Item = String> {
    values
        .iter()
        .map(|value| (*value).to_owned())
        .collect::<Vec<_>>()
        .into_iter()
}

#[rstest]
fn parse_args_returns_help_for_help_flag() {
    let outcome = parse_args(args(&["--registry", "a.json", "-h"])).expect("parse args");
    assert_eq!(outcome, ParseOutcome::Help);
}

#[rstest]
#[case(&["--seed-name", "x", "--output", "o.json"], CliError::MissingRegistryPath)]
#[case(&["--registry", "r.json", "--output", "o.json"], CliError::MissingSeedName)]
#[case(&["--registry", "r.json", "--seed-name", "x"], CliError::MissingOutputPath)]
#[case(&["--output"], CliError::MissingValue { flag: "--output" })]
#[case(&["--count", "3"], CliError::UnknownArgument { value: "--count".to_owned() })]
fn parse_args_reports_errors(#[case] input: &[&str], #[case] expected: CliError) {
    assert_eq!(parse_args(args(input)), Err(expected));
}

#[rstest]
fn writes_a_decodable_snapshot(workspace: Workspace) {
    let options = workspace.options("city");

    let snapshot = write_snapshot(&options).expect("snapshot written");

    assert_eq!(snapshot.poi_count, 6);
    let written = workspace
        .dir()
        .read_to_string("pois.json")
        .expect("read snapshot");
    let pois: Vec<ExamplePoiSeed> = serde_json::from_str(&written).expect("decode snapshot");
    assert_eq!(pois.len(), 6);
    assert!(success_message(&snapshot, options.output_path()).contains("6 POIs"));
}

#[rstest]
fn rewriting_replaces_the_previous_snapshot(workspace: Workspace) {
    workspace
        .dir()
        .write("pois.json", "stale")
        .expect("seed stale file");

    write_snapshot(&workspace.options("city")).expect("snapshot written");

    let written = workspace
        .dir()
        .read_to_string("pois.json")
        .expect("read snapshot");
    assert!(written.starts_with('['));
}

#[rstest]
fn unknown_seed_is_reported(workspace: Workspace) {
    let error = write_snapshot(&workspace.options("nowhere")).expect_err("unknown seed");
    assert_eq!(
        error,
        CliError::Registry {
            source: RegistryError::SeedNotFound {
                name: "nowhere".to_owned()
            }
        }
    );
}
