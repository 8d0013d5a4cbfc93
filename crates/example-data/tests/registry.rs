//! Integration tests for loading registries from disk.

#![expect(
    clippy::expect_used,
    reason = "test code uses expect for clear failure messages"
)]


use camino::Utf8Path;
use example_data::{RegistryError, SeedRegistry, generate_example_pois};
use rstest::rstest;
use test_support::{SHIPPED_REGISTRY, open_parent, unique_temp_path};

fn load(path: &Utf8Path) -> Result<SeedRegistry, RegistryError> {
    let (dir, file_name) = open_parent(path).expect("open registry directory");
    SeedRegistry::from_file(&dir, file_name)
}

#[rstest]
fn shipped_registry_loads_and_generates() {
    let registry = load(Utf8Path::new(SHIPPED_REGISTRY)).expect("shipped registry is valid");
    let seed = registry.find_seed("yaounde-centre").expect("seed exists");

    let pois = generate_example_pois(&registry, seed).expect("generation succeeds");

    assert_eq!(pois.len(), 150);
    assert_eq!(registry.categories().len(), 6);
}

#[rstest]
fn missing_file_is_an_io_error() {
    let path = unique_temp_path("registry-missing", "absent.json").expect("temp path");

    let result = load(&path);

    assert!(
        matches!(result, Err(RegistryError::IoError { ref path, .. }) if path.as_str() == "absent.json"),
        "unexpected result: {result:?}"
    );
}

#[rstest]
#[case::truncated("{\"version\": 1,")]
#[case::wrong_shape("[]")]
fn malformed_file_is_a_parse_error(#[case] contents: &str) {
    let path = unique_temp_path("registry-malformed", "seeds.json").expect("temp path");
    let (dir, file_name) = open_parent(&path).expect("open registry directory");
    dir.write(file_name, contents).expect("write registry");

    let result = SeedRegistry::from_file(&dir, file_name);

    assert!(matches!(result, Err(RegistryError::ParseError { .. })));
}
