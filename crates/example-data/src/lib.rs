//! Deterministic example POI generation for demonstrations and tests.
//!
//! POIs are generated from a JSON seed registry that names a circular area,
//! weighted categories and a set of named seeds. The crate is independent of
//! engine types; its output uses the POI API's camelCase wire format.
//!
//! # Overview
//!
//! The crate supports:
//!
//! - Loading seed registries from JSON files
//! - Deterministic POI generation using named seeds
//! - Category allocation proportional to registry weights
//! - Writing snapshots atomically (see [`snapshot_cli`])
//!
//! # Example
//!
//! ```
//! use example_data::{SeedRegistry, generate_example_pois};
//!
//! let json = r#"{
//!     "version": 1,
//!     "area": {"latitude": 3.848, "longitude": 11.5021, "radiusKm": 5.0},
//!     "categories": [{"name": "restaurant"}],
//!     "seeds": [{"name": "test-seed", "seed": 42, "poiCount": 3}]
//! }"#;
//!
//! let registry = SeedRegistry::from_json(json).expect("valid registry");
//! let seed_def = registry.find_seed("test-seed").expect("seed exists");
//! let pois = generate_example_pois(&registry, seed_def).expect("generation succeeds");
//!
//! assert_eq!(pois.len(), 3);
//! ```

mod atomic_io;
mod error;
mod generator;
mod registry;
mod seed;
pub mod snapshot_cli;
mod validation;

pub use error::{GenerationError, RegistryError};
pub use generator::generate_example_pois;
pub use registry::{CategoryWeight, GenerationArea, SeedDefinition, SeedRegistry};
pub use seed::ExamplePoiSeed;
pub use validation::{POI_NAME_MAX, POI_NAME_MIN, is_valid_category, is_valid_poi_name};
