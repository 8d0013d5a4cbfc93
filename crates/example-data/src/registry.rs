//! Seed registry types and JSON parsing.
//!
//! A registry names the generation area, the categories to draw from (with
//! relative weights) and a set of named seeds. The same seed always yields
//! the same POIs.

use camino::Utf8Path;
use cap_std::fs::Dir;
use serde::Deserialize;

use crate::error::RegistryError;
use crate::validation::is_valid_category;

/// Current supported registry version.
const SUPPORTED_VERSION: u32 = 1;

/// A seed registry containing the generation area, categories and named
/// seeds.
///
/// # Example
///
/// ```
/// use example_data::SeedRegistry;
///
/// let json = r#"{
///     "version": 1,
///     "area": {"latitude": 3.848, "longitude": 11.5021, "radiusKm": 5.0},
///     "categories": [{"name": "restaurant"}, {"name": "hotel", "weight": 2}],
///     "seeds": [{"name": "test", "seed": 42, "poiCount": 5}]
/// }"#;
///
/// let registry = SeedRegistry::from_json(json).expect("valid registry");
/// assert_eq!(registry.seeds().len(), 1);
/// assert_eq!(registry.categories().len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct SeedRegistry {
    version: u32,
    area: GenerationArea,
    categories: Vec<CategoryWeight>,
    seeds: Vec<SeedDefinition>,
}

impl SeedRegistry {
    /// Parses a seed registry from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] if:
    /// - The JSON is malformed or required fields are missing
    /// - The version is unsupported
    /// - The area centre is not a valid coordinate or the radius is not
    ///   positive
    /// - Categories are empty, malformed, duplicated or zero-weighted
    /// - The seeds array is empty
    pub fn from_json(json: &str) -> Result<Self, RegistryError> {
        let raw: RawSeedRegistry =
            serde_json::from_str(json).map_err(|e| RegistryError::ParseError {
                message: e.to_string(),
            })?;

        Self::from_raw(raw)
    }

    /// Loads a seed registry from `path`, resolved inside `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] if the file cannot be read or parsed.
    pub fn from_file(dir: &Dir, path: &Utf8Path) -> Result<Self, RegistryError> {
        let contents = dir
            .read_to_string(path)
            .map_err(|e| RegistryError::IoError {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        Self::from_json(&contents)
    }

    fn from_raw(raw: RawSeedRegistry) -> Result<Self, RegistryError> {
        if raw.version != SUPPORTED_VERSION {
            return Err(RegistryError::UnsupportedVersion {
                expected: SUPPORTED_VERSION,
                actual: raw.version,
            });
        }

        let area = GenerationArea::validated(raw.area)?;
        let categories = validate_categories(raw.categories)?;

        if raw.seeds.is_empty() {
            return Err(RegistryError::EmptySeeds);
        }

        let seeds = raw
            .seeds
            .into_iter()
            .map(|s| SeedDefinition {
                name: s.name,
                seed: s.seed,
                poi_count: s.poi_count,
            })
            .collect();

        Ok(Self {
            version: raw.version,
            area,
            categories,
            seeds,
        })
    }

    /// Returns the registry version.
    #[must_use]
    pub const fn version(&self) -> u32 {
        self.version
    }

    /// Returns the area POIs are scattered over.
    #[must_use]
    pub const fn area(&self) -> &GenerationArea {
        &self.area
    }

    /// Returns the weighted categories, in registry order.
    #[must_use]
    pub fn categories(&self) -> &[CategoryWeight] {
        &self.categories
    }

    /// Returns all seed definitions.
    #[must_use]
    pub fn seeds(&self) -> &[SeedDefinition] {
        &self.seeds
    }

    /// Finds a seed definition by name.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::SeedNotFound`] if no seed with the given name
    /// exists.
    pub fn find_seed(&self, name: &str) -> Result<&SeedDefinition, RegistryError> {
        self.seeds
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| RegistryError::SeedNotFound {
                name: name.to_owned(),
            })
    }
}

fn validate_categories(raw: Vec<RawCategory>) -> Result<Vec<CategoryWeight>, RegistryError> {
    if raw.is_empty() {
        return Err(RegistryError::EmptyCategories);
    }
    let mut categories: Vec<CategoryWeight> = Vec::with_capacity(raw.len());
    for (index, category) in raw.into_iter().enumerate() {
        if !is_valid_category(&category.name) {
            return Err(RegistryError::InvalidCategory {
                index,
                value: category.name,
            });
        }
        if categories.iter().any(|seen| seen.name == category.name) {
            return Err(RegistryError::DuplicateCategory {
                name: category.name,
            });
        }
        if category.weight == 0 {
            return Err(RegistryError::ZeroWeight {
                name: category.name,
            });
        }
        categories.push(CategoryWeight {
            name: category.name,
            weight: category.weight,
        });
    }
    Ok(categories)
}

/// Circular area generated POIs fall inside.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationArea {
    latitude: f64,
    longitude: f64,
    radius_km: f64,
}

impl GenerationArea {
    fn validated(raw: RawArea) -> Result<Self, RegistryError> {
        if !(-90.0..=90.0).contains(&raw.latitude) || !(-180.0..=180.0).contains(&raw.longitude)
        {
            return Err(RegistryError::InvalidArea {
                message: format!(
                    "centre ({}, {}) is not a valid coordinate",
                    raw.latitude, raw.longitude
                ),
            });
        }
        if !raw.radius_km.is_finite() || raw.radius_km <= 0.0 {
            return Err(RegistryError::InvalidArea {
                message: format!("radius {} km must be positive", raw.radius_km),
            });
        }
        Ok(Self {
            latitude: raw.latitude,
            longitude: raw.longitude,
            radius_km: raw.radius_km,
        })
    }

    /// Latitude of the centre in degrees.
    #[must_use]
    pub const fn latitude(&self) -> f64 {
        self.latitude
    }

    /// Longitude of the centre in degrees.
    #[must_use]
    pub const fn longitude(&self) -> f64 {
        self.longitude
    }

    /// Radius in kilometres.
    #[must_use]
    pub const fn radius_km(&self) -> f64 {
        self.radius_km
    }
}

/// A category and its relative share of generated POIs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryWeight {
    name: String,
    weight: u32,
}

impl CategoryWeight {
    /// Returns the category name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the relative weight (at least 1).
    #[must_use]
    pub const fn weight(&self) -> u32 {
        self.weight
    }
}

/// A named seed definition for deterministic POI generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedDefinition {
    name: String,
    seed: u64,
    poi_count: usize,
}

impl SeedDefinition {
    /// Returns the seed name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the RNG seed value.
    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    /// Returns the number of POIs to generate.
    #[must_use]
    pub const fn poi_count(&self) -> usize {
        self.poi_count
    }
}

/// Raw JSON representation for deserialisation.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSeedRegistry {
    version: u32,
    area: RawArea,
    categories: Vec<RawCategory>,
    seeds: Vec<RawSeedDefinition>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawArea {
    latitude: f64,
    longitude: f64,
    radius_km: f64,
}

#[derive(Debug, Deserialize)]
struct RawCategory {
    name: String,
    #[serde(default = "default_weight")]
    weight: u32,
}

const fn default_weight() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSeedDefinition {
    name: String,
    seed: u64,
    poi_count: usize,
}
