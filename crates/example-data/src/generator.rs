//! Deterministic POI generation from seed definitions.
//!
//! The same seed value always produces identical output. Categories are
//! allocated exactly in proportion to their registry weights when the POI
//! count is a multiple of the total weight; positions, names and ratings come
//! from a `ChaCha8Rng` seeded with the definition's seed.

use fake::Fake;
use fake::faker::address::raw::StreetName;
use fake::faker::company::raw::CatchPhrase;
use fake::faker::name::raw::LastName;
use fake::locales::EN;
use rand::seq::{IndexedRandom, SliceRandom};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use uuid::Uuid;

use crate::error::GenerationError;
use crate::registry::{GenerationArea, SeedDefinition, SeedRegistry};
use crate::seed::ExamplePoiSeed;
use crate::validation::{POI_NAME_MAX, is_valid_poi_name, sanitize_poi_name};

/// Maximum number of attempts to generate a valid POI name.
const MAX_NAME_ATTEMPTS: usize = 100;

/// Kilometres per degree of latitude.
const KM_PER_DEGREE: f64 = 111.32;

/// Share of POIs left unrated.
const UNRATED_PROBABILITY: f64 = 0.25;

/// Share of POIs marked verified.
const VERIFIED_PROBABILITY: f64 = 0.3;

/// Share of POIs with a street address.
const ADDRESS_PROBABILITY: f64 = 0.8;

/// Generates example POIs from a seed definition.
///
/// Every POI lies within the registry's area and carries a category from
/// the registry. Feature flags follow the category: restaurants serve food,
/// hotels accept bookings, `transport` and `stadium` set their flags.
///
/// # Errors
///
/// Returns [`GenerationError`] if name generation fails after maximum
/// retries.
///
/// # Example
///
/// ```
/// use example_data::{SeedRegistry, generate_example_pois};
///
/// let json = r#"{
///     "version": 1,
///     "area": {"latitude": 3.848, "longitude": 11.5021, "radiusKm": 5.0},
///     "categories": [{"name": "restaurant"}, {"name": "hotel"}],
///     "seeds": [{"name": "test", "seed": 42, "poiCount": 4}]
/// }"#;
///
/// let registry = SeedRegistry::from_json(json).expect("valid");
/// let seed_def = registry.find_seed("test").expect("found");
/// let pois = generate_example_pois(&registry, seed_def).expect("generated");
///
/// assert_eq!(pois.len(), 4);
/// assert_eq!(pois.iter().filter(|poi| poi.category == "hotel").count(), 2);
/// // Same seed produces identical POIs
/// let again = generate_example_pois(&registry, seed_def).expect("generated");
/// assert_eq!(pois, again);
/// ```
pub fn generate_example_pois(
    registry: &SeedRegistry,
    seed_def: &SeedDefinition,
) -> Result<Vec<ExamplePoiSeed>, GenerationError> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed_def.seed());
    let mut categories = allocate_categories(registry, seed_def.poi_count());
    categories.shuffle(&mut rng);

    categories
        .into_iter()
        .map(|category| generate_single_poi(&mut rng, registry.area(), category))
        .collect()
}

/// Expands the weighted categories and cycles through them `count` times.
fn allocate_categories(registry: &SeedRegistry, count: usize) -> Vec<String> {
    let pool: Vec<&str> = registry
        .categories()
        .iter()
        .flat_map(|category| (0..category.weight()).map(move |_| category.name()))
        .collect();
    pool.iter()
        .cycle()
        .take(count)
        .map(|name| (*name).to_owned())
        .collect()
}

fn generate_single_poi(
    rng: &mut ChaCha8Rng,
    area: &GenerationArea,
    category: String,
) -> Result<ExamplePoiSeed, GenerationError> {
    let id = Uuid::from_u128(rng.random()).to_string();
    let name = generate_name(rng, &category)?;
    let (latitude, longitude) = scatter(rng, area);
    let address = rng.random_bool(ADDRESS_PROBABILITY).then(|| {
        let number: u32 = rng.random_range(1..=400);
        let street: String = StreetName(EN).fake_with_rng(rng);
        format!("{number} {street}")
    });
    let description: String = CatchPhrase(EN).fake_with_rng(rng);
    let (rating, rating_count) = if rng.random_bool(UNRATED_PROBABILITY) {
        (0.0, 0)
    } else {
        let tenths: u32 = rng.random_range(10..=50);
        (tenths_to_rating(tenths), rng.random_range(1..=250))
    };
    let is_verified = rng.random_bool(VERIFIED_PROBABILITY);
    let is_hotel = category == "hotel";
    let is_restaurant = category == "restaurant" || (is_hotel && rng.random_bool(0.4));
    let is_booking = is_hotel || (category == "restaurant" && rng.random_bool(0.3));

    Ok(ExamplePoiSeed {
        id,
        name,
        description,
        latitude,
        longitude,
        address,
        is_transport: category == "transport",
        is_stadium: category == "stadium",
        category,
        rating,
        rating_count,
        is_verified,
        is_restaurant,
        is_booking,
    })
}

#[expect(
    clippy::float_arithmetic,
    reason = "ratings are generated in tenths"
)]
fn tenths_to_rating(tenths: u32) -> f64 {
    f64::from(tenths) / 10.0
}

/// Uniform point inside the area's disc, rounded to six decimals.
#[expect(
    clippy::float_arithmetic,
    reason = "polar sampling and degree conversion need float maths"
)]
fn scatter(rng: &mut ChaCha8Rng, area: &GenerationArea) -> (f64, f64) {
    let distance = area.radius_km() * rng.random::<f64>().sqrt();
    let bearing = rng.random::<f64>() * std::f64::consts::TAU;
    let latitude = area.latitude() + distance * bearing.cos() / KM_PER_DEGREE;
    let longitude_scale = KM_PER_DEGREE * area.latitude().to_radians().cos().max(0.01);
    let longitude = area.longitude() + distance * bearing.sin() / longitude_scale;
    let round = |value: f64| (value * 1e6).round() / 1e6;
    (round(latitude.clamp(-90.0, 90.0)), round(longitude.clamp(-180.0, 180.0)))
}

fn name_prefixes(category: &str) -> &'static [&'static str] {
    match category {
        "restaurant" => &["Chez", "Restaurant", "Le Petit"],
        "hotel" => &["Hôtel", "Résidence", "Auberge"],
        "transport" => &["Gare", "Agence", "Station"],
        "stadium" => &["Stade", "Complexe Sportif"],
        "shopping" => &["Marché", "Boutique", "Supermarché"],
        _ => &["Espace", "Centre", "Maison"],
    }
}

/// Generates a valid POI name using the provided RNG.
///
/// Names combine a category prefix with a surname. Candidates are sanitised
/// and truncated before validation.
fn generate_name(rng: &mut ChaCha8Rng, category: &str) -> Result<String, GenerationError> {
    let prefixes = name_prefixes(category);
    for _ in 0..MAX_NAME_ATTEMPTS {
        let Some(prefix) = prefixes.choose(rng) else {
            break;
        };
        let last: String = LastName(EN).fake_with_rng(rng);
        let sanitized = sanitize_poi_name(&format!("{prefix} {last}"));
        let truncated: String = sanitized.chars().take(POI_NAME_MAX).collect();

        if is_valid_poi_name(&truncated) {
            return Ok(truncated);
        }
    }

    Err(GenerationError::NameGenerationFailed {
        max_attempts: MAX_NAME_ATTEMPTS,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, HashSet};

    use rstest::{fixture, rstest};

    use super::*;

    const TEST_REGISTRY_JSON: &str = r#"{
        "version": 1,
        "area": {"latitude": 3.848, "longitude": 11.5021, "radiusKm": 8.0},
        "categories": [
            {"name": "restaurant", "weight": 5},
            {"name": "hotel", "weight": 4},
            {"name": "transport", "weight": 4},
            {"name": "stadium", "weight": 4},
            {"name": "shopping", "weight": 4},
            {"name": "attraction", "weight": 4}
        ],
        "seeds": [
            {"name": "city", "seed": 2026, "poiCount": 150},
            {"name": "other", "seed": 7, "poiCount": 150},
            {"name": "empty", "seed": 1, "poiCount": 0}
        ]
    }"#;

    #[fixture]
    fn registry() -> SeedRegistry {
        SeedRegistry::from_json(TEST_REGISTRY_JSON).expect("valid test registry")
    }

    fn generate(registry: &SeedRegistry, name: &str) -> Vec<ExamplePoiSeed> {
        let seed_def = registry.find_seed(name).expect("seed should be found");
        generate_example_pois(registry, seed_def).expect("generation should succeed")
    }

    #[rstest]
    fn allocates_categories_by_weight(registry: SeedRegistry) {
        let pois = generate(&registry, "city");

        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for poi in &pois {
            *counts.entry(poi.category.as_str()).or_default() += 1;
        }
        assert_eq!(pois.len(), 150);
        assert_eq!(counts.get("restaurant"), Some(&30));
        assert!(
            counts
                .iter()
                .filter(|(name, _)| **name != "restaurant")
                .all(|(_, count)| *count == 24)
        );
    }

    #[rstest]
    fn same_seed_is_deterministic_and_different_seeds_differ(registry: SeedRegistry) {
        let first = generate(&registry, "city");
        assert_eq!(first, generate(&registry, "city"));
        assert_ne!(first, generate(&registry, "other"));
    }

    #[rstest]
    #[expect(clippy::float_arithmetic, reason = "bounds are derived from the radius")]
    fn positions_stay_inside_the_area(registry: SeedRegistry) {
        // Small slack for the flat-earth degree conversion.
        let lat_span = 8.0 / KM_PER_DEGREE * 1.05;
        for poi in generate(&registry, "city") {
            assert!((poi.latitude - 3.848).abs() <= lat_span, "{poi:?}");
            assert!((poi.longitude - 11.5021).abs() <= lat_span * 1.01, "{poi:?}");
        }
    }

    #[rstest]
    fn ids_are_unique_and_names_valid(registry: SeedRegistry) {
        let pois = generate(&registry, "city");
        let ids: HashSet<&str> = pois.iter().map(|poi| poi.id.as_str()).collect();
        assert_eq!(ids.len(), pois.len());
        assert!(pois.iter().all(|poi| is_valid_poi_name(&poi.name)));
    }

    #[rstest]
    fn flags_follow_categories(registry: SeedRegistry) {
        for poi in generate(&registry, "city") {
            match poi.category.as_str() {
                "restaurant" => assert!(poi.is_restaurant),
                "hotel" => assert!(poi.is_booking),
                "transport" => assert!(poi.is_transport),
                "stadium" => assert!(poi.is_stadium),
                _ => assert!(!poi.is_transport && !poi.is_stadium),
            }
        }
    }

    #[rstest]
    fn ratings_are_tenths_in_range(registry: SeedRegistry) {
        for poi in generate(&registry, "city") {
            if poi.rating_count == 0 {
                assert_eq!(poi.rating, 0.0);
            } else {
                assert!((1.0..=5.0).contains(&poi.rating), "{poi:?}");
            }
        }
    }

    #[rstest]
    fn zero_count_generates_nothing(registry: SeedRegistry) {
        assert!(generate(&registry, "empty").is_empty());
    }
}
