//! Cached forward and reverse geocoding.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::cache::EngineCaches;
use super::error::EngineError;
use super::geometry::{Bounds, Coordinate, validate_coordinates};
use super::ports::{AddressComponents, GeocodeCandidate, GeocodeOptions, GeocodingProvider};
use super::retry::{RetryPolicy, RetryRunner};

/// Addresses shorter than this, after trimming, are not sent upstream.
pub const MIN_ADDRESS_CHARS: usize = 3;
/// A claimed position closer than this to the best match is valid.
pub const VALID_ADDRESS_KM: f64 = 1.0;
/// Distance at which validation confidence reaches zero.
const CONFIDENCE_FALLOFF_KM: f64 = 5.0;
/// Region reported for validated addresses.
const DEFAULT_REGION: &str = "Centre";

/// A scored forward-geocoding hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodeResult {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Provider display name.
    pub display_name: String,
    /// Short formatted address.
    pub address: String,
    /// Neighbourhood or suburb.
    pub neighborhood: Option<String>,
    /// City; the configured city when the provider omits it.
    pub city: Option<String>,
    /// Country; the configured country when the provider omits it.
    pub country: Option<String>,
    /// Postal code.
    pub postcode: Option<String>,
    /// Match confidence in `[0, 1]`.
    pub confidence: f64,
    /// Extent of the match.
    pub bounds: Option<Bounds>,
}

/// A scored reverse-geocoding hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReverseGeocodeResult {
    /// Provider display name.
    pub formatted_address: String,
    /// Address parts.
    pub components: AddressComponents,
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Match confidence in `[0, 1]`.
    pub confidence: f64,
}

/// Parts of a validated address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatedComponents {
    /// First segment of the matched display name.
    pub street: String,
    /// Matched city, or the configured one.
    pub city: String,
    /// Administrative region.
    pub region: String,
    /// Matched country, or the configured one.
    pub country: String,
}

/// Outcome of checking a typed address against a claimed position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressValidation {
    /// Whether the best match lies within [`VALID_ADDRESS_KM`].
    pub valid: bool,
    /// `max(0, 1 - distance / 5)`, rounded to two decimals.
    pub confidence: f64,
    /// Distance to the best match in kilometres, rounded to two decimals.
    pub distance_km: f64,
    /// Display name of the best match.
    pub suggested_address: Option<String>,
    /// Parts of the best match; absent when nothing matched.
    pub components: Option<ValidatedComponents>,
}

impl AddressValidation {
    fn unmatched() -> Self {
        Self {
            valid: false,
            confidence: 0.0,
            distance_km: 0.0,
            suggested_address: None,
            components: None,
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// `clip01(importance * 10 + (30 - place_rank) / 30)`.
///
/// # Examples
/// ```
/// use map_engine::domain::geocoding::confidence;
///
/// assert_eq!(confidence(0.0, 30), 0.0);
/// assert_eq!(confidence(0.5, 16), 1.0);
/// ```
pub fn confidence(importance: f64, place_rank: u8) -> f64 {
    let rank_term = (30.0 - f64::from(place_rank)) / 30.0;
    (importance * 10.0 + rank_term).clamp(0.0, 1.0)
}

/// Forward-geocode cache key: `geocode_{query}_{options}` lowercased, with
/// whitespace runs collapsed to `_`.
pub fn geocode_cache_key(query: &str, options: &GeocodeOptions) -> String {
    let options = serde_json::to_string(options).unwrap_or_default();
    format!("geocode_{query}_{options}")
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

/// Reverse-geocode cache key: coordinates rounded to six decimals.
pub fn reverse_cache_key(coordinate: &Coordinate) -> String {
    format!("{:.6},{:.6}", coordinate.latitude, coordinate.longitude)
}

/// Circle outside which forward-geocode hits are discarded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ServiceArea {
    /// Area centre.
    pub center: Coordinate,
    /// Radius in kilometres, inclusive.
    pub radius_km: f64,
}

impl ServiceArea {
    /// Whether `point` lies inside the area.
    pub fn contains(&self, point: &Coordinate) -> bool {
        self.center.distance_to(point) <= self.radius_km
    }
}

/// Locality appended to every forward query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locality {
    /// City name.
    pub city: String,
    /// Country name.
    pub country: String,
}

impl Default for Locality {
    fn default() -> Self {
        Self {
            city: "Yaoundé".to_owned(),
            country: "Cameroun".to_owned(),
        }
    }
}

/// Retry budgets for the two geocoding calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeocodingPolicies {
    /// Forward lookups.
    pub geocode: RetryPolicy,
    /// Reverse lookups.
    pub reverse: RetryPolicy,
}

impl Default for GeocodingPolicies {
    fn default() -> Self {
        Self {
            geocode: RetryPolicy::geocode(),
            reverse: RetryPolicy::reverse_geocode(),
        }
    }
}

/// Geocoding front end combining the provider port, caches and retries.
#[derive(Clone)]
pub struct GeocodingService {
    provider: Arc<dyn GeocodingProvider>,
    caches: Arc<EngineCaches>,
    area: ServiceArea,
    locality: Locality,
    policies: GeocodingPolicies,
    runner: RetryRunner,
}

impl GeocodingService {
    /// Assemble the service.
    pub fn new(
        provider: Arc<dyn GeocodingProvider>,
        caches: Arc<EngineCaches>,
        area: ServiceArea,
        locality: Locality,
    ) -> Self {
        Self {
            provider,
            caches,
            area,
            locality,
            policies: GeocodingPolicies::default(),
            runner: RetryRunner::default(),
        }
    }

    /// Replace the retry budgets and runner.
    #[must_use]
    pub fn with_retry(mut self, policies: GeocodingPolicies, runner: RetryRunner) -> Self {
        self.policies = policies;
        self.runner = runner;
        self
    }

    /// Resolve `address` within the configured locality.
    ///
    /// Short queries return an empty list without a provider call. Hits
    /// outside the service area are dropped and the rest sorted by
    /// confidence, highest first. Results are cached by query and options.
    #[instrument(skip(self, options))]
    pub async fn geocode(
        &self,
        address: &str,
        options: &GeocodeOptions,
    ) -> Result<Vec<GeocodeResult>, EngineError> {
        if address.trim().chars().count() < MIN_ADDRESS_CHARS {
            return Ok(Vec::new());
        }
        let full = format!(
            "{address}, {}, {}",
            self.locality.city, self.locality.country
        );
        let key = geocode_cache_key(&full, options);
        if let Some(hit) = self.caches.geocode(&key) {
            debug!(key, "geocode cache hit");
            return Ok(hit);
        }

        let provider = Arc::clone(&self.provider);
        let candidates = self
            .runner
            .run("geocode", &self.policies.geocode, || {
                let provider = Arc::clone(&provider);
                let full = full.clone();
                let options = options.clone();
                async move { provider.geocode(&full, &options).await }
            })
            .await?;

        let mut results: Vec<GeocodeResult> = candidates
            .into_iter()
            .filter(|candidate| self.area.contains(&candidate.coordinate))
            .map(|candidate| self.to_result(candidate))
            .collect();
        results.sort_by(|left, right| right.confidence.total_cmp(&left.confidence));

        self.caches.store_geocode(key, results.clone());
        Ok(results)
    }

    /// Resolve a position into its address.
    ///
    /// Fails with a validation error for out-of-range coordinates.
    #[instrument(skip(self))]
    pub async fn reverse_geocode(
        &self,
        coordinate: Coordinate,
    ) -> Result<ReverseGeocodeResult, EngineError> {
        validate_coordinates(coordinate.latitude, coordinate.longitude)?;
        let key = reverse_cache_key(&coordinate);
        if let Some(hit) = self.caches.reverse(&key) {
            debug!(key, "reverse geocode cache hit");
            return Ok(hit);
        }

        let provider = Arc::clone(&self.provider);
        let candidate = self
            .runner
            .run("reverse_geocode", &self.policies.reverse, || {
                let provider = Arc::clone(&provider);
                async move { provider.reverse_geocode(coordinate).await }
            })
            .await?;

        let result = ReverseGeocodeResult {
            confidence: confidence(candidate.importance, candidate.place_rank),
            formatted_address: candidate.display_name,
            components: candidate.address,
            latitude: candidate.coordinate.latitude,
            longitude: candidate.coordinate.longitude,
        };
        self.caches.store_reverse(key, result.clone());
        Ok(result)
    }

    /// Check that `address` resolves near `claimed`.
    ///
    /// The best forward match is compared with the claimed position; an
    /// address with no match is invalid with zero confidence.
    #[instrument(skip(self))]
    pub async fn validate_address(
        &self,
        address: &str,
        claimed: Coordinate,
    ) -> Result<AddressValidation, EngineError> {
        validate_coordinates(claimed.latitude, claimed.longitude)?;
        let results = self.geocode(address, &GeocodeOptions::default()).await?;
        let Some(best) = results.into_iter().next() else {
            return Ok(AddressValidation::unmatched());
        };
        let distance = claimed.distance_to(&Coordinate::new(best.latitude, best.longitude));
        let street = best
            .display_name
            .split(',')
            .next()
            .unwrap_or_default()
            .trim()
            .to_owned();
        Ok(AddressValidation {
            valid: distance < VALID_ADDRESS_KM,
            confidence: round2((1.0 - distance / CONFIDENCE_FALLOFF_KM).max(0.0)),
            distance_km: round2(distance),
            components: Some(ValidatedComponents {
                street,
                city: best.city.unwrap_or_else(|| self.locality.city.clone()),
                region: DEFAULT_REGION.to_owned(),
                country: best.country.unwrap_or_else(|| self.locality.country.clone()),
            }),
            suggested_address: Some(best.display_name),
        })
    }

    /// Coordinates of the best match for a place name, if any.
    pub async fn place_coordinates(&self, name: &str) -> Result<Option<Coordinate>, EngineError> {
        let options = GeocodeOptions::default().with_limit(1);
        let results = self.geocode(name, &options).await?;
        Ok(results
            .first()
            .map(|result| Coordinate::new(result.latitude, result.longitude)))
    }

    fn to_result(&self, candidate: GeocodeCandidate) -> GeocodeResult {
        let address = candidate.address.formatted();
        let AddressComponents {
            neighbourhood,
            suburb,
            city,
            country,
            postcode,
            ..
        } = candidate.address;
        GeocodeResult {
            latitude: candidate.coordinate.latitude,
            longitude: candidate.coordinate.longitude,
            confidence: confidence(candidate.importance, candidate.place_rank),
            display_name: candidate.display_name,
            address,
            neighborhood: neighbourhood.or(suburb),
            city: city.or_else(|| Some(self.locality.city.clone())),
            country: country.or_else(|| Some(self.locality.country.clone())),
            postcode,
            bounds: candidate.bounds,
        }
    }
}

#[cfg(test)]
mod tests {
    //! Scoring, filtering and caching coverage for the geocoding service.

    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::domain::ports::{MockGeocodingProvider, NetworkError};
    use crate::test_support::{ImmediateSleeper, MutableClock, NoJitter};
    use chrono::Utc;
    use rstest::rstest;

    const YAOUNDE: Coordinate = Coordinate::new(3.8480, 11.5021);

    fn candidate(name: &str, coordinate: Coordinate, importance: f64, rank: u8) -> GeocodeCandidate {
        GeocodeCandidate {
            coordinate,
            display_name: name.to_owned(),
            address: AddressComponents {
                road: Some(name.to_owned()),
                ..AddressComponents::default()
            },
            importance,
            place_rank: rank,
            bounds: None,
        }
    }

    fn service(provider: MockGeocodingProvider) -> (GeocodingService, Arc<EngineCaches>) {
        let caches = Arc::new(EngineCaches::default());
        let runner = RetryRunner::new(
            Arc::new(ImmediateSleeper),
            Arc::new(NoJitter),
            Arc::new(MutableClock::new(Utc::now())),
        );
        let service = GeocodingService::new(
            Arc::new(provider),
            Arc::clone(&caches),
            ServiceArea {
                center: YAOUNDE,
                radius_km: 50.0,
            },
            Locality::default(),
        )
        .with_retry(GeocodingPolicies::default(), runner);
        (service, caches)
    }

    #[rstest]
    #[case(0.0, 30, 0.0)]
    #[case(0.0, 15, 0.5)]
    #[case(0.02, 30, 0.2)]
    #[case(0.3, 10, 1.0)]
    #[case(0.0, 40, 0.0)]
    fn confidence_is_clipped_to_unit_interval(
        #[case] importance: f64,
        #[case] rank: u8,
        #[case] expected: f64,
    ) {
        assert!((confidence(importance, rank) - expected).abs() < 1e-9);
    }

    #[rstest]
    fn cache_keys_are_normalised() {
        let key = geocode_cache_key("Rue  de\tNachtigal", &GeocodeOptions::default());
        assert!(key.starts_with("geocode_rue_de_nachtigal_"));
        assert!(!key.contains(char::is_whitespace));
        assert_eq!(reverse_cache_key(&Coordinate::new(3.848, 11.5021)), "3.848000,11.502100");
    }

    #[rstest]
    #[tokio::test]
    async fn drops_hits_outside_the_service_area_and_sorts_by_confidence() {
        let mut provider = MockGeocodingProvider::new();
        provider.expect_geocode().times(1).returning(|_, _| {
            Ok(vec![
                candidate("Low", Coordinate::new(3.86, 11.51), 0.0, 28),
                candidate("Douala", Coordinate::new(4.0511, 9.7679), 0.5, 10),
                candidate("High", Coordinate::new(3.87, 11.52), 0.05, 20),
            ])
        });
        let (service, _) = service(provider);

        let results = service
            .geocode("Bastos", &GeocodeOptions::default())
            .await
            .expect("geocode succeeds");

        let names: Vec<&str> = results.iter().map(|result| result.display_name.as_str()).collect();
        assert_eq!(names, ["High", "Low"]);
        assert_eq!(results[0].city.as_deref(), Some("Yaoundé"));
    }

    #[rstest]
    #[tokio::test]
    async fn repeated_queries_are_served_from_cache() {
        let mut provider = MockGeocodingProvider::new();
        provider
            .expect_geocode()
            .withf(|query: &str, options: &GeocodeOptions| {
                query == "Bastos, Yaoundé, Cameroun" && options.limit == 5
            })
            .times(1)
            .returning(|_, _| Ok(vec![candidate("Bastos", Coordinate::new(3.89, 11.51), 0.1, 18)]));
        let (service, caches) = service(provider);

        let first = service.geocode("Bastos", &GeocodeOptions::default()).await;
        let second = service.geocode("Bastos", &GeocodeOptions::default()).await;

        assert_eq!(first.ok(), second.ok());
        assert_eq!(caches.len(crate::domain::cache::CacheKind::Geocode), 1);
    }

    #[rstest]
    #[case("")]
    #[case("  ab ")]
    #[tokio::test]
    async fn short_addresses_skip_the_provider(#[case] address: &str) {
        let mut provider = MockGeocodingProvider::new();
        provider.expect_geocode().never();
        let (service, _) = service(provider);

        let results = service.geocode(address, &GeocodeOptions::default()).await;

        assert_eq!(results.ok(), Some(Vec::new()));
    }

    #[rstest]
    #[tokio::test]
    async fn transient_failures_are_retried_twice() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&attempts);
        let mut provider = MockGeocodingProvider::new();
        provider.expect_geocode().times(3).returning(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(NetworkError::timeout("nominatim timed out"))
        });
        let (service, caches) = service(provider);

        let result = service.geocode("Mvog-Mbi", &GeocodeOptions::default()).await;

        assert!(matches!(result, Err(EngineError::Network(NetworkError::Timeout { .. }))));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        assert_eq!(caches.len(crate::domain::cache::CacheKind::Geocode), 0);
    }

    #[rstest]
    #[case::on_the_spot(Coordinate::new(3.8667, 11.5167), true, 1.0, 0.0)]
    #[case::two_km_away(Coordinate::new(3.8847, 11.5167), false, 0.6, 2.0)]
    #[case::far_away(Coordinate::new(3.9667, 11.5167), false, 0.0, 11.12)]
    #[tokio::test]
    async fn addresses_are_validated_by_distance(
        #[case] claimed: Coordinate,
        #[case] valid: bool,
        #[case] confidence: f64,
        #[case] distance_km: f64,
    ) {
        let mut provider = MockGeocodingProvider::new();
        provider.expect_geocode().returning(|_, _| {
            Ok(vec![candidate(
                "Avenue Kennedy, Centre Ville, Yaoundé",
                Coordinate::new(3.8667, 11.5167),
                0.05,
                26,
            )])
        });
        let (service, _) = service(provider);

        let validation = service
            .validate_address("Avenue Kennedy", claimed)
            .await
            .expect("validation succeeds");

        assert_eq!(validation.valid, valid);
        assert_eq!(validation.confidence, confidence);
        assert_eq!(validation.distance_km, distance_km);
        let components = validation.components.expect("matched");
        assert_eq!(components.street, "Avenue Kennedy");
        assert_eq!(components.city, "Yaoundé");
        assert_eq!(components.region, "Centre");
    }

    #[rstest]
    #[tokio::test]
    async fn unmatched_addresses_are_invalid() {
        let mut provider = MockGeocodingProvider::new();
        provider.expect_geocode().returning(|_, _| Ok(Vec::new()));
        let (service, _) = service(provider);

        let validation = service
            .validate_address("Rue Inconnue", YAOUNDE)
            .await
            .expect("validation succeeds");

        assert!(!validation.valid);
        assert_eq!(validation.confidence, 0.0);
        assert_eq!(validation.suggested_address, None);
        assert_eq!(validation.components, None);
    }

    #[rstest]
    #[tokio::test]
    async fn place_coordinates_take_the_single_best_match() {
        let mut provider = MockGeocodingProvider::new();
        provider
            .expect_geocode()
            .withf(|_, options: &GeocodeOptions| options.limit == 1)
            .times(1)
            .returning(|_, _| Ok(vec![candidate("Mvog-Mbi", Coordinate::new(3.85, 11.52), 0.1, 20)]));
        let (service, _) = service(provider);

        let found = service.place_coordinates("Mvog-Mbi").await.expect("lookup succeeds");
        let missing = service.place_coordinates("zz").await.expect("short names skip the provider");

        assert_eq!(found, Some(Coordinate::new(3.85, 11.52)));
        assert_eq!(missing, None);
    }

    #[rstest]
    #[tokio::test]
    async fn reverse_geocode_validates_and_caches() {
        let mut provider = MockGeocodingProvider::new();
        provider
            .expect_reverse_geocode()
            .times(1)
            .returning(|coordinate| Ok(candidate("Poste Centrale", coordinate, 0.01, 26)));
        let (service, _) = service(provider);

        let invalid = service.reverse_geocode(Coordinate::new(95.0, 11.0)).await;
        assert!(matches!(invalid, Err(EngineError::Validation(_))));

        let first = service
            .reverse_geocode(YAOUNDE)
            .await
            .expect("reverse succeeds");
        let cached = service
            .reverse_geocode(Coordinate::new(3.848_000_04, 11.502_100_01))
            .await
            .expect("served from cache");
        assert_eq!(first, cached);
        assert_eq!(first.formatted_address, "Poste Centrale");
    }
}
