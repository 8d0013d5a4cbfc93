//! Driven port for forward and reverse geocoding.
//!
//! The provider returns raw candidates carrying the upstream `importance`
//! and `place_rank` signals; scoring and service-area filtering stay in
//! the domain.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::NetworkError;
use crate::domain::geometry::{Bounds, Coordinate};

/// Request shaping forwarded to the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeocodeOptions {
    /// Maximum number of candidates.
    pub limit: u8,
    /// Comma-separated ISO country codes restricting the search.
    pub country_codes: String,
    /// Preferred response languages.
    pub language: String,
    /// Restrict results to [`GeocodeOptions::viewbox`].
    pub bounded: bool,
    /// `lng_min,lat_max,lng_max,lat_min` bias box.
    pub viewbox: Option<String>,
}

impl Default for GeocodeOptions {
    fn default() -> Self {
        Self {
            limit: 5,
            country_codes: "cm".to_owned(),
            language: "fr,en".to_owned(),
            bounded: true,
            viewbox: Some("10.5,4.2,12.5,2.8".to_owned()),
        }
    }
}

impl GeocodeOptions {
    /// Override the candidate limit.
    #[must_use]
    pub const fn with_limit(mut self, limit: u8) -> Self {
        self.limit = limit;
        self
    }
}

/// Structured address parts reported by the provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressComponents {
    /// House number.
    pub house_number: Option<String>,
    /// Street.
    pub road: Option<String>,
    /// Neighbourhood.
    pub neighbourhood: Option<String>,
    /// Suburb.
    pub suburb: Option<String>,
    /// City.
    pub city: Option<String>,
    /// County.
    pub county: Option<String>,
    /// State or region.
    pub state: Option<String>,
    /// Country.
    pub country: Option<String>,
    /// Postal code.
    pub postcode: Option<String>,
}

impl AddressComponents {
    /// Short postal form: house number, road, neighbourhood (or suburb), city.
    pub fn formatted(&self) -> String {
        [
            self.house_number.as_deref(),
            self.road.as_deref(),
            self.neighbourhood.as_deref().or(self.suburb.as_deref()),
            self.city.as_deref(),
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(", ")
    }
}

/// One unscored provider hit.
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodeCandidate {
    /// Resolved position.
    pub coordinate: Coordinate,
    /// Provider display name.
    pub display_name: String,
    /// Address parts.
    pub address: AddressComponents,
    /// Provider importance in `[0, 1]`; `0` when absent.
    pub importance: f64,
    /// Provider place rank; `30` when absent.
    pub place_rank: u8,
    /// Extent of the match, when reported.
    pub bounds: Option<Bounds>,
}

/// Port for address lookup.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GeocodingProvider: Send + Sync {
    /// Resolve a free-text address into candidates.
    async fn geocode(
        &self,
        query: &str,
        options: &GeocodeOptions,
    ) -> Result<Vec<GeocodeCandidate>, NetworkError>;

    /// Resolve a position into its address.
    async fn reverse_geocode(
        &self,
        coordinate: Coordinate,
    ) -> Result<GeocodeCandidate, NetworkError>;
}

/// Provider with a fixed candidate list, for tests and offline demos.
///
/// `geocode` returns candidates whose display name contains the first
/// comma-separated part of the query; `reverse_geocode` returns the
/// candidate nearest to the requested point.
#[derive(Debug, Clone, Default)]
pub struct FixtureGeocodingProvider {
    candidates: Vec<GeocodeCandidate>,
}

impl FixtureGeocodingProvider {
    /// Serve the given candidates.
    pub const fn new(candidates: Vec<GeocodeCandidate>) -> Self {
        Self { candidates }
    }
}

#[async_trait]
impl GeocodingProvider for FixtureGeocodingProvider {
    async fn geocode(
        &self,
        query: &str,
        options: &GeocodeOptions,
    ) -> Result<Vec<GeocodeCandidate>, NetworkError> {
        let needle = query
            .split(',')
            .next()
            .unwrap_or_default()
            .trim()
            .to_lowercase();
        Ok(self
            .candidates
            .iter()
            .filter(|candidate| candidate.display_name.to_lowercase().contains(&needle))
            .take(usize::from(options.limit))
            .cloned()
            .collect())
    }

    async fn reverse_geocode(
        &self,
        coordinate: Coordinate,
    ) -> Result<GeocodeCandidate, NetworkError> {
        self.candidates
            .iter()
            .min_by(|left, right| {
                coordinate
                    .distance_to(&left.coordinate)
                    .total_cmp(&coordinate.distance_to(&right.coordinate))
            })
            .cloned()
            .ok_or_else(|| NetworkError::rejected(404_u16, "no address at this position"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(AddressComponents {
        house_number: Some("12".into()),
        road: Some("Rue de Nachtigal".into()),
        suburb: Some("Bastos".into()),
        city: Some("Yaoundé".into()),
        ..AddressComponents::default()
    }, "12, Rue de Nachtigal, Bastos, Yaoundé")]
    #[case(AddressComponents {
        neighbourhood: Some("Mvog-Mbi".into()),
        suburb: Some("Yaoundé IV".into()),
        ..AddressComponents::default()
    }, "Mvog-Mbi")]
    #[case(AddressComponents::default(), "")]
    fn formats_short_address(#[case] address: AddressComponents, #[case] expected: &str) {
        assert_eq!(address.formatted(), expected);
    }
}
